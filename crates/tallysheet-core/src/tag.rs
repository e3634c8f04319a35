//! Tag grammar
//!
//! Tags are cells whose text is wrapped in angle brackets. They are the only
//! way template regions and aggregate targets are located. This module is the
//! single place where tag text is parsed or produced:
//!
//! | Kind        | Text                          |
//! |-------------|-------------------------------|
//! | Anchor      | `<name>`, name = `[A-Za-z0-9_]+` |
//! | Subtotal    | `<subtotal_{size}_{column}>`  |
//! | Total       | `<total_{column}>`            |
//! | Decorative  | `<total_bar>` and any other `<[\w\s]+>` |
//!
//! `size` is a positive integer and `column` matches `[\w\s]+`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Start of the data region (first data row, first column).
pub const DATA_START: &str = "data_start";
/// End of the data region in the template.
pub const DATA_END: &str = "data_end";
/// First header cell.
pub const HEADER_START: &str = "header_start";
/// Closing row under the grand total, styled then erased.
pub const TOTAL_BAR: &str = "total_bar";

/// Anchors every template must carry.
pub const REQUIRED_ANCHORS: [&str; 3] = [DATA_START, DATA_END, HEADER_START];

/// Any cell text that looks like a tag.
pub static GENERIC_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<[\w\s]+>$").expect("generic tag pattern"));

/// Subtotal tag with its encoded group size and column.
pub static SUBTOTAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<subtotal_(?P<size>\d+)_(?P<column>[\w\s]+)>$").expect("subtotal tag pattern")
});

/// Grand-total tag with its encoded column.
pub static TOTAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<total_(?P<column>[\w\s]+)>$").expect("total tag pattern"));

static ANCHOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<(?P<name>[A-Za-z0-9_]+)>$").expect("anchor tag pattern"));

static COLUMN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w\s]+$").expect("column pattern"));

const SUBTOTAL_PREFIX: &str = "<subtotal_";
const TOTAL_PREFIX: &str = "<total_";
const DECORATIVE_NAMES: [&str; 1] = [TOTAL_BAR];

/// Tag text that claims to be a subtotal/total but does not follow the grammar.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{text:?}: {reason}")]
pub struct TagDecodeError {
    pub text: String,
    pub reason: String,
}

impl TagDecodeError {
    fn new(text: &str, reason: impl Into<String>) -> Self {
        Self {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

/// Semantic role of a tag cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Fixed structural point or placeholder, e.g. `<data_start>`
    Anchor(String),
    /// Aggregate over the `size` rows directly above the tag
    Subtotal { size: u32, column: String },
    /// Aggregate over the whole rendered region
    Total { column: String },
    /// Marker consumed only by styling
    Decorative(String),
}

impl Tag {
    /// Parse cell text into a tag.
    ///
    /// Returns `Ok(None)` for text that is not a tag at all, and an error for
    /// text that starts like a subtotal/total tag but cannot be decoded.
    pub fn parse(text: &str) -> Result<Option<Tag>, TagDecodeError> {
        if !text.starts_with('<') || !text.ends_with('>') || text.len() < 3 {
            return Ok(None);
        }
        let inner = &text[1..text.len() - 1];

        if DECORATIVE_NAMES.contains(&inner) {
            return Ok(Some(Tag::Decorative(inner.to_string())));
        }

        if text.starts_with(SUBTOTAL_PREFIX) {
            let caps = SUBTOTAL_PATTERN
                .captures(text)
                .ok_or_else(|| TagDecodeError::new(text, "expected <subtotal_{size}_{column}>"))?;
            let size: u32 = caps["size"]
                .parse()
                .map_err(|_| TagDecodeError::new(text, "group size does not fit in 32 bits"))?;
            if size == 0 {
                return Err(TagDecodeError::new(text, "group size must be positive"));
            }
            return Ok(Some(Tag::Subtotal {
                size,
                column: caps["column"].to_string(),
            }));
        }

        if text.starts_with(TOTAL_PREFIX) {
            let caps = TOTAL_PATTERN
                .captures(text)
                .ok_or_else(|| TagDecodeError::new(text, "expected <total_{column}>"))?;
            return Ok(Some(Tag::Total {
                column: caps["column"].to_string(),
            }));
        }

        if let Some(caps) = ANCHOR_PATTERN.captures(text) {
            return Ok(Some(Tag::Anchor(caps["name"].to_string())));
        }

        if GENERIC_PATTERN.is_match(text) {
            return Ok(Some(Tag::Decorative(inner.to_string())));
        }

        Ok(None)
    }

    /// Subtotal tag for a group of `size` rows in `column`
    pub fn subtotal(size: u32, column: &str) -> Result<Tag, TagDecodeError> {
        if size == 0 {
            return Err(TagDecodeError::new(column, "group size must be positive"));
        }
        Self::check_column(column)?;
        Ok(Tag::Subtotal {
            size,
            column: column.to_string(),
        })
    }

    /// Grand-total tag for `column`
    pub fn total(column: &str) -> Result<Tag, TagDecodeError> {
        Self::check_column(column)?;
        Ok(Tag::Total {
            column: column.to_string(),
        })
    }

    /// Whether a column name survives a round trip through the tag grammar.
    ///
    /// A column whose total tag would read as a decorative marker (`bar` gives
    /// `<total_bar>`) is not encodable.
    pub fn is_encodable_column(column: &str) -> bool {
        COLUMN_PATTERN.is_match(column)
            && !DECORATIVE_NAMES
                .iter()
                .any(|name| name.strip_prefix("total_") == Some(column))
    }

    /// Whether cell text has the generic `<...>` tag shape
    pub fn looks_like_tag(text: &str) -> bool {
        GENERIC_PATTERN.is_match(text)
    }

    fn check_column(column: &str) -> Result<(), TagDecodeError> {
        if Self::is_encodable_column(column) {
            Ok(())
        } else {
            Err(TagDecodeError::new(
                column,
                "column names may only contain word characters and spaces, \
                 and must not collide with a decorative tag",
            ))
        }
    }

    /// Column this tag aggregates, if it is an aggregate tag
    pub fn column(&self) -> Option<&str> {
        match self {
            Tag::Subtotal { column, .. } | Tag::Total { column } => Some(column),
            Tag::Anchor(_) | Tag::Decorative(_) => None,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Anchor(name) | Tag::Decorative(name) => write!(f, "<{name}>"),
            Tag::Subtotal { size, column } => write!(f, "<subtotal_{size}_{column}>"),
            Tag::Total { column } => write!(f, "<total_{column}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_anchor() {
        assert_eq!(
            Tag::parse("<data_start>").unwrap(),
            Some(Tag::Anchor("data_start".into()))
        );
    }

    #[test]
    fn parses_subtotal_with_spaces_in_column() {
        let tag = Tag::parse("<subtotal_3_Ad server impressions>").unwrap();
        assert_eq!(
            tag,
            Some(Tag::Subtotal {
                size: 3,
                column: "Ad server impressions".into()
            })
        );
    }

    #[test]
    fn parses_total() {
        assert_eq!(
            Tag::parse("<total_Ad server CTR>").unwrap(),
            Some(Tag::Total {
                column: "Ad server CTR".into()
            })
        );
    }

    #[test]
    fn total_bar_is_decorative_not_total() {
        assert_eq!(
            Tag::parse("<total_bar>").unwrap(),
            Some(Tag::Decorative("total_bar".into()))
        );
    }

    #[test]
    fn other_bracketed_text_is_decorative() {
        assert_eq!(
            Tag::parse("<some marker>").unwrap(),
            Some(Tag::Decorative("some marker".into()))
        );
    }

    #[test]
    fn plain_text_is_not_a_tag() {
        assert_eq!(Tag::parse("Ad server clicks").unwrap(), None);
        assert_eq!(Tag::parse("<>").unwrap(), None);
        assert_eq!(Tag::parse("a < b > c").unwrap(), None);
        assert_eq!(Tag::parse("<price (£)>").unwrap(), None);
    }

    #[test]
    fn malformed_aggregate_tags_fail() {
        assert!(Tag::parse("<subtotal_x_Clicks>").is_err());
        assert!(Tag::parse("<subtotal_0_Clicks>").is_err());
        assert!(Tag::parse("<subtotal_2_>").is_err());
        assert!(Tag::parse("<total_CPM (£)>").is_err());
        assert!(Tag::parse("<subtotal_99999999999_Clicks>").is_err());
    }

    #[test]
    fn display_reproduces_grammar() {
        for text in [
            "<data_end>",
            "<subtotal_12_Ad server clicks>",
            "<total_Delivery Indicator>",
            "<total_bar>",
        ] {
            let tag = Tag::parse(text).unwrap().unwrap();
            assert_eq!(tag.to_string(), text);
        }
    }

    #[test]
    fn constructors_reject_unencodable_columns() {
        assert!(Tag::subtotal(2, "Revenue (£)").is_err());
        assert!(Tag::subtotal(0, "Clicks").is_err());
        assert!(Tag::total("Goal quantity").is_ok());
        assert!(Tag::is_encodable_column("Line item start date"));
    }

    #[test]
    fn column_whose_total_reads_as_decorative_is_rejected() {
        assert!(!Tag::is_encodable_column("bar"));
        assert!(Tag::total("bar").is_err());
        assert!(Tag::subtotal(2, "bar").is_err());
        assert!(Tag::is_encodable_column("bars"));
        assert!(Tag::is_encodable_column("Bar"));
    }

    #[test]
    fn generic_shape() {
        assert!(Tag::looks_like_tag("<subtotal_2_Ad server CTR>"));
        assert!(Tag::looks_like_tag("<icon>"));
        assert!(!Tag::looks_like_tag("=SUM(A1:A2)"));
    }
}
