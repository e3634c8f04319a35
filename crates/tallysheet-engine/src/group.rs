//! Record grouping
//!
//! Records are stable-sorted by start date, line item text and creative size,
//! then partitioned by `(start date, end date, identifier)`. Groups come out in
//! the order their first member appears after sorting.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tallysheet_core::{Record, RecordSet, ReportError};
use tracing::debug;

/// Which input columns drive grouping, and how identifiers are extracted
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    pub start_date: String,
    pub end_date: String,
    /// Free-text column the identifier is extracted from
    pub line_item: String,
    pub creative_size: String,
    /// Fine-grained identifier (line item id)
    pub line_item_pattern: String,
    /// Coarse fallback identifier (order id)
    pub order_pattern: String,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            start_date: "Line item start date".into(),
            end_date: "Line item end date".into(),
            line_item: "Line Item".into(),
            creative_size: "Creative Size".into(),
            line_item_pattern: r"ORD-\d+-\d+-\d+".into(),
            order_pattern: r"ORD-\d+".into(),
        }
    }
}

/// Identifier pulled out of a line item's free text
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identifier {
    LineItem(String),
    Order(String),
}

impl Identifier {
    pub fn as_str(&self) -> &str {
        match self {
            Identifier::LineItem(id) | Identifier::Order(id) => id,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-tier identifier extractor: line item id first, order id as fallback.
#[derive(Clone, Debug)]
pub struct IdentifierExtractor {
    line_item: Regex,
    order: Regex,
}

impl IdentifierExtractor {
    pub fn new(line_item_pattern: &str, order_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            line_item: Regex::new(line_item_pattern)?,
            order: Regex::new(order_pattern)?,
        })
    }

    pub fn extract(&self, text: &str) -> Option<Identifier> {
        if let Some(m) = self.line_item.find(text) {
            return Some(Identifier::LineItem(m.as_str().to_string()));
        }
        self.order_id(text).map(Identifier::Order)
    }

    /// Coarse identifier only
    pub fn order_id(&self, text: &str) -> Option<String> {
        self.order.find(text).map(|m| m.as_str().to_string())
    }
}

/// Composite group key
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub start: String,
    pub end: String,
    pub identifier: Identifier,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.start, self.end, self.identifier)
    }
}

/// Records sharing one key, in sorted order
#[derive(Clone, Debug, PartialEq)]
pub struct Group<'a> {
    pub key: GroupKey,
    pub members: Vec<&'a Record>,
}

impl Group<'_> {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Groups of more than one record get a subtotal row
    pub fn is_subtotalled(&self) -> bool {
        self.size() > 1
    }
}

/// Partitions a record set into ordered groups
#[derive(Clone, Debug)]
pub struct GroupBuilder {
    config: GroupingConfig,
    extractor: IdentifierExtractor,
}

impl GroupBuilder {
    pub fn new(config: GroupingConfig) -> Result<Self, regex::Error> {
        let extractor = IdentifierExtractor::new(&config.line_item_pattern, &config.order_pattern)?;
        Ok(Self { config, extractor })
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    pub fn extractor(&self) -> &IdentifierExtractor {
        &self.extractor
    }

    /// Sort and group `records`.
    ///
    /// Only the line item column must exist; absent date/size columns read as
    /// empty. Any record without an extractable identifier fails the build.
    pub fn build<'a>(&self, records: &'a RecordSet) -> Result<Vec<Group<'a>>, ReportError> {
        let line_item = records.require_column(&self.config.line_item)?;
        let field = |record: &'a Record, column: &str| records.value(record, column);

        let mut sorted: Vec<(usize, &'a Record)> = records.records.iter().enumerate().collect();
        sorted.sort_by(|&(_, a), &(_, b)| {
            field(a, &self.config.start_date)
                .sort_cmp(field(b, &self.config.start_date))
                .then_with(|| a.get(line_item).sort_cmp(b.get(line_item)))
                .then_with(|| {
                    field(a, &self.config.creative_size)
                        .sort_cmp(field(b, &self.config.creative_size))
                })
        });

        let mut groups: Vec<Group<'a>> = Vec::new();
        let mut positions: HashMap<GroupKey, usize> = HashMap::new();

        for (index, record) in sorted {
            let text = record.get(line_item).to_string();
            let identifier = self
                .extractor
                .extract(&text)
                .ok_or(ReportError::Extraction { record: index, text })?;

            let key = GroupKey {
                start: field(record, &self.config.start_date).to_string(),
                end: field(record, &self.config.end_date).to_string(),
                identifier,
            };

            match positions.get(&key) {
                Some(&position) => groups[position].members.push(record),
                None => {
                    positions.insert(key.clone(), groups.len());
                    groups.push(Group {
                        key,
                        members: vec![record],
                    });
                }
            }
        }

        debug!(
            records = records.len(),
            groups = groups.len(),
            "grouped records"
        );
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tallysheet_core::CellValue;

    fn date(day: u32) -> CellValue {
        CellValue::Date(NaiveDate::from_ymd_opt(2017, 6, day).unwrap())
    }

    fn record_set(rows: &[(CellValue, &str, &str)]) -> RecordSet {
        let mut set = RecordSet::new(vec![
            "Line Item".into(),
            "Line item start date".into(),
            "Line item end date".into(),
            "Creative Size".into(),
        ]);
        for (start, line_item, size) in rows {
            set.push(Record::new(vec![
                (*line_item).into(),
                start.clone(),
                date(30),
                (*size).into(),
            ]));
        }
        set
    }

    #[test]
    fn extractor_prefers_line_item_id() {
        let extractor = IdentifierExtractor::new(r"ORD-\d+-\d+-\d+", r"ORD-\d+").unwrap();
        assert_eq!(
            extractor.extract("Brand ORD-12-3-4 MPU"),
            Some(Identifier::LineItem("ORD-12-3-4".into()))
        );
        assert_eq!(
            extractor.extract("Brand ORD-12 MPU"),
            Some(Identifier::Order("ORD-12".into()))
        );
        assert_eq!(extractor.extract("no identifier"), None);
    }

    #[test]
    fn groups_by_key_in_first_occurrence_order() {
        let set = record_set(&[
            (date(5), "ORD-9-1-1 Skin", "300x250"),
            (date(1), "ORD-9-1-2 Leader", "728x90"),
            (date(5), "ORD-9-1-1 Skin", "160x600"),
        ]);
        let builder = GroupBuilder::new(GroupingConfig::default()).unwrap();
        let groups = builder.build(&set).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key.identifier.as_str(), "ORD-9-1-2");
        assert_eq!(groups[1].key.identifier.as_str(), "ORD-9-1-1");
        assert_eq!(groups[1].size(), 2);
        // Within a group, creative size breaks the tie
        assert_eq!(groups[1].members[0].get(3), &CellValue::from("160x600"));
        assert!(groups[1].is_subtotalled());
        assert!(!groups[0].is_subtotalled());
    }

    #[test]
    fn emission_order_is_not_key_order() {
        let set = record_set(&[
            (date(1), "ORD-9-1-9 A", "x"),
            (date(2), "ORD-9-1-1 B", "x"),
        ]);
        let builder = GroupBuilder::new(GroupingConfig::default()).unwrap();
        let groups = builder.build(&set).unwrap();
        let ids: Vec<&str> = groups.iter().map(|g| g.key.identifier.as_str()).collect();
        assert_eq!(ids, vec!["ORD-9-1-9", "ORD-9-1-1"]);
    }

    #[test]
    fn different_dates_split_groups() {
        let set = record_set(&[
            (date(1), "ORD-9-1-1 A", "x"),
            (date(2), "ORD-9-1-1 A", "x"),
        ]);
        let builder = GroupBuilder::new(GroupingConfig::default()).unwrap();
        assert_eq!(builder.build(&set).unwrap().len(), 2);
    }

    #[test]
    fn unextractable_record_fails() {
        let set = record_set(&[
            (date(1), "ORD-9-1-1 A", "x"),
            (date(2), "House ad", "x"),
        ]);
        let builder = GroupBuilder::new(GroupingConfig::default()).unwrap();
        match builder.build(&set) {
            Err(ReportError::Extraction { record, text }) => {
                assert_eq!(record, 1);
                assert_eq!(text, "House ad");
            }
            other => panic!("expected extraction error, got {other:?}"),
        }
    }

    #[test]
    fn missing_line_item_column_fails() {
        let set = RecordSet::new(vec!["Other".into()]);
        let builder = GroupBuilder::new(GroupingConfig::default()).unwrap();
        assert!(matches!(builder.build(&set), Err(ReportError::MissingColumn(_))));
    }
}
