//! Tag scanning
//!
//! Every lookup walks the grid's occupied cells in row-major order and tests
//! the stringified value. Nothing is cached, so results always reflect the
//! grid as it is at call time.

use regex::Regex;

use crate::tag::{Tag, GENERIC_PATTERN, REQUIRED_ANCHORS};
use crate::{CellRef, Grid, ReportError};

/// All cells whose text matches `pattern`, in scan order
pub fn find_all(grid: &Grid, pattern: &Regex) -> Vec<CellRef> {
    grid.cells()
        .filter(|(_, value)| pattern.is_match(&value.to_string()))
        .map(|(cell, _)| cell)
        .collect()
}

/// First cell whose text matches `pattern`
pub fn find_one(grid: &Grid, pattern: &Regex) -> Option<CellRef> {
    grid.cells()
        .find(|(_, value)| pattern.is_match(&value.to_string()))
        .map(|(cell, _)| cell)
}

/// First cell holding exactly `<name>`
pub fn find_anchor(grid: &Grid, name: &str) -> Option<CellRef> {
    let text = Tag::Anchor(name.to_string()).to_string();
    grid.cells()
        .find(|(_, value)| value.as_text() == Some(text.as_str()))
        .map(|(cell, _)| cell)
}

/// Structural anchors of a template.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Anchors {
    pub data_start: CellRef,
    pub data_end: CellRef,
    pub header_start: CellRef,
}

/// Locate all required anchors, reporting every missing one at once
pub fn require_anchors(grid: &Grid) -> Result<Anchors, ReportError> {
    let found: Vec<Option<CellRef>> = REQUIRED_ANCHORS
        .iter()
        .map(|name| find_anchor(grid, name))
        .collect();

    match found.as_slice() {
        [Some(data_start), Some(data_end), Some(header_start)] => Ok(Anchors {
            data_start: *data_start,
            data_end: *data_end,
            header_start: *header_start,
        }),
        _ => Err(ReportError::MissingAnchor {
            missing: REQUIRED_ANCHORS
                .iter()
                .zip(&found)
                .filter(|(_, cell)| cell.is_none())
                .map(|(name, _)| (*name).to_string())
                .collect(),
        }),
    }
}

/// Every tag cell in the grid, decoded.
///
/// Fails on the first subtotal/total tag that does not decode.
pub fn tags(grid: &Grid) -> Result<Vec<(CellRef, Tag)>, ReportError> {
    let mut out = Vec::new();
    for (cell, value) in grid.cells() {
        let Some(text) = value.as_text() else {
            continue;
        };
        match Tag::parse(text) {
            Ok(Some(tag)) => out.push((cell, tag)),
            Ok(None) => {}
            Err(source) => return Err(ReportError::TagDecode { cell, source }),
        }
    }
    Ok(out)
}

/// Cells that still carry anything shaped like a tag
pub fn tag_cells(grid: &Grid) -> Vec<CellRef> {
    find_all(grid, &GENERIC_PATTERN)
}
