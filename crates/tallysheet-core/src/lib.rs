//! # tallysheet-core
//!
//! Core domain model for tag-driven spreadsheet report assembly.
//!
//! This crate provides:
//! - Grid types: `CellRef`, `CellValue`, `Grid`, `RenderedExtent`
//! - Input types: `Record`, `RecordSet`
//! - The `Tag` variant type and its text grammar (see [`tag`])
//! - Tag scanning over a grid (see [`scan`])
//! - Error types shared by every pipeline stage
//!
//! ## Example
//!
//! ```rust
//! use tallysheet_core::{CellRef, CellValue, Grid};
//!
//! let mut grid = Grid::new();
//! let anchor = CellRef::new(4, 1);
//! grid.set(anchor, "<data_start>");
//!
//! let below = anchor.offset(1, 0).unwrap();
//! grid.set(below, 42.0);
//!
//! assert_eq!(anchor.to_string(), "B5");
//! assert_eq!(grid.get(below), &CellValue::Number(42.0));
//! ```

pub mod scan;
pub mod tag;

pub use tag::{Tag, TagDecodeError};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Coordinates
// ============================================================================

/// Zero-based cell coordinate.
///
/// Ordering is row-major, which is also the natural scan order of a [`Grid`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u16,
}

impl CellRef {
    pub const fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// Cell `rows` below and `cols` right of this one (negative moves up/left).
    ///
    /// Returns `None` when the result would fall outside the sheet.
    pub fn offset(self, rows: i64, cols: i64) -> Option<Self> {
        let row = i64::from(self.row).checked_add(rows)?;
        let col = i64::from(self.col).checked_add(cols)?;
        Some(Self {
            row: u32::try_from(row).ok()?,
            col: u16::try_from(col).ok()?,
        })
    }

    /// Column letters (0 -> A, 25 -> Z, 26 -> AA)
    pub fn column_letter(col: u16) -> String {
        let mut result = String::new();
        let mut n = col as u32;
        loop {
            result.insert(0, (b'A' + (n % 26) as u8) as char);
            if n < 26 {
                break;
            }
            n = n / 26 - 1;
        }
        result
    }

    /// Parse an A1-style reference such as `C12`.
    pub fn parse_a1(text: &str) -> Option<Self> {
        let split = text.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = text.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
            return None;
        }
        let mut col: u32 = 0;
        for c in letters.chars() {
            col = col.checked_mul(26)?.checked_add(c as u32 - 'A' as u32 + 1)?;
        }
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self {
            row: row - 1,
            col: u16::try_from(col - 1).ok()?,
        })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::column_letter(self.col), self.row + 1)
    }
}

/// The occupied region of the grid after rendering.
///
/// Both corners are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedExtent {
    pub start: CellRef,
    pub end: CellRef,
}

impl RenderedExtent {
    pub fn new(start: CellRef, end: CellRef) -> Self {
        Self { start, end }
    }

    pub fn rows(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn columns(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.col..=self.end.col).contains(&cell.col)
    }

    /// All cells of the extent in row-major order
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.start.row..=self.end.row)
            .flat_map(move |row| (self.start.col..=self.end.col).map(move |col| CellRef::new(row, col)))
    }
}

impl fmt::Display for RenderedExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

// ============================================================================
// Values
// ============================================================================

/// Value held by a cell or a record field.
///
/// `Empty` in a record means the field is undefined.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Formula text including the leading `=`. Never evaluated locally.
    Formula(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, CellValue::Date(_) | CellValue::DateTime(_))
    }

    fn kind_rank(&self) -> u8 {
        match self {
            CellValue::Number(_) => 0,
            CellValue::Bool(_) => 1,
            CellValue::Date(_) | CellValue::DateTime(_) => 2,
            CellValue::Text(_) => 3,
            CellValue::Formula(_) => 4,
            CellValue::Empty => 5,
        }
    }

    /// Total order used for sorting records.
    ///
    /// Values of the same kind compare naturally (dates chronologically, text
    /// lexicographically). Mixed kinds order by kind, with empty values last.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => a.total_cmp(b),
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (CellValue::Formula(a), CellValue::Formula(b)) => a.cmp(b),
            (a, b) if a.is_date() && b.is_date() => a.as_datetime().cmp(&b.as_datetime()),
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }

    fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Date(d) => d.and_hms_opt(0, 0, 0),
            CellValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) | CellValue::Formula(s) => f.write_str(s),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{n:.0}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(d: NaiveDate) -> Self {
        CellValue::Date(d)
    }
}

// ============================================================================
// Grid
// ============================================================================

static EMPTY: CellValue = CellValue::Empty;

/// Sparse, mutable 2-D surface of cells.
///
/// Only occupied cells are stored; writing `CellValue::Empty` removes a cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    cells: BTreeMap<CellRef, CellValue>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cell: CellRef) -> &CellValue {
        self.cells.get(&cell).unwrap_or(&EMPTY)
    }

    pub fn set(&mut self, cell: CellRef, value: impl Into<CellValue>) {
        match value.into() {
            CellValue::Empty => {
                self.cells.remove(&cell);
            }
            value => {
                self.cells.insert(cell, value);
            }
        }
    }

    pub fn clear(&mut self, cell: CellRef) {
        self.cells.remove(&cell);
    }

    /// Resolve a cell relative to `anchor`, failing if it leaves the sheet
    pub fn locate(anchor: CellRef, rows: i64, cols: i64) -> Result<CellRef, ReportError> {
        anchor
            .offset(rows, cols)
            .ok_or(ReportError::OutOfBounds { anchor, rows, cols })
    }

    /// Value of the cell `rows`/`cols` away from `anchor`
    pub fn get_offset(&self, anchor: CellRef, rows: i64, cols: i64) -> Result<&CellValue, ReportError> {
        Ok(self.get(Self::locate(anchor, rows, cols)?))
    }

    /// Write the cell `rows`/`cols` away from `anchor`, returning its coordinate
    pub fn set_offset(
        &mut self,
        anchor: CellRef,
        rows: i64,
        cols: i64,
        value: impl Into<CellValue>,
    ) -> Result<CellRef, ReportError> {
        let cell = Self::locate(anchor, rows, cols)?;
        self.set(cell, value);
        Ok(cell)
    }

    /// Occupied cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &CellValue)> {
        self.cells.iter().map(|(cell, value)| (*cell, value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

// ============================================================================
// Records
// ============================================================================

/// One input row; values are positional against [`RecordSet::columns`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub values: Vec<CellValue>,
}

impl Record {
    pub fn new(values: Vec<CellValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> &CellValue {
        self.values.get(index).unwrap_or(&EMPTY)
    }
}

/// Named columns plus the records that fill them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl RecordSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Append a record, padding or truncating it to the column count
    pub fn push(&mut self, mut record: Record) {
        record.values.resize(self.columns.len(), CellValue::Empty);
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, ReportError> {
        self.column_index(name)
            .ok_or_else(|| ReportError::MissingColumn(name.to_string()))
    }

    /// Field `column` of `record`, or `Empty` if the column is unknown
    pub fn value<'a>(&self, record: &'a Record, column: &str) -> &'a CellValue {
        match self.column_index(column) {
            Some(index) => record.get(index),
            None => &EMPTY,
        }
    }

    /// Sum of the numeric values of a column; non-numeric fields are ignored
    pub fn column_sum(&self, column: &str) -> Option<f64> {
        let index = self.column_index(column)?;
        Some(
            self.records
                .iter()
                .filter_map(|r| r.get(index).as_number())
                .sum(),
        )
    }

    /// Remove a column and its values; returns false if it was absent
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(index);
        for record in &mut self.records {
            if index < record.values.len() {
                record.values.remove(index);
            }
        }
        true
    }

    /// Rearrange columns into `order`, which must name exactly the current columns
    pub fn reorder(&mut self, order: &[String]) -> Result<(), ReportError> {
        let mut indices = Vec::with_capacity(order.len());
        for name in order {
            indices.push(self.require_column(name)?);
        }
        if indices.len() != self.columns.len() {
            let extra = self
                .columns
                .iter()
                .find(|c| !order.contains(c))
                .cloned()
                .unwrap_or_default();
            return Err(ReportError::MissingColumn(extra));
        }
        for record in &mut self.records {
            record.values = indices.iter().map(|&i| record.get(i).clone()).collect();
        }
        self.columns = order.to_vec();
        Ok(())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Report-scoped failure. Any of these abandons the whole report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Missing anchor tag(s) in template: {}", .missing.join(", "))]
    MissingAnchor { missing: Vec<String> },

    #[error("Cannot derive a group identifier for record {record} from {text:?}")]
    Extraction { record: usize, text: String },

    #[error("Undecodable tag at {cell}: {source}")]
    TagDecode {
        cell: CellRef,
        #[source]
        source: TagDecodeError,
    },

    #[error("Column name {column:?} cannot be encoded in a tag")]
    UnencodableColumn { column: String },

    #[error("Cell {cell} is covered by both the subtotal at {first} and the subtotal at {second}")]
    AmbiguousRowClassification {
        cell: CellRef,
        first: CellRef,
        second: CellRef,
    },

    #[error("Offset ({rows}, {cols}) from {anchor} falls outside the sheet")]
    OutOfBounds { anchor: CellRef, rows: i64, cols: i64 },

    #[error("Column not found: {0}")]
    MissingColumn(String),
}

// ============================================================================
// Tests
// ============================================================================
