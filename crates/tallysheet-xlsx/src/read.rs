//! Workbook loading
//!
//! Templates keep every occupied cell of their first worksheet at its absolute
//! position, along with the formats of that sheet. Record sheets are read as a table: the first non-empty row names
//! the columns and every following non-empty row is one record.

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;
use tallysheet_core::{CellRef, CellValue, Grid, Record, RecordSet};
use tracing::{debug, warn};

use crate::format::{read_sheet_formats, SheetFormats};
use crate::WorkbookError;

/// A template worksheet, loaded into a grid
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub sheet_name: String,
    pub grid: Grid,
    /// Cell formats and column widths carried into every report
    pub formats: SheetFormats,
}

/// Convert a calamine cell into a grid value
fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => parse_iso(s).unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

fn parse_iso(text: &str) -> Option<CellValue> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(CellValue::DateTime(dt));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(CellValue::Date)
}

/// Absolute cell position of a range entry
fn absolute(range_start: (u32, u32), row: usize, col: usize) -> CellRef {
    CellRef::new(range_start.0 + row as u32, (range_start.1 as usize + col) as u16)
}

fn grid_from_ranges(values: &Range<Data>, formulas: &Range<String>) -> Grid {
    let mut grid = Grid::new();
    if let Some(start) = values.start() {
        for (row, col, data) in values.used_cells() {
            grid.set(absolute(start, row, col), cell_value(data));
        }
    }
    // Formulas win over their cached values
    if let Some(start) = formulas.start() {
        for (row, col, formula) in formulas.used_cells() {
            if !formula.is_empty() {
                grid.set(absolute(start, row, col), CellValue::Formula(format!("={formula}")));
            }
        }
    }
    grid
}

/// Load the first worksheet of a template workbook.
pub fn load_template(path: &Path) -> Result<Template, WorkbookError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| WorkbookError::NoWorksheet(path.to_path_buf()))?;

    let values = workbook.worksheet_range(&sheet_name)?;
    let formulas = workbook.worksheet_formula(&sheet_name)?;
    let grid = grid_from_ranges(&values, &formulas);

    // Templates that are not xlsx packages (xls, ods) load without formats
    let formats = read_sheet_formats(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "template formats unavailable");
        SheetFormats::default()
    });

    debug!(path = %path.display(), sheet = %sheet_name, cells = grid.len(), "loaded template");
    Ok(Template {
        sheet_name,
        grid,
        formats,
    })
}

/// Load the records of worksheet `sheet` from a report export.
pub fn load_records(path: &Path, sheet: &str) -> Result<RecordSet, WorkbookError> {
    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(WorkbookError::MissingSheet {
            sheet: sheet.to_string(),
            path: path.to_path_buf(),
        });
    }
    let range = workbook.worksheet_range(sheet)?;

    let mut rows = range
        .rows()
        .filter(|row| row.iter().any(|data| !matches!(data, Data::Empty)));
    let Some(header) = rows.next() else {
        return Ok(RecordSet::default());
    };

    let columns: Vec<String> = header.iter().map(|data| cell_value(data).to_string()).collect();
    let mut set = RecordSet::new(columns);
    for row in rows {
        set.push(Record::new(row.iter().map(cell_value).collect()));
    }

    debug!(
        path = %path.display(),
        sheet,
        columns = set.columns.len(),
        records = set.len(),
        "loaded records"
    );
    Ok(set)
}
