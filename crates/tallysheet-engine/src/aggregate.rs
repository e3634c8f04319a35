//! Subtotal and total synthesis
//!
//! Second pass over the rendered grid. Every `<subtotal_{size}_{column}>` and
//! `<total_{column}>` tag is decoded, then overwritten according to the
//! semantic of its column:
//!
//! | Semantic | Subtotal                         | Total                                   |
//! |----------|----------------------------------|-----------------------------------------|
//! | Ratio    | `=<one left>/<two left>`         | same                                    |
//! | Count    | `=SUM(<size cells above>)`       | subtotals above + uncovered data cells  |
//! | Label    | `Total`                          | `TOTAL`                                 |
//! | Other    | left as a tag (stripped later)   | left as a tag (stripped later)          |
//!
//! A cell is *covered* when it lies in the `size` rows above a subtotal in the
//! same column, or is the subtotal itself. Totals add each covered group once
//! through its subtotal and each uncovered, non-empty cell once directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tallysheet_core::{scan, CellRef, CellValue, Grid, RenderedExtent, ReportError, Tag};
use tracing::debug;

/// How a column's aggregate cells are filled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnSemantic {
    Ratio,
    Count,
    Label,
    Other,
}

/// Column name to semantic mapping plus label texts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSemantics {
    pub ratio: Vec<String>,
    pub count: Vec<String>,
    pub label: Vec<String>,
    pub subtotal_label: String,
    pub total_label: String,
}

impl Default for ColumnSemantics {
    fn default() -> Self {
        Self {
            ratio: vec!["Ad server CTR".into()],
            count: vec!["Ad server impressions".into(), "Ad server clicks".into()],
            label: vec!["Delivery Indicator".into()],
            subtotal_label: "Total".into(),
            total_label: "TOTAL".into(),
        }
    }
}

impl ColumnSemantics {
    pub fn classify(&self, column: &str) -> ColumnSemantic {
        let named = |list: &[String]| list.iter().any(|c| c == column);
        if named(&self.ratio) {
            ColumnSemantic::Ratio
        } else if named(&self.count) {
            ColumnSemantic::Count
        } else if named(&self.label) {
            ColumnSemantic::Label
        } else {
            ColumnSemantic::Other
        }
    }
}

/// A decoded subtotal tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubtotalCell {
    pub cell: CellRef,
    pub size: u32,
    pub column: String,
    pub semantic: ColumnSemantic,
}

impl SubtotalCell {
    /// First and last cell of the group directly above this subtotal
    pub fn contributing(&self) -> Result<(CellRef, CellRef), ReportError> {
        let first = Grid::locate(self.cell, -i64::from(self.size), 0)?;
        let last = Grid::locate(self.cell, -1, 0)?;
        Ok((first, last))
    }

    /// Rows this subtotal accounts for, including its own row
    fn covered_rows(&self) -> std::ops::RangeInclusive<u32> {
        self.cell.row.saturating_sub(self.size)..=self.cell.row
    }

    pub fn covers(&self, cell: CellRef) -> bool {
        cell.col == self.cell.col && self.covered_rows().contains(&cell.row)
    }
}

/// A decoded total tag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TotalCell {
    pub cell: CellRef,
    pub column: String,
    pub semantic: ColumnSemantic,
}

/// Every aggregate cell found, and what was written
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resolution {
    pub subtotals: Vec<SubtotalCell>,
    pub totals: Vec<TotalCell>,
    /// Values written, in write order
    pub writes: Vec<(CellRef, CellValue)>,
}

fn ratio_formula(cell: CellRef) -> Result<CellValue, ReportError> {
    let numerator = Grid::locate(cell, 0, -1)?;
    let denominator = Grid::locate(cell, 0, -2)?;
    Ok(CellValue::Formula(format!("={numerator}/{denominator}")))
}

fn sum_formula(subtotal: &SubtotalCell) -> Result<CellValue, ReportError> {
    let (first, last) = subtotal.contributing()?;
    Ok(CellValue::Formula(format!("=SUM({first}:{last})")))
}

fn add_formula(cells: &[CellRef]) -> CellValue {
    if cells.is_empty() {
        return CellValue::Formula("=0".into());
    }
    let terms: Vec<String> = cells.iter().map(ToString::to_string).collect();
    CellValue::Formula(format!("={}", terms.join("+")))
}

/// Subtotals grouped by grid column, each list sorted by row.
///
/// Fails if two subtotals in one column claim the same cell.
fn coverage_by_column(subtotals: &[SubtotalCell]) -> Result<BTreeMap<u16, Vec<&SubtotalCell>>, ReportError> {
    let mut by_column: BTreeMap<u16, Vec<&SubtotalCell>> = BTreeMap::new();
    for subtotal in subtotals {
        by_column.entry(subtotal.cell.col).or_default().push(subtotal);
    }
    for list in by_column.values_mut() {
        list.sort_by_key(|s| s.cell.row);
        for pair in list.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            let next_start = *next.covered_rows().start();
            if next_start <= prev.cell.row {
                let prev_start = *prev.covered_rows().start();
                return Err(ReportError::AmbiguousRowClassification {
                    cell: CellRef::new(next_start.max(prev_start), next.cell.col),
                    first: prev.cell,
                    second: next.cell,
                });
            }
        }
    }
    Ok(by_column)
}

/// Cells a count total adds: subtotals above it, then uncovered populated cells
fn total_terms(
    grid: &Grid,
    extent: RenderedExtent,
    total: &TotalCell,
    column_subtotals: &[&SubtotalCell],
) -> Vec<CellRef> {
    let above: Vec<&SubtotalCell> = column_subtotals
        .iter()
        .copied()
        .filter(|s| s.cell.row >= extent.start.row && s.cell.row < total.cell.row)
        .collect();

    let mut terms: Vec<CellRef> = above.iter().map(|s| s.cell).collect();
    terms.extend(
        (extent.start.row..total.cell.row)
            .map(|row| CellRef::new(row, total.cell.col))
            .filter(|cell| !above.iter().any(|s| s.covers(*cell)))
            .filter(|cell| !grid.get(*cell).is_empty()),
    );
    terms
}

/// Replace every subtotal/total tag in `grid` with its formula or label.
///
/// Nothing is written unless every tag decodes and every formula can be built.
pub fn resolve(
    grid: &mut Grid,
    extent: RenderedExtent,
    semantics: &ColumnSemantics,
) -> Result<Resolution, ReportError> {
    let mut resolution = Resolution::default();

    for (cell, tag) in scan::tags(grid)? {
        match tag {
            Tag::Subtotal { size, column } => resolution.subtotals.push(SubtotalCell {
                cell,
                size,
                semantic: semantics.classify(&column),
                column,
            }),
            Tag::Total { column } => resolution.totals.push(TotalCell {
                cell,
                semantic: semantics.classify(&column),
                column,
            }),
            Tag::Anchor(_) | Tag::Decorative(_) => {}
        }
    }

    let coverage = coverage_by_column(&resolution.subtotals)?;
    let mut writes = Vec::new();

    // Totals without dependencies first
    for total in &resolution.totals {
        match total.semantic {
            ColumnSemantic::Ratio => writes.push((total.cell, ratio_formula(total.cell)?)),
            ColumnSemantic::Label => {
                writes.push((total.cell, CellValue::from(semantics.total_label.as_str())));
            }
            ColumnSemantic::Count | ColumnSemantic::Other => {}
        }
    }

    for total in resolution.totals.iter().filter(|t| t.semantic == ColumnSemantic::Count) {
        let column_subtotals = coverage
            .get(&total.cell.col)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let terms = total_terms(grid, extent, total, column_subtotals);
        writes.push((total.cell, add_formula(&terms)));
    }

    for subtotal in &resolution.subtotals {
        let value = match subtotal.semantic {
            ColumnSemantic::Ratio => ratio_formula(subtotal.cell)?,
            ColumnSemantic::Count => sum_formula(subtotal)?,
            ColumnSemantic::Label => CellValue::from(semantics.subtotal_label.as_str()),
            ColumnSemantic::Other => continue,
        };
        writes.push((subtotal.cell, value));
    }

    for (cell, value) in &writes {
        grid.set(*cell, value.clone());
    }

    debug!(
        subtotals = resolution.subtotals.len(),
        totals = resolution.totals.len(),
        written = writes.len(),
        "resolved aggregate tags"
    );
    resolution.writes = writes;
    Ok(resolution)
}
