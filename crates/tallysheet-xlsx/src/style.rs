//! Report styling
//!
//! A [`StylePlan`] records per-cell formatting, merged ranges and the icon
//! image for an assembled report. It is computed from the grid and the
//! [`ReportOutcome`] so the writer never has to rediscover where subtotals or
//! decorative rows ended up.
//!
//! Template formats are the base layer. Cells outside the rendered extent keep
//! their own; inside it every column takes the font, alignment and number
//! format of its first data row. [`CellStyle`] is applied on top.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tallysheet_core::tag::TOTAL_BAR;
use tallysheet_core::{CellRef, Grid, RenderedExtent, Tag};
use tallysheet_engine::ReportOutcome;
use tracing::{debug, warn};

use crate::format::{CellFormat, SheetFormats};

/// Styling options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Columns whose cells are merged across each subtotalled group
    pub merge_columns: Vec<String>,
    /// Placeholder whose cell becomes a vertical block beside the data
    pub order_placeholder: String,
    /// Template tag marking where the icon goes
    pub icon_placeholder: String,
    pub icon: Option<PathBuf>,
    /// Icon bounding box in pixels
    pub icon_size: u32,
    pub date_format: String,
    pub total_bar_fill: u32,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            merge_columns: vec![
                "Delivery Indicator".into(),
                "Line item start date".into(),
                "Line item end date".into(),
                "Goal quantity".into(),
            ],
            order_placeholder: "order_id".into(),
            icon_placeholder: "icon".into(),
            icon: None,
            icon_size: 80,
            date_format: "dd/mm/yyyy".into(),
            total_bar_fill: 0xF2F2F2,
        }
    }
}

/// Medium border edges of one cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Edges {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

/// Formatting of one cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellStyle {
    pub bold: bool,
    pub fill: Option<u32>,
    pub border: Edges,
    pub date: bool,
    /// Rotated 90 degrees and centred
    pub vertical: bool,
}

impl CellStyle {
    /// Union of two styles; used for the single format of a merged range
    pub fn combine(self, other: CellStyle) -> CellStyle {
        CellStyle {
            bold: self.bold || other.bold,
            fill: self.fill.or(other.fill),
            border: Edges {
                top: self.border.top || other.border.top,
                bottom: self.border.bottom || other.border.bottom,
                left: self.border.left || other.border.left,
                right: self.border.right || other.border.right,
            },
            date: self.date || other.date,
            vertical: self.vertical || other.vertical,
        }
    }
}

/// Rectangular merged range, both corners inclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Merge {
    pub first: CellRef,
    pub last: CellRef,
}

impl Merge {
    pub fn contains(&self, cell: CellRef) -> bool {
        (self.first.row..=self.last.row).contains(&cell.row)
            && (self.first.col..=self.last.col).contains(&cell.col)
    }

    pub fn overlaps(&self, other: &Merge) -> bool {
        self.first.row <= other.last.row
            && other.first.row <= self.last.row
            && self.first.col <= other.last.col
            && other.first.col <= self.last.col
    }

    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.first.row..=self.last.row)
            .flat_map(move |row| (self.first.col..=self.last.col).map(move |col| CellRef::new(row, col)))
    }
}

/// Everything the writer applies on top of cell values
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StylePlan {
    /// Template formats, laid out over the report
    pub base: BTreeMap<CellRef, CellFormat>,
    pub column_widths: BTreeMap<u16, f64>,
    pub styles: BTreeMap<CellRef, CellStyle>,
    pub merges: Vec<Merge>,
    pub image: Option<(CellRef, PathBuf)>,
    pub icon_size: u32,
    pub date_format: String,
}

impl StylePlan {
    /// Plan the styling of an assembled report
    pub fn build(
        grid: &Grid,
        outcome: &ReportOutcome,
        config: &StyleConfig,
        formats: &SheetFormats,
    ) -> StylePlan {
        let mut plan = StylePlan {
            base: carried_formats(formats, outcome.extent),
            column_widths: formats.column_widths.clone(),
            icon_size: config.icon_size,
            date_format: config.date_format.clone(),
            ..StylePlan::default()
        };
        let extent = outcome.extent;

        // Former tag cells: formulas, labels and the total bar
        for (cell, _) in &outcome.resolution.writes {
            plan.style(*cell).bold = true;
        }
        for (cell, text) in &outcome.stripped {
            match Tag::parse(text) {
                Ok(Some(Tag::Decorative(name))) if name == TOTAL_BAR => {
                    let style = plan.style(*cell);
                    style.bold = true;
                    style.fill = Some(config.total_bar_fill);
                }
                Ok(Some(Tag::Anchor(name))) if name == config.icon_placeholder => {
                    if let Some(icon) = &config.icon {
                        plan.image = Some((*cell, icon.clone()));
                    }
                }
                _ if extent.contains(*cell) => plan.style(*cell).bold = true,
                _ => {}
            }
        }

        for cell in extent.cells() {
            if grid.get(cell).is_date() {
                plan.style(cell).date = true;
            }
        }
        plan.outline(extent.start, extent.end);

        for subtotal in &outcome.resolution.subtotals {
            if !config.merge_columns.contains(&subtotal.column) {
                continue;
            }
            if let Ok((first, last)) = subtotal.contributing() {
                plan.add_merge(Merge { first, last });
            }
        }

        if let Some((cell, _)) = outcome
            .placeholders
            .iter()
            .find(|(_, name)| *name == config.order_placeholder)
        {
            plan.order_block(*cell, extent.end.row);
        }

        debug!(
            carried = plan.base.len(),
            styled = plan.styles.len(),
            merges = plan.merges.len(),
            image = plan.image.is_some(),
            "planned report styling"
        );
        plan
    }

    fn style(&mut self, cell: CellRef) -> &mut CellStyle {
        self.styles.entry(cell).or_default()
    }

    /// Medium border around the rectangle `first..=last`
    fn outline(&mut self, first: CellRef, last: CellRef) {
        for row in first.row..=last.row {
            for col in first.col..=last.col {
                let style = self.style(CellRef::new(row, col));
                style.border.top |= row == first.row;
                style.border.bottom |= row == last.row;
                style.border.left |= col == first.col;
                style.border.right |= col == last.col;
            }
        }
    }

    /// Vertical, boxed block from `cell` down to `last_row`
    fn order_block(&mut self, cell: CellRef, last_row: u32) {
        let last = CellRef::new(last_row.max(cell.row), cell.col);
        let merged = last == cell || self.add_merge(Merge { first: cell, last });
        if merged {
            self.outline(cell, last);
            self.style(cell).vertical = true;
        }
    }

    /// Add a merge unless it overlaps one already planned
    pub fn add_merge(&mut self, merge: Merge) -> bool {
        if let Some(existing) = self.merges.iter().find(|m| m.overlaps(&merge)) {
            warn!(
                range = %format!("{}:{}", merge.first, merge.last),
                existing = %format!("{}:{}", existing.first, existing.last),
                "skipping overlapping merge"
            );
            return false;
        }
        self.merges.push(merge);
        true
    }

    /// Merge containing `cell`, if any
    pub fn merge_at(&self, cell: CellRef) -> Option<&Merge> {
        self.merges.iter().find(|m| m.contains(cell))
    }

    pub fn base_of(&self, cell: CellRef) -> Option<&CellFormat> {
        self.base.get(&cell)
    }

    pub fn style_of(&self, cell: CellRef) -> CellStyle {
        self.styles.get(&cell).copied().unwrap_or_default()
    }

    /// Combined style of every cell in a merged range
    pub fn merged_style(&self, merge: &Merge) -> CellStyle {
        merge
            .cells()
            .map(|cell| self.style_of(cell))
            .fold(CellStyle::default(), CellStyle::combine)
    }
}

/// Template formats placed over the report.
///
/// Inside `extent`, each column copies the format of its first row; columns
/// whose first row is unformatted keep each cell's own format.
fn carried_formats(
    formats: &SheetFormats,
    extent: RenderedExtent,
) -> BTreeMap<CellRef, CellFormat> {
    let mut base: BTreeMap<CellRef, CellFormat> = formats.cells.clone();
    for col in extent.start.col..=extent.end.col {
        let Some(source) = formats.get(CellRef::new(extent.start.row, col)) else {
            continue;
        };
        for row in extent.start.row..=extent.end.row {
            let cell = CellRef::new(row, col);
            let format = source.copied_onto(formats.get(cell));
            if format.is_default() {
                base.remove(&cell);
            } else {
                base.insert(cell, format);
            }
        }
    }
    base
}
