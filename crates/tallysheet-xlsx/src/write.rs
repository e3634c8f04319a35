//! Workbook persistence
//!
//! The assembled grid is written to a fresh single-sheet workbook with the
//! template formats and styling from a [`StylePlan`]. Files are saved through a sibling temporary
//! file and a rename, so an output path either holds a complete report or is
//! left as it was.

use rust_xlsxwriter::{
    Format, FormatAlign, FormatBorder, FormatUnderline, Image, Workbook, Worksheet,
};
use std::fs;
use std::path::{Path, PathBuf};
use tallysheet_core::{CellRef, CellValue, Grid};
use tracing::debug;

use crate::format::{CellFormat, HorizontalAlign, NumberFormat, VerticalAlign};
use crate::style::{CellStyle, StylePlan};
use crate::WorkbookError;

/// Writes one report grid as an xlsx workbook
#[derive(Clone, Debug)]
pub struct ReportWriter<'a> {
    sheet_name: &'a str,
    plan: &'a StylePlan,
}

impl<'a> ReportWriter<'a> {
    pub fn new(sheet_name: &'a str, plan: &'a StylePlan) -> Self {
        Self { sheet_name, plan }
    }

    /// Generate workbook bytes
    pub fn to_bytes(&self, grid: &Grid) -> Result<Vec<u8>, WorkbookError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(self.sheet_name)?;

        self.write_cells(sheet, grid)?;
        self.write_merges(sheet, grid)?;
        if let Some((cell, path)) = &self.plan.image {
            let size = self.plan.icon_size;
            let image = Image::new(path)?.set_scale_to_size(size, size, true);
            sheet.insert_image(cell.row, cell.col, &image)?;
        }
        sheet.autofit();
        for (col, width) in &self.plan.column_widths {
            sheet.set_column_width(*col, character_width(*width))?;
        }

        Ok(workbook.save_to_buffer()?)
    }

    /// Write every occupied or styled cell outside merged ranges
    fn write_cells(&self, sheet: &mut Worksheet, grid: &Grid) -> Result<(), WorkbookError> {
        let mut cells: Vec<CellRef> = grid.cells().map(|(cell, _)| cell).collect();
        cells.extend(self.plan.styles.keys().copied());
        cells.extend(self.plan.base.keys().copied());
        cells.sort_unstable();
        cells.dedup();

        for cell in cells {
            if self.plan.merge_at(cell).is_some() {
                continue;
            }
            let value = grid.get(cell);
            let mut style = self.plan.style_of(cell);
            style.date |= value.is_date();
            write_value(sheet, cell, value, &self.format(&style, self.plan.base_of(cell)))?;
        }
        Ok(())
    }

    fn write_merges(&self, sheet: &mut Worksheet, grid: &Grid) -> Result<(), WorkbookError> {
        for merge in &self.plan.merges {
            let format = self.format(
                &self.plan.merged_style(merge),
                self.plan.base_of(merge.first),
            );
            let (first, last) = (merge.first, merge.last);
            sheet.merge_range(first.row, first.col, last.row, last.col, "", &format)?;

            let value = grid.get(first);
            if !value.is_empty() {
                write_value(sheet, first, value, &format)?;
            }
        }
        Ok(())
    }

    fn format(&self, style: &CellStyle, base: Option<&CellFormat>) -> Format {
        let mut format = match base {
            // Dates take the report date format instead
            Some(base) if style.date => template_format(&CellFormat {
                number_format: None,
                ..base.clone()
            }),
            Some(base) => template_format(base),
            None => Format::new(),
        };
        if style.bold {
            format = format.set_bold();
        }
        if let Some(color) = style.fill {
            format = format.set_background_color(color);
        }
        if style.border.top {
            format = format.set_border_top(FormatBorder::Medium);
        }
        if style.border.bottom {
            format = format.set_border_bottom(FormatBorder::Medium);
        }
        if style.border.left {
            format = format.set_border_left(FormatBorder::Medium);
        }
        if style.border.right {
            format = format.set_border_right(FormatBorder::Medium);
        }
        if style.date {
            format = format.set_num_format(&self.plan.date_format);
        }
        if style.vertical {
            format = format
                .set_rotation(90)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter);
        }
        format
    }
}

/// Template cell format as a writer format
fn template_format(base: &CellFormat) -> Format {
    let mut format = Format::new();
    match &base.number_format {
        Some(NumberFormat::BuiltIn(index)) => format = format.set_num_format_index(*index),
        Some(NumberFormat::Custom(code)) => format = format.set_num_format(code),
        None => {}
    }
    if let Some(font) = &base.font {
        if let Some(name) = &font.name {
            format = format.set_font_name(name);
        }
        if let Some(size) = font.size {
            format = format.set_font_size(size);
        }
        if let Some(color) = font.color {
            format = format.set_font_color(color);
        }
        if font.bold {
            format = format.set_bold();
        }
        if font.italic {
            format = format.set_italic();
        }
        if font.underline {
            format = format.set_underline(FormatUnderline::Single);
        }
    }
    if let Some(color) = base.fill {
        format = format.set_background_color(color);
    }
    if let Some(align) = base.horizontal {
        format = format.set_align(match align {
            HorizontalAlign::General => FormatAlign::General,
            HorizontalAlign::Left => FormatAlign::Left,
            HorizontalAlign::Center => FormatAlign::Center,
            HorizontalAlign::Right => FormatAlign::Right,
            HorizontalAlign::Fill => FormatAlign::Fill,
            HorizontalAlign::Justify => FormatAlign::Justify,
            HorizontalAlign::CenterAcross => FormatAlign::CenterAcross,
            HorizontalAlign::Distributed => FormatAlign::Distributed,
        });
    }
    if let Some(align) = base.vertical {
        format = format.set_align(match align {
            VerticalAlign::Top => FormatAlign::Top,
            VerticalAlign::Center => FormatAlign::VerticalCenter,
            VerticalAlign::Bottom => FormatAlign::Bottom,
            VerticalAlign::Justify => FormatAlign::VerticalJustify,
            VerticalAlign::Distributed => FormatAlign::VerticalDistributed,
        });
    }
    if base.wrap {
        format = format.set_text_wrap();
    }
    format
}

/// Stored column width (characters plus cell padding) as a character width,
/// for 7 px digits and 5 px of padding
fn character_width(stored: f64) -> f64 {
    let pixels = (stored * 7.0).round();
    ((pixels - 5.0) / 7.0).max(0.0)
}

fn write_value(
    sheet: &mut Worksheet,
    cell: CellRef,
    value: &CellValue,
    format: &Format,
) -> Result<(), WorkbookError> {
    let (row, col) = (cell.row, cell.col);
    match value {
        CellValue::Empty => {
            sheet.write_blank(row, col, format)?;
        }
        CellValue::Text(text) => {
            sheet.write_string_with_format(row, col, text, format)?;
        }
        CellValue::Number(number) => {
            sheet.write_number_with_format(row, col, *number, format)?;
        }
        CellValue::Bool(flag) => {
            sheet.write_boolean_with_format(row, col, *flag, format)?;
        }
        CellValue::Date(date) => {
            sheet.write_datetime_with_format(row, col, date, format)?;
        }
        CellValue::DateTime(datetime) => {
            sheet.write_datetime_with_format(row, col, datetime, format)?;
        }
        CellValue::Formula(formula) => {
            sheet.write_formula_with_format(row, col, formula.as_str(), format)?;
        }
    }
    Ok(())
}

/// Check that `path` may be written, creating its parent directory.
///
/// An existing file is refused unless `force` is set.
pub fn prepare_output(path: &Path, force: bool) -> Result<(), WorkbookError> {
    if path.exists() && !force {
        return Err(WorkbookError::OutputExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

/// Write `bytes` to `path` via a temporary sibling and a rename
pub fn save_atomic(path: &Path, bytes: &[u8]) -> Result<(), WorkbookError> {
    let partial = partial_path(path);
    fs::write(&partial, bytes)?;
    if let Err(e) = fs::rename(&partial, path) {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    debug!(path = %path.display(), bytes = bytes.len(), "saved workbook");
    Ok(())
}
