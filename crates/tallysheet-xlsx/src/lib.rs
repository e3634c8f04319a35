//! tallysheet-xlsx: workbook I/O for tallysheet reports
//!
//! Reads templates and raw report exports with calamine, template formatting
//! with zip and quick-xml, and writes assembled report grids back out with
//! rust_xlsxwriter.
//!
//! ```text
//! template.xlsx ──load_template──▶ Grid ──ReportPipeline──▶ Grid + ReportOutcome
//!                                                              │
//!                                       StylePlan::build ◀─────┘
//!                                              │
//!                             ReportWriter::to_bytes ──save_atomic──▶ formatted_*.xlsx
//! ```

use std::path::PathBuf;
use thiserror::Error;

pub mod format;
pub mod read;
pub mod style;
pub mod write;

pub use format::{read_sheet_formats, CellFormat, SheetFormats};
pub use read::{load_records, load_template, Template};
pub use style::{CellStyle, Merge, StyleConfig, StylePlan};
pub use write::{prepare_output, save_atomic, ReportWriter};

// ============================================================================
// Errors
// ============================================================================

/// Workbook I/O error
#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Read error: {0}")]
    Read(#[from] calamine::Error),

    #[error("Package error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("Write error: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("Worksheet '{sheet}' not found in {}", path.display())]
    MissingSheet { sheet: String, path: PathBuf },

    #[error("Workbook has no worksheets: {}", .0.display())]
    NoWorksheet(PathBuf),

    #[error("Output already exists: {} (use --force to overwrite)", .0.display())]
    OutputExists(PathBuf),
}
