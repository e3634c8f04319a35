//! End-of-run summary
//!
//! Every processed input gets one [`ReportSummary`], successful or not. The
//! summary lists the totals of the count columns over the cleaned records so
//! they can be compared by hand against the totals written into the report.
//!
//! ## Exit Code Semantics
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Success: every selected report was written |
//! | 1 | Failure: at least one report failed, or the run could not start |

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

// ============================================================================
// Exit Code
// ============================================================================

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
}

impl ExitCode {
    pub fn from_failure_count(count: usize) -> Self {
        if count > 0 {
            ExitCode::Failure
        } else {
            ExitCode::Success
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code as u8)
    }
}

// ============================================================================
// Summaries
// ============================================================================

/// Outcome of one input file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub input: PathBuf,
    /// Output file name
    pub report: String,
    pub order_id: Option<String>,
    /// Count column totals over the cleaned records
    pub totals: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportSummary {
    pub fn failed(input: PathBuf, report: String, error: &anyhow::Error) -> Self {
        Self {
            input,
            report,
            order_id: None,
            totals: BTreeMap::new(),
            error: Some(format!("{error:#}")),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// All reports of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub formatted: usize,
    pub failed: usize,
    pub reports: Vec<ReportSummary>,
}

impl RunSummary {
    pub fn new(reports: Vec<ReportSummary>) -> Self {
        let failed = reports.iter().filter(|r| !r.is_success()).count();
        Self {
            formatted: reports.len() - failed,
            failed,
            reports,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from_failure_count(self.failed)
    }
}

// ============================================================================
// Emitters
// ============================================================================

/// Output format of the summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

const DIVIDER: &str = "----------------------------------------";

/// Human-readable summary
pub fn emit_text<W: Write>(mut writer: W, summary: &RunSummary) -> io::Result<()> {
    if summary.reports.is_empty() {
        writeln!(writer, "No inputs found.")?;
        return Ok(());
    }
    writeln!(
        writer,
        "Check that these totals match those in the formatted reports."
    )?;
    writeln!(writer, "Rows removed during cleaning are not counted.")?;
    writeln!(writer, "{DIVIDER}")?;
    for report in &summary.reports {
        writeln!(writer, "{:<30}: {}", "Report Name", report.report)?;
        match &report.error {
            Some(error) => writeln!(writer, "{:<30}: {error}", "Error")?,
            None => {
                let order_id = report.order_id.as_deref().unwrap_or("-");
                writeln!(writer, "{:<30}: {order_id}", "Order ID")?;
                for (column, total) in &report.totals {
                    writeln!(writer, "{:<30}: {total}", format!("Total {column}"))?;
                }
            }
        }
        writeln!(writer, "{DIVIDER}")?;
    }
    writeln!(
        writer,
        "{} formatted, {} failed",
        summary.formatted, summary.failed
    )
}

/// Machine-readable summary
pub fn emit_json<W: Write>(mut writer: W, summary: &RunSummary) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writeln!(writer)
}
