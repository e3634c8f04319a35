//! Input validation

use tallysheet_core::RecordSet;
use tracing::{debug, warn};

/// Required columns absent from `records`, in the order they were required
pub fn missing_columns(records: &RecordSet, required: &[String]) -> Vec<String> {
    debug!(expected = ?required, "validating column names");
    let missing: Vec<String> = required
        .iter()
        .filter(|column| records.column_index(column).is_none())
        .cloned()
        .collect();
    for column in &missing {
        warn!(column = %column, "expected column not found");
    }
    missing
}
