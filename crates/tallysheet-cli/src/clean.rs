//! Record cleaning
//!
//! Raw exports carry total rows, test line items and columns the report does
//! not show. The standard steps run in order before grouping; a step whose
//! column is absent is skipped with a warning.

use tallysheet_core::{CellValue, Record, RecordSet};
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// A single cleaning transformation
#[derive(Clone, Debug, PartialEq)]
pub enum CleaningStep {
    /// Drop rows whose `column` equals (or contains) `value`
    DropRows {
        column: String,
        value: String,
        exact: bool,
    },
    /// Numbers at or below `threshold` become missing
    ClearAtOrBelow { column: String, threshold: f64 },
    /// Exact text replacement
    Replace {
        column: String,
        from: String,
        to: String,
    },
    /// Where `column` equals `when`, take the value of `source` unless it is `unless`
    ReplaceFrom {
        column: String,
        when: String,
        source: String,
        unless: String,
    },
    /// Drop every column not listed
    KeepColumns(Vec<String>),
    /// Datetimes become dates; other values are left alone
    DatesOnly { column: String },
    /// Reorder to exactly these columns
    Reorder(Vec<String>),
}

/// The standard cleaning sequence for delivery reports
pub fn standard_steps(config: &Config) -> Vec<CleaningStep> {
    let grouping = &config.engine.grouping;
    vec![
        CleaningStep::DropRows {
            column: grouping.line_item.clone(),
            value: "Total".into(),
            exact: true,
        },
        CleaningStep::DropRows {
            column: grouping.line_item.clone(),
            value: "TEST".into(),
            exact: false,
        },
        CleaningStep::ClearAtOrBelow {
            column: config.cleaning.goal_column.clone(),
            threshold: config.cleaning.goal_threshold,
        },
        CleaningStep::Replace {
            column: grouping.creative_size.clone(),
            from: "1 x 1".into(),
            to: "pageskin".into(),
        },
        CleaningStep::ReplaceFrom {
            column: grouping.creative_size.clone(),
            when: "Native".into(),
            source: config.cleaning.native_format_column.clone(),
            unless: "-".into(),
        },
        CleaningStep::KeepColumns(config.report_columns.clone()),
        CleaningStep::DatesOnly {
            column: grouping.start_date.clone(),
        },
        CleaningStep::DatesOnly {
            column: grouping.end_date.clone(),
        },
        CleaningStep::Reorder(config.report_columns.clone()),
    ]
}

/// Apply `steps` in order
pub fn clean(mut records: RecordSet, steps: &[CleaningStep]) -> RecordSet {
    for step in steps {
        step.apply(&mut records);
    }
    records
}

fn row_text(record: &Record) -> String {
    record
        .values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl CleaningStep {
    fn column(&self) -> Option<&str> {
        match self {
            CleaningStep::DropRows { column, .. }
            | CleaningStep::ClearAtOrBelow { column, .. }
            | CleaningStep::Replace { column, .. }
            | CleaningStep::ReplaceFrom { column, .. }
            | CleaningStep::DatesOnly { column } => Some(column),
            CleaningStep::KeepColumns(_) | CleaningStep::Reorder(_) => None,
        }
    }

    pub fn apply(&self, records: &mut RecordSet) {
        let index = match self.column() {
            Some(column) => match records.column_index(column) {
                Some(index) => Some(index),
                None => {
                    warn!(column, step = ?self, "column missing; skipping cleaning step");
                    return;
                }
            },
            None => None,
        };

        match (self, index) {
            (CleaningStep::DropRows { column, value, exact }, Some(index)) => {
                drop_rows(records, index, column, value, *exact);
            }
            (CleaningStep::ClearAtOrBelow { column, threshold }, Some(index)) => {
                for (row, record) in records.records.iter_mut().enumerate() {
                    if record.get(index).as_number().is_some_and(|n| n <= *threshold) {
                        info!(row, column = %column, threshold, record = %row_text(record), "clearing value at or below threshold");
                        record.values[index] = CellValue::Empty;
                    }
                }
            }
            (CleaningStep::Replace { column, from, to }, Some(index)) => {
                debug!(column = %column, from = %from, to = %to, "replacing values");
                for record in &mut records.records {
                    if record.get(index).as_text() == Some(from.as_str()) {
                        record.values[index] = CellValue::from(to.as_str());
                    }
                }
            }
            (
                CleaningStep::ReplaceFrom {
                    column,
                    when,
                    source,
                    unless,
                },
                Some(index),
            ) => {
                let Some(source_index) = records.column_index(source) else {
                    warn!(column = %source, "source column missing; skipping cleaning step");
                    return;
                };
                debug!(column = %column, source = %source, "replacing values from source column");
                for record in &mut records.records {
                    let replacement = record.get(source_index).clone();
                    if record.get(index).as_text() == Some(when.as_str())
                        && replacement.as_text() != Some(unless.as_str())
                    {
                        record.values[index] = replacement;
                    }
                }
            }
            (CleaningStep::KeepColumns(keep), _) => {
                let dropped: Vec<String> = records
                    .columns
                    .iter()
                    .filter(|c| !keep.contains(c))
                    .cloned()
                    .collect();
                debug!(columns = ?dropped, "removing columns");
                for column in &dropped {
                    records.drop_column(column);
                }
            }
            (CleaningStep::DatesOnly { column }, Some(index)) => {
                debug!(column = %column, "converting datetimes to dates");
                for record in &mut records.records {
                    if let CellValue::DateTime(datetime) = *record.get(index) {
                        record.values[index] = CellValue::Date(datetime.date());
                    }
                }
            }
            (CleaningStep::Reorder(order), _) => {
                if let Err(e) = records.reorder(order) {
                    error!(error = %e, expected = ?order, actual = ?records.columns, "cannot reorder columns; order left unchanged");
                }
            }
            _ => {}
        }
    }
}

fn drop_rows(records: &mut RecordSet, index: usize, column: &str, value: &str, exact: bool) {
    let matches = |record: &Record| {
        let text = record.get(index).to_string();
        if exact {
            text == value
        } else {
            text.contains(value)
        }
    };
    let relation = if exact { "equals" } else { "contains" };

    let matching = records.records.iter().filter(|r| matches(r)).count();
    if matching == 0 {
        return;
    }
    if matching == records.len() {
        error!(column, relation, value, "every row would be removed; skipping cleaning step");
        return;
    }

    info!(column, relation, value, rows = matching, "removing rows");
    for (row, record) in records.records.iter().enumerate().filter(|(_, r)| matches(r)) {
        info!(row, record = %row_text(record), "removed row");
    }
    records.records.retain(|r| !matches(r));
}
