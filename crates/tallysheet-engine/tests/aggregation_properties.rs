//! Invariants that hold for any record set

mod common;

use common::{config, data_start, evaluate, records, template};
use tallysheet_core::{scan, CellRef, RecordSet};
use tallysheet_engine::render::{plan_rows, PlannedRow};
use tallysheet_engine::{GroupBuilder, ReportPipeline};

/// Deterministic pseudo-random record sets of varying shape
fn record_sets() -> Vec<RecordSet> {
    let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
    let mut next = move |bound: u64| {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed % bound
    };

    (0..40)
        .map(|_| {
            let count = next(12) as usize;
            let rows: Vec<(String, f64, f64)> = (0..count)
                .map(|_| {
                    let line_item = next(4);
                    let impressions = (next(900) + 100) as f64;
                    let clicks = (next(50) + 1) as f64;
                    (format!("ORD-5-2-{line_item} creative"), impressions, clicks)
                })
                .collect();
            let borrowed: Vec<(&str, f64, f64)> =
                rows.iter().map(|(n, i, c)| (n.as_str(), *i, *c)).collect();
            records(&borrowed)
        })
        .collect()
}

#[test]
fn totals_never_double_count() {
    let pipeline = ReportPipeline::new(config()).unwrap();
    for set in record_sets() {
        let mut grid = template();
        let outcome = pipeline
            .run(&mut grid, &set, &Default::default())
            .unwrap();

        let total_row = outcome.extent.end.row - 1;
        for (offset, column) in [(1, "Impressions"), (2, "Clicks")] {
            let cell = CellRef::new(total_row, data_start().col + offset);
            let expected = set.column_sum(column).unwrap();
            assert_eq!(evaluate(&grid, cell), expected, "{column} total for {set:?}");
        }
    }
}

#[test]
fn grouping_is_deterministic() {
    let builder = GroupBuilder::new(config().grouping).unwrap();
    for set in record_sets() {
        let first = builder.build(&set).unwrap();
        let second = builder.build(&set).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn separators_never_double_up() {
    let builder = GroupBuilder::new(config().grouping).unwrap();
    for set in record_sets() {
        let groups = builder.build(&set).unwrap();
        let rows = plan_rows(&groups);

        if !groups.is_empty() {
            assert_ne!(rows.first(), Some(&PlannedRow::Blank));
        }
        for pair in rows.windows(2) {
            assert!(
                !(pair[0] == PlannedRow::Blank && pair[1] == PlannedRow::Blank),
                "consecutive blanks in {rows:?}"
            );
        }
    }
}

#[test]
fn subtotal_rows_match_multi_record_groups() {
    let builder = GroupBuilder::new(config().grouping).unwrap();
    for set in record_sets() {
        let groups = builder.build(&set).unwrap();
        let subtotal_sizes: Vec<u32> = plan_rows(&groups)
            .iter()
            .filter_map(|row| match row {
                PlannedRow::Subtotal { size } => Some(*size),
                _ => None,
            })
            .collect();
        let multi_sizes: Vec<u32> = groups
            .iter()
            .filter(|g| g.size() > 1)
            .map(|g| g.size() as u32)
            .collect();
        assert_eq!(subtotal_sizes, multi_sizes);
    }
}

#[test]
fn no_tags_survive_in_extent() {
    let pipeline = ReportPipeline::new(config()).unwrap();
    for set in record_sets() {
        let mut grid = template();
        let outcome = pipeline
            .run(&mut grid, &set, &Default::default())
            .unwrap();
        let leftovers: Vec<CellRef> = scan::tag_cells(&grid)
            .into_iter()
            .filter(|cell| outcome.extent.contains(*cell))
            .collect();
        assert!(leftovers.is_empty(), "tags left at {leftovers:?}");
    }
}
