//! Shared fixtures for engine integration tests

use tallysheet_core::{CellRef, CellValue, Grid, Record, RecordSet};
use tallysheet_engine::{ColumnSemantics, EngineConfig, GroupingConfig};

pub const COLUMNS: [&str; 4] = ["Name", "Impressions", "Clicks", "CTR"];

pub fn header_start() -> CellRef {
    CellRef::new(3, 1)
}

pub fn data_start() -> CellRef {
    CellRef::new(4, 1)
}

/// Template with all anchors, an icon and an order id placeholder
pub fn template() -> Grid {
    let mut grid = Grid::new();
    grid.set(CellRef::new(0, 0), "<icon>");
    grid.set(CellRef::new(1, 1), "Delivery report");
    grid.set(header_start(), "<header_start>");
    grid.set(data_start(), "<data_start>");
    grid.set(CellRef::new(4, 4), "<data_end>");
    grid.set(CellRef::new(4, 0), "<order_id>");
    grid
}

pub fn config() -> EngineConfig {
    EngineConfig {
        grouping: GroupingConfig {
            line_item: "Name".into(),
            ..GroupingConfig::default()
        },
        semantics: ColumnSemantics {
            ratio: vec!["CTR".into()],
            count: vec!["Impressions".into(), "Clicks".into()],
            label: vec![],
            ..ColumnSemantics::default()
        },
    }
}

pub fn records(rows: &[(&str, f64, f64)]) -> RecordSet {
    let mut set = RecordSet::new(COLUMNS.iter().map(|c| c.to_string()).collect());
    for (name, impressions, clicks) in rows {
        set.push(Record::new(vec![
            (*name).into(),
            (*impressions).into(),
            (*clicks).into(),
            (clicks / impressions).into(),
        ]));
    }
    set
}

/// Evaluate the small formula dialect the engine writes:
/// `=SUM(A1:A9)`, `=A1+B2+...`, `=A1/B1` and `=0`.
pub fn evaluate(grid: &Grid, cell: CellRef) -> f64 {
    match grid.get(cell) {
        CellValue::Number(n) => *n,
        CellValue::Formula(text) => evaluate_formula(grid, text),
        _ => 0.0,
    }
}

fn reference(text: &str) -> CellRef {
    CellRef::parse_a1(text).unwrap_or_else(|| panic!("bad reference {text}"))
}

fn evaluate_formula(grid: &Grid, text: &str) -> f64 {
    let body = text.strip_prefix('=').expect("formula starts with =");
    if let Some(range) = body.strip_prefix("SUM(").and_then(|r| r.strip_suffix(')')) {
        let (first, last) = range.split_once(':').expect("SUM over a range");
        let (first, last) = (reference(first), reference(last));
        return (first.row..=last.row)
            .map(|row| evaluate(grid, CellRef::new(row, first.col)))
            .sum();
    }
    if let Some((numerator, denominator)) = body.split_once('/') {
        return evaluate(grid, reference(numerator)) / evaluate(grid, reference(denominator));
    }
    if body == "0" {
        return 0.0;
    }
    body.split('+').map(|term| evaluate(grid, reference(term))).sum()
}
