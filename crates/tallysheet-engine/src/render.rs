//! Row rendering
//!
//! Lays groups out below the `<data_start>` anchor. Subtotal and total rows are
//! written as tags; [`crate::aggregate`] turns them into formulas afterwards.
//!
//! Row sequence for each group:
//!
//! ```text
//! [blank]      only before a multi-record group that follows a data row
//! data rows    one per record, header column order
//! subtotal     only when the group has more than one record
//! blank
//! ```
//!
//! followed by a blank (unless one was just written), the total row and the
//! decorative total bar.

use tallysheet_core::scan;
use tallysheet_core::tag::TOTAL_BAR;
use tallysheet_core::{CellValue, Grid, Record, RenderedExtent, ReportError, Tag};
use tracing::debug;

use crate::group::Group;

/// Written in place of undefined record fields
pub const NOT_AVAILABLE: &str = "n/a";

/// One output row, before it is written to the grid
#[derive(Clone, Debug, PartialEq)]
pub enum PlannedRow<'a> {
    Data(&'a Record),
    Blank,
    Subtotal { size: u32 },
    Total,
    Decorative,
}

/// What the last written row was; decides whether a separator is due
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RowState {
    Empty,
    AfterData,
    AfterBlank,
    AfterSubtotal,
}

impl RowState {
    fn next(self, row: &PlannedRow<'_>) -> Self {
        match row {
            PlannedRow::Blank => RowState::AfterBlank,
            PlannedRow::Subtotal { .. } => RowState::AfterSubtotal,
            PlannedRow::Data(_) | PlannedRow::Total | PlannedRow::Decorative => RowState::AfterData,
        }
    }

    fn separator_before_group(self, group_size: usize) -> bool {
        self == RowState::AfterData && group_size > 1
    }
}

struct RowPlan<'a> {
    rows: Vec<PlannedRow<'a>>,
    state: RowState,
}

impl<'a> RowPlan<'a> {
    fn push(&mut self, row: PlannedRow<'a>) {
        self.state = self.state.next(&row);
        self.rows.push(row);
    }
}

/// Row sequence for `groups`, in emission order
pub fn plan_rows<'a>(groups: &[Group<'a>]) -> Vec<PlannedRow<'a>> {
    let mut plan = RowPlan {
        rows: Vec::new(),
        state: RowState::Empty,
    };

    for group in groups {
        if plan.state.separator_before_group(group.size()) {
            plan.push(PlannedRow::Blank);
        }
        for &record in &group.members {
            plan.push(PlannedRow::Data(record));
        }
        if group.is_subtotalled() {
            plan.push(PlannedRow::Subtotal {
                size: group.size() as u32,
            });
            plan.push(PlannedRow::Blank);
        }
    }

    if plan.state != RowState::AfterBlank {
        plan.push(PlannedRow::Blank);
    }
    plan.push(PlannedRow::Total);
    plan.push(PlannedRow::Decorative);
    plan.rows
}

fn cell_value(row: &PlannedRow<'_>, index: usize, column: &str) -> CellValue {
    match row {
        PlannedRow::Data(record) => match record.get(index) {
            CellValue::Empty => CellValue::from(NOT_AVAILABLE),
            value => value.clone(),
        },
        PlannedRow::Blank => CellValue::Empty,
        PlannedRow::Subtotal { size } => Tag::Subtotal {
            size: *size,
            column: column.to_string(),
        }
        .to_string()
        .into(),
        PlannedRow::Total => Tag::Total {
            column: column.to_string(),
        }
        .to_string()
        .into(),
        PlannedRow::Decorative => Tag::Decorative(TOTAL_BAR.to_string()).to_string().into(),
    }
}

/// Write headers and grouped rows into `grid`.
///
/// All anchors are checked and all column names validated before anything is
/// written. Returns the region from `<data_start>` to the last cell written.
pub fn render(
    grid: &mut Grid,
    columns: &[String],
    groups: &[Group<'_>],
) -> Result<RenderedExtent, ReportError> {
    let anchors = scan::require_anchors(grid)?;
    if let Some(column) = columns.iter().find(|c| !Tag::is_encodable_column(c)) {
        return Err(ReportError::UnencodableColumn {
            column: column.clone(),
        });
    }

    for (col, name) in columns.iter().enumerate() {
        grid.set_offset(anchors.header_start, 0, col as i64, name.as_str())?;
    }

    let rows = plan_rows(groups);
    for (r, row) in rows.iter().enumerate() {
        for (col, name) in columns.iter().enumerate() {
            grid.set_offset(anchors.data_start, r as i64, col as i64, cell_value(row, col, name))?;
        }
    }

    let last_col = columns.len().saturating_sub(1) as i64;
    let end = Grid::locate(anchors.data_start, rows.len() as i64 - 1, last_col)?;
    let extent = RenderedExtent::new(anchors.data_start, end);

    debug!(rows = rows.len(), %extent, "rendered report rows");
    Ok(extent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{GroupKey, Identifier};
    use pretty_assertions::assert_eq;
    use tallysheet_core::CellRef;

    fn group<'a>(id: &str, members: &[&'a Record]) -> Group<'a> {
        Group {
            key: GroupKey {
                start: String::new(),
                end: String::new(),
                identifier: Identifier::LineItem(id.into()),
            },
            members: members.to_vec(),
        }
    }

    fn kinds(rows: &[PlannedRow<'_>]) -> Vec<&'static str> {
        rows.iter()
            .map(|r| match r {
                PlannedRow::Data(_) => "data",
                PlannedRow::Blank => "blank",
                PlannedRow::Subtotal { .. } => "subtotal",
                PlannedRow::Total => "total",
                PlannedRow::Decorative => "bar",
            })
            .collect()
    }

    #[test]
    fn no_groups_renders_only_closing_rows() {
        assert_eq!(kinds(&plan_rows(&[])), vec!["blank", "total", "bar"]);
    }

    #[test]
    fn multi_group_after_single_gets_separator() {
        let r = Record::default();
        let rows = plan_rows(&[group("a", &[&r]), group("b", &[&r, &r])]);
        assert_eq!(
            kinds(&rows),
            vec!["data", "blank", "data", "data", "subtotal", "blank", "total", "bar"]
        );
    }

    #[test]
    fn consecutive_singles_have_no_separator() {
        let r = Record::default();
        let rows = plan_rows(&[group("a", &[&r]), group("b", &[&r])]);
        assert_eq!(kinds(&rows), vec!["data", "data", "blank", "total", "bar"]);
    }

    #[test]
    fn consecutive_multis_share_one_blank() {
        let r = Record::default();
        let rows = plan_rows(&[group("a", &[&r, &r]), group("b", &[&r, &r, &r])]);
        assert_eq!(
            kinds(&rows),
            vec![
                "data", "data", "subtotal", "blank", "data", "data", "data", "subtotal", "blank",
                "total", "bar"
            ]
        );
        assert_eq!(rows[7], PlannedRow::Subtotal { size: 3 });
    }

    #[test]
    fn render_writes_headers_tags_and_sentinels() {
        let mut grid = Grid::new();
        grid.set(CellRef::new(1, 1), "<header_start>");
        grid.set(CellRef::new(2, 1), "<data_start>");
        grid.set(CellRef::new(2, 2), "<data_end>");

        let columns = vec!["Name".to_string(), "Clicks".to_string()];
        let a = Record::new(vec!["a".into(), 3.0.into()]);
        let b = Record::new(vec!["b".into(), CellValue::Empty]);
        let extent = render(&mut grid, &columns, &[group("k", &[&a, &b])]).unwrap();

        assert_eq!(grid.get(CellRef::new(1, 2)), &CellValue::from("Clicks"));
        assert_eq!(grid.get(CellRef::new(3, 2)), &CellValue::from("n/a"));
        assert_eq!(
            grid.get(CellRef::new(4, 2)),
            &CellValue::from("<subtotal_2_Clicks>")
        );
        assert_eq!(grid.get(CellRef::new(5, 1)), &CellValue::Empty);
        assert_eq!(grid.get(CellRef::new(6, 1)), &CellValue::from("<total_Name>"));
        assert_eq!(grid.get(CellRef::new(7, 2)), &CellValue::from("<total_bar>"));
        assert_eq!(extent, RenderedExtent::new(CellRef::new(2, 1), CellRef::new(7, 2)));
    }

    #[test]
    fn render_refuses_unencodable_columns_before_writing() {
        let mut grid = Grid::new();
        grid.set(CellRef::new(0, 0), "<header_start>");
        grid.set(CellRef::new(1, 0), "<data_start>");
        grid.set(CellRef::new(1, 1), "<data_end>");
        let before = grid.clone();

        let columns = vec!["Revenue (£)".to_string()];
        let err = render(&mut grid, &columns, &[]).unwrap_err();
        assert!(matches!(err, ReportError::UnencodableColumn { .. }));
        assert_eq!(grid, before);
    }

    #[test]
    fn render_refuses_column_colliding_with_total_bar() {
        let mut grid = Grid::new();
        grid.set(CellRef::new(0, 0), "<header_start>");
        grid.set(CellRef::new(1, 0), "<data_start>");
        grid.set(CellRef::new(1, 1), "<data_end>");
        let before = grid.clone();

        let columns = vec!["Name".to_string(), "bar".to_string()];
        let r = Record::new(vec!["a".into(), 1.0.into()]);
        let err = render(&mut grid, &columns, &[group("k", &[&r, &r])]).unwrap_err();
        assert!(matches!(err, ReportError::UnencodableColumn { ref column } if column == "bar"));
        assert_eq!(grid, before);
    }
}
