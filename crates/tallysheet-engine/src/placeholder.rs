//! Placeholder substitution
//!
//! Fills named anchor tags such as `<order_id>` with report-level values.

use std::collections::BTreeMap;
use tallysheet_core::scan;
use tallysheet_core::tag::REQUIRED_ANCHORS;
use tallysheet_core::{CellRef, CellValue, Grid};
use tracing::{debug, warn};

/// Replace `<name>` with its value for every entry in `values`.
///
/// Returns the cells that were filled. Names missing from the grid, and the
/// structural anchors, are skipped.
pub fn fill(grid: &mut Grid, values: &BTreeMap<String, CellValue>) -> Vec<(CellRef, String)> {
    let mut filled = Vec::new();
    for (name, value) in values {
        if REQUIRED_ANCHORS.contains(&name.as_str()) {
            warn!(placeholder = %name, "refusing to overwrite a structural anchor");
            continue;
        }
        match scan::find_anchor(grid, name) {
            Some(cell) => {
                debug!(placeholder = %name, %cell, "filled placeholder");
                grid.set(cell, value.clone());
                filled.push((cell, name.clone()));
            }
            None => warn!(placeholder = %name, "placeholder not found in template"),
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fills_known_placeholders_only() {
        let mut grid = Grid::new();
        let order = CellRef::new(4, 0);
        grid.set(order, "<order_id>");
        grid.set(CellRef::new(4, 1), "<data_start>");

        let values = BTreeMap::from([
            ("order_id".to_string(), CellValue::from("ORD-77")),
            ("campaign".to_string(), CellValue::from("Spring")),
            ("data_start".to_string(), CellValue::from("oops")),
        ]);
        let filled = fill(&mut grid, &values);

        assert_eq!(filled, vec![(order, "order_id".to_string())]);
        assert_eq!(grid.get(order), &CellValue::from("ORD-77"));
        assert_eq!(grid.get(CellRef::new(4, 1)), &CellValue::from("<data_start>"));
    }
}
