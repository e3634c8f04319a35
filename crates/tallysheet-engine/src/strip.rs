//! Markup stripping
//!
//! Clears every cell that still looks like a tag once aggregation is done.

use tallysheet_core::{scan, CellRef, Grid};
use tracing::debug;

/// Clear all remaining tag cells, returning what was removed.
///
/// Running it a second time finds nothing and changes nothing.
pub fn strip(grid: &mut Grid) -> Vec<(CellRef, String)> {
    let stripped: Vec<(CellRef, String)> = scan::tag_cells(grid)
        .into_iter()
        .map(|cell| (cell, grid.get(cell).to_string()))
        .collect();

    for (cell, _) in &stripped {
        grid.clear(*cell);
    }

    debug!(cleared = stripped.len(), "stripped markup");
    stripped
}
