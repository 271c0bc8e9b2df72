//! Default canvas placement for entities that have no previous position.

use crate::graph::Position;

/// Tables per grid row.
pub const GRID_COLUMNS: usize = 3;

const ORIGIN_X: f64 = 100.0;
const ORIGIN_Y: f64 = 100.0;
const TABLE_SPACING_X: f64 = 350.0;
const TABLE_SPACING_Y: f64 = 300.0;
const ENUM_SPACING_Y: f64 = 200.0;

/// Grid slot of the `index`-th table, wrapping every [`GRID_COLUMNS`] tables.
pub fn table_slot(index: usize) -> Position {
    let col = (index % GRID_COLUMNS) as f64;
    let row = (index / GRID_COLUMNS) as f64;
    Position::new(ORIGIN_X + col * TABLE_SPACING_X, ORIGIN_Y + row * TABLE_SPACING_Y)
}

/// Enums stack in a column right of the table grid.
pub fn enum_slot(index: usize) -> Position {
    Position::new(
        ORIGIN_X + GRID_COLUMNS as f64 * TABLE_SPACING_X,
        ORIGIN_Y + index as f64 * ENUM_SPACING_Y,
    )
}
