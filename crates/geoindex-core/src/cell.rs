//! Hierarchical geographic cells.
//!
//! Cells come from the H3 grid. A coordinate maps to exactly one cell at the
//! finest resolution (the leaf), and every leaf has one ancestor at each
//! coarser resolution. The 64-bit H3 index doubles as the cell identifier
//! stored on records; it encodes its own resolution, so an ancestor cell is a
//! complete bucket key on its own.

use h3o::{CellIndex, LatLng, Resolution};
use thiserror::Error;

/// Resolution of leaf cells.
pub const LEAF_LEVEL: Resolution = Resolution::Fifteen;

/// Coarsest resolution records are indexed at.
///
/// Resolution 3 cells span roughly 12,000 km², about the size of a
/// metropolitan area. Indexing coarser than this grows the index without
/// making lookups more useful.
pub const MINIMUM_LEVEL_FOR_INDEXING: Resolution = Resolution::Three;

/// Errors raised while mapping coordinates onto cells.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CellError {
    /// The coordinates are not finite or lie outside the valid range.
    #[error("invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    /// The value is not a valid cell identifier.
    #[error("invalid cell identifier: {0:#x}")]
    InvalidCell(u64),
}

/// Returns the leaf cell containing the given coordinates (in degrees).
pub fn leaf_cell(latitude: f64, longitude: f64) -> Result<CellIndex, CellError> {
    let invalid = || CellError::InvalidCoordinates {
        latitude,
        longitude,
    };

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid());
    }

    let position = LatLng::new(latitude, longitude).map_err(|_| invalid())?;
    Ok(position.to_cell(LEAF_LEVEL))
}

/// Parses a raw identifier into a cell.
pub fn cell_from_id(cell_id: u64) -> Result<CellIndex, CellError> {
    CellIndex::try_from(cell_id).map_err(|_| CellError::InvalidCell(cell_id))
}

/// Returns true if the raw identifier is a valid leaf cell.
pub fn is_leaf(cell_id: u64) -> bool {
    cell_from_id(cell_id).is_ok_and(|cell| cell.resolution() == LEAF_LEVEL)
}

/// Iterates the ancestors of `cell`, finest first, from the cell's own
/// resolution down to `lowest` inclusive.
///
/// The cell itself is the first item. Nothing is yielded if `lowest` is finer
/// than the cell.
pub fn ancestors(cell: CellIndex, lowest: Resolution) -> impl Iterator<Item = CellIndex> {
    let finest = u8::from(cell.resolution());
    let lowest = u8::from(lowest);

    (lowest..=finest).rev().filter_map(move |level| {
        Resolution::try_from(level)
            .ok()
            .and_then(|resolution| cell.parent(resolution))
    })
}
