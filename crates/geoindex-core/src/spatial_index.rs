//! Multi-resolution index of records by hierarchical cell.
//!
//! Every record is filed under each ancestor of its leaf cell, from the leaf
//! up to [`MINIMUM_LEVEL_FOR_INDEXING`]. A lookup starts at the query point's
//! leaf and zooms out one level at a time until it finds a non-empty bucket,
//! so the finest matching resolution always wins.
//!
//! This is not a radius search. A point close to a cell boundary can miss a
//! record that sits just across it in a sibling cell; the record only shows up
//! once both fall under a common ancestor.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use h3o::{CellIndex, Resolution};
use thiserror::Error;

use crate::cell::{self, CellError, MINIMUM_LEVEL_FOR_INDEXING};
use crate::record::Record;

/// Spatial index errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndexError {
    /// The record has no geographic data.
    #[error("no geographic information for {}", .filepath.display())]
    NoGeographicInformation { filepath: PathBuf },

    /// The record claims geographic data but its cell is not a leaf cell.
    #[error("record {} has cell {cell_id:#x}, which is not a leaf cell", .filepath.display())]
    NotLeafCell { filepath: PathBuf, cell_id: u64 },

    /// The query coordinates could not be mapped to a cell.
    #[error(transparent)]
    Cell(#[from] CellError),

    /// Nothing is indexed between the query's leaf and the lowest allowed level.
    #[error("no near match for ({latitude:.6}, {longitude:.6})")]
    NoNearMatch { latitude: f64, longitude: f64 },
}

/// Records filed under every ancestor of their leaf cell.
///
/// # Thread Safety
///
/// Like [`TimeIndex`](crate::TimeIndex), this has a single writer; concurrent
/// producers must funnel their records through one thread.
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    buckets: HashMap<CellIndex, Vec<Arc<Record>>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a record under each ancestor of its leaf cell.
    ///
    /// Fails if the record has no geographic data or doesn't carry a valid
    /// leaf cell.
    pub fn add(&mut self, record: impl Into<Arc<Record>>) -> Result<(), IndexError> {
        let record = record.into();

        if !record.has_geographic() || record.cell_id() == 0 {
            return Err(IndexError::NoGeographicInformation {
                filepath: record.filepath().to_path_buf(),
            });
        }

        let leaf = record.leaf_cell().ok_or_else(|| IndexError::NotLeafCell {
            filepath: record.filepath().to_path_buf(),
            cell_id: record.cell_id(),
        })?;

        for ancestor in cell::ancestors(leaf, MINIMUM_LEVEL_FOR_INDEXING) {
            self.buckets
                .entry(ancestor)
                .or_default()
                .push(Arc::clone(&record));
        }

        Ok(())
    }

    /// Returns the records in the finest non-empty cell containing the point,
    /// searching no coarser than `lowest_allowed_level`.
    pub fn query(
        &self,
        latitude: f64,
        longitude: f64,
        lowest_allowed_level: Resolution,
    ) -> Result<&[Arc<Record>], IndexError> {
        let leaf = cell::leaf_cell(latitude, longitude)?;

        cell::ancestors(leaf, lowest_allowed_level)
            .find_map(|ancestor| {
                self.buckets
                    .get(&ancestor)
                    .filter(|records| !records.is_empty())
            })
            .map(Vec::as_slice)
            .ok_or(IndexError::NoNearMatch {
                latitude,
                longitude,
            })
    }

    /// Anything from an exact match out to roughly a metropolitan area.
    pub fn query_metro_limited(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<&[Arc<Record>], IndexError> {
        self.query(latitude, longitude, MINIMUM_LEVEL_FOR_INDEXING)
    }

    /// The records filed under exactly this cell.
    pub fn bucket(&self, cell: CellIndex) -> Option<&[Arc<Record>]> {
        self.buckets.get(&cell).map(Vec::as_slice)
    }

    /// Number of distinct cells with at least one record.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of (cell, record) entries across all buckets.
    pub fn entry_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
