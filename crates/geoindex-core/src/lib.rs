//! Core indexing and grouping for geotagged records.
//!
//! This crate contains:
//! - Records: timestamped track points and photographs
//! - `TimeIndex`: records ordered by timestamp, exportable as GPX
//! - `SpatialIndex`: records filed by hierarchical cell, queried by zooming out
//! - Place resolution: the `PlaceResolver` seam and an in-memory `Gazetteer`
//! - Grouping: clustering photographs into visits with `GroupFinder`

pub mod cell;
pub mod group;
pub mod place;
mod record;
pub mod source;
mod spatial_index;
mod time_index;

pub use cell::{CellError, LEAF_LEVEL, MINIMUM_LEVEL_FOR_INDEXING};
pub use group::{
    Group, GroupError, GroupFinder, GroupKey, GroupingConfig, UnassignedReason, UnassignedRecord,
};
pub use h3o::{CellIndex, Resolution};
pub use place::{Gazetteer, GazetteerError, NearestPlace, Place, PlaceError, PlaceResolver};
pub use record::{Record, RecordMetadata};
pub use source::{SourceKind, UnknownSourceKind};
pub use spatial_index::{IndexError, SpatialIndex};
pub use time_index::{ExportError, TimeBucket, TimeIndex, from_gpx_time, to_gpx_time};
