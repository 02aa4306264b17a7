//! Timestamped, optionally geolocated records.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use h3o::CellIndex;
use serde::{Deserialize, Serialize};

use crate::cell::{self, CellError, LEAF_LEVEL};
use crate::source::SourceKind;

/// Kind-specific payload attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordMetadata {
    /// Nothing beyond the common fields.
    #[default]
    None,
    /// Metadata read from a photograph.
    Image {
        /// The camera model as stored in the image. Empty if absent.
        camera_model: String,
    },
}

/// A single timestamped event: a track point or a photograph.
///
/// Records never change after construction. Indices share them through
/// `Arc<Record>`.
///
/// `cell_id` is non-zero and names a leaf cell exactly when the record has
/// geographic data. Records built with [`Record::new`] always hold that
/// invariant; deserialized records are checked again when they are added to a
/// [`SpatialIndex`](crate::SpatialIndex).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    timestamp: DateTime<Utc>,
    filepath: PathBuf,
    has_geographic: bool,
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
    #[serde(default)]
    cell_id: u64,
    source: SourceKind,
    #[serde(default)]
    metadata: RecordMetadata,
}

impl Record {
    /// Creates a record. `position` is `(latitude, longitude)` in degrees.
    pub fn new(
        source: SourceKind,
        filepath: impl Into<PathBuf>,
        timestamp: DateTime<Utc>,
        position: Option<(f64, f64)>,
        metadata: RecordMetadata,
    ) -> Result<Self, CellError> {
        let (has_geographic, latitude, longitude, cell_id) = match position {
            Some((latitude, longitude)) => {
                let leaf = cell::leaf_cell(latitude, longitude)?;
                (true, latitude, longitude, u64::from(leaf))
            }
            None => (false, 0.0, 0.0, 0),
        };

        Ok(Self {
            timestamp,
            filepath: filepath.into(),
            has_geographic,
            latitude,
            longitude,
            cell_id,
            source,
            metadata,
        })
    }

    /// Creates a record without geographic data.
    pub fn without_position(
        source: SourceKind,
        filepath: impl Into<PathBuf>,
        timestamp: DateTime<Utc>,
        metadata: RecordMetadata,
    ) -> Self {
        Self {
            timestamp,
            filepath: filepath.into(),
            has_geographic: false,
            latitude: 0.0,
            longitude: 0.0,
            cell_id: 0,
            source,
            metadata,
        }
    }

    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    pub const fn has_geographic(&self) -> bool {
        self.has_geographic
    }

    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// The raw leaf cell identifier, or zero without geographic data.
    pub const fn cell_id(&self) -> u64 {
        self.cell_id
    }

    pub const fn source(&self) -> SourceKind {
        self.source
    }

    pub const fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    /// The camera model for photo-derived records.
    pub fn camera_model(&self) -> Option<&str> {
        match &self.metadata {
            RecordMetadata::Image { camera_model } => Some(camera_model),
            RecordMetadata::None => None,
        }
    }

    /// Returns the leaf cell if the record carries a valid one.
    pub fn leaf_cell(&self) -> Option<CellIndex> {
        if !self.has_geographic {
            return None;
        }
        cell::cell_from_id(self.cell_id)
            .ok()
            .filter(|cell| cell.resolution() == LEAF_LEVEL)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .filepath
            .file_name()
            .map_or_else(|| self.filepath.to_string_lossy(), |n| n.to_string_lossy());

        if self.has_geographic {
            write!(
                f,
                "{name} @ {} ({:.6}, {:.6})",
                self.timestamp.to_rfc3339(),
                self.latitude,
                self.longitude
            )
        } else {
            write!(f, "{name} @ {} (no position)", self.timestamp.to_rfc3339())
        }
    }
}
