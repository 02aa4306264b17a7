//! Ordered index of records by exact timestamp.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use thiserror::Error;
use time::OffsetDateTime;

use crate::record::Record;

/// Errors raised while exporting an index.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The timestamp can't be represented in the interchange format.
    #[error("timestamp out of range for export: {timestamp}")]
    Timestamp {
        timestamp: DateTime<Utc>,
        #[source]
        source: time::error::ComponentRange,
    },

    /// Writing the document failed.
    #[error("failed to write GPX: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
}

/// All records sharing one exact timestamp, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBucket {
    timestamp: DateTime<Utc>,
    items: Vec<Arc<Record>>,
}

impl TimeBucket {
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn items(&self) -> &[Arc<Record>] {
        &self.items
    }
}

/// Buckets of records ordered by ascending timestamp.
///
/// Timestamps are unique across buckets; a record whose timestamp already has
/// a bucket is appended to it. There is no removal.
///
/// # Thread Safety
///
/// The index has a single writer. Share it across threads only once all
/// `add` calls have finished.
#[derive(Debug, Clone, Default)]
pub struct TimeIndex {
    series: Vec<TimeBucket>,
}

impl TimeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record to the bucket for its timestamp.
    pub fn add(&mut self, record: impl Into<Arc<Record>>) {
        let record = record.into();
        let timestamp = record.timestamp();
        let position = self.search(timestamp);

        match self.series.get_mut(position) {
            Some(bucket) if bucket.timestamp == timestamp => bucket.items.push(record),
            _ => self.series.insert(
                position,
                TimeBucket {
                    timestamp,
                    items: vec![record],
                },
            ),
        }
    }

    /// Returns the position of the bucket for `timestamp`, or the position a
    /// bucket for it would be inserted at.
    pub fn search(&self, timestamp: DateTime<Utc>) -> usize {
        self.series
            .partition_point(|bucket| bucket.timestamp < timestamp)
    }

    /// The ordered buckets.
    pub fn series(&self) -> &[TimeBucket] {
        &self.series
    }

    /// Number of buckets (distinct timestamps).
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Number of records across all buckets.
    pub fn record_count(&self) -> usize {
        self.series.iter().map(|bucket| bucket.items.len()).sum()
    }

    /// Iterates every record in timestamp order.
    pub fn records(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.series.iter().flat_map(|bucket| bucket.items.iter())
    }

    /// Writes the geographic records as a GPX 1.1 track.
    ///
    /// Emits one track with a single segment, one point per record with
    /// geographic data, in timestamp order. Returns the number of points
    /// written.
    pub fn export_gpx<W: Write>(&self, writer: W) -> Result<usize, ExportError> {
        let mut segment = TrackSegment::default();

        for bucket in &self.series {
            for record in bucket.items.iter().filter(|r| r.has_geographic()) {
                let mut point =
                    Waypoint::new(geo_types::Point::new(record.longitude(), record.latitude()));
                point.time = Some(to_gpx_time(bucket.timestamp)?);
                segment.points.push(point);
            }
        }

        let written = segment.points.len();

        let mut track = Track::default();
        track.segments.push(segment);

        let document = Gpx {
            version: GpxVersion::Gpx11,
            creator: Some("geoindex".to_string()),
            tracks: vec![track],
            ..Gpx::default()
        };

        gpx::write(&document, writer)?;
        tracing::debug!(points = written, "exported time index as GPX");

        Ok(written)
    }
}

impl Extend<Arc<Record>> for TimeIndex {
    fn extend<I: IntoIterator<Item = Arc<Record>>>(&mut self, iter: I) {
        for record in iter {
            self.add(record);
        }
    }
}

impl FromIterator<Arc<Record>> for TimeIndex {
    fn from_iter<I: IntoIterator<Item = Arc<Record>>>(iter: I) -> Self {
        let mut index = Self::new();
        index.extend(iter);
        index
    }
}

/// Converts a timestamp into the GPX crate's time type.
pub fn to_gpx_time(timestamp: DateTime<Utc>) -> Result<gpx::Time, ExportError> {
    let nanos = i128::from(timestamp.timestamp()) * 1_000_000_000
        + i128::from(timestamp.timestamp_subsec_nanos());

    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map(gpx::Time::from)
        .map_err(|source| ExportError::Timestamp { timestamp, source })
}

/// Converts the GPX crate's time type into a UTC timestamp.
pub fn from_gpx_time(time: gpx::Time) -> Option<DateTime<Utc>> {
    let time = OffsetDateTime::from(time);
    DateTime::from_timestamp(time.unix_timestamp(), time.nanosecond())
}
