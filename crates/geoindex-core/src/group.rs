//! Streaming grouping of images into visits.
//!
//! [`GroupFinder`] walks an image [`TimeIndex`] in timestamp order. Each image
//! is placed (its own coordinates, or those of the nearest-in-time location
//! fix), resolved to a named place, and keyed by (time key, place, camera
//! model). Consecutive images with equal keys form one [`Group`]; a change of
//! key closes the current group and hands it back to the caller.

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::Arc;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::place::{Place, PlaceResolver};
use crate::record::Record;
use crate::time_index::{TimeBucket, TimeIndex};

/// Default maximum distance to a location fix, in seconds.
pub const DEFAULT_ROUNDING_WINDOW_SECS: i64 = 10 * 60;

/// Default maximum distance to the current group's time key, in seconds.
pub const DEFAULT_COALESCENCE_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Image timestamps are floored to this grid to form time keys.
pub const TIME_KEY_GRID_SECS: i64 = 10;

/// Tunables for [`GroupFinder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingConfig {
    /// How far from an image a location fix may be and still supply its
    /// coordinates.
    pub rounding_window: TimeDelta,
    /// How far an image may be from the current group's time key and still
    /// share it.
    pub coalescence_window: TimeDelta,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            rounding_window: TimeDelta::seconds(DEFAULT_ROUNDING_WINDOW_SECS),
            coalescence_window: TimeDelta::seconds(DEFAULT_COALESCENCE_WINDOW_SECS),
        }
    }
}

impl GroupingConfig {
    #[must_use]
    pub const fn rounding_window(mut self, window: TimeDelta) -> Self {
        self.rounding_window = window;
        self
    }

    #[must_use]
    pub const fn coalescence_window(mut self, window: TimeDelta) -> Self {
        self.coalescence_window = window;
        self
    }
}

/// The factors a group is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey {
    pub time_key: DateTime<Utc>,
    /// `<source>,<id>` of the nearest place.
    pub place_key: String,
    /// Empty unless the images came from JPEG files.
    pub camera_model: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}]",
            self.time_key.to_rfc3339(),
            self.place_key,
            self.camera_model
        )
    }
}

/// A finished run of images sharing one key, in timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub key: GroupKey,
    pub records: Vec<Arc<Record>>,
}

/// Why an image could not be grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// The image has no coordinates and no location fix is close enough in time.
    NoNearLocation,
    /// No named place is close enough to the image's coordinates.
    NoNearPlace,
}

impl UnassignedReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoNearLocation => "no matching/near location record",
            Self::NoNearPlace => "no near city",
        }
    }
}

impl fmt::Display for UnassignedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image skipped by the grouping, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnassignedRecord {
    pub record: Arc<Record>,
    pub reason: UnassignedReason,
}

/// Grouping errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// Every image has been consumed.
    #[error("no more groups")]
    NoMoreGroups,

    /// No location fix lies within the rounding window of the timestamp.
    #[error("no location record near {timestamp}")]
    NoNearLocationRecord { timestamp: DateTime<Utc> },

    /// The location index holds a bucket without coordinates.
    #[error("location record at {timestamp} has no geographic data")]
    LocationWithoutGeographic { timestamp: DateTime<Utc> },
}

/// Single-pass, resumable image grouping.
///
/// Call [`find_next`](Self::find_next) (or iterate) until it reports
/// [`GroupError::NoMoreGroups`]. Images that can't be placed are collected in
/// [`unassigned_records`](Self::unassigned_records) and never abort the walk.
pub struct GroupFinder<'a, R> {
    locations: &'a TimeIndex,
    images: &'a TimeIndex,
    resolver: R,
    config: GroupingConfig,
    bucket_position: usize,
    item_position: usize,
    current_key: Option<GroupKey>,
    current_group: Vec<Arc<Record>>,
    unassigned: Vec<UnassignedRecord>,
    nearest_places: HashMap<String, Place>,
}

impl<'a, R: PlaceResolver> GroupFinder<'a, R> {
    pub fn new(locations: &'a TimeIndex, images: &'a TimeIndex, resolver: R) -> Self {
        Self::with_config(locations, images, resolver, GroupingConfig::default())
    }

    pub fn with_config(
        locations: &'a TimeIndex,
        images: &'a TimeIndex,
        resolver: R,
        config: GroupingConfig,
    ) -> Self {
        Self {
            locations,
            images,
            resolver,
            config,
            bucket_position: 0,
            item_position: 0,
            current_key: None,
            current_group: Vec::new(),
            unassigned: Vec::new(),
            nearest_places: HashMap::new(),
        }
    }

    /// Images skipped so far.
    pub fn unassigned_records(&self) -> &[UnassignedRecord] {
        &self.unassigned
    }

    /// Every place resolved so far, by place key.
    pub const fn nearest_places(&self) -> &HashMap<String, Place> {
        &self.nearest_places
    }

    /// Returns the next finished group.
    pub fn find_next(&mut self) -> Result<Group, GroupError> {
        let images = self.images;

        while let Some(bucket) = images.series().get(self.bucket_position) {
            let Some(record) = bucket.items().get(self.item_position) else {
                self.bucket_position += 1;
                self.item_position = 0;
                continue;
            };
            self.item_position += 1;

            let Some(key) = self.key_for(bucket.timestamp(), record)? else {
                continue;
            };

            match self.current_key.take() {
                Some(current) if current == key => {
                    self.current_key = Some(current);
                    self.current_group.push(Arc::clone(record));
                }
                Some(current) => {
                    let records = mem::replace(&mut self.current_group, vec![Arc::clone(record)]);
                    self.current_key = Some(key);
                    tracing::debug!(key = %current, size = records.len(), "finished group");
                    return Ok(Group {
                        key: current,
                        records,
                    });
                }
                None => {
                    self.current_key = Some(key);
                    self.current_group.push(Arc::clone(record));
                }
            }
        }

        match self.current_key.take() {
            Some(key) if !self.current_group.is_empty() => {
                let records = mem::take(&mut self.current_group);
                tracing::debug!(key = %key, size = records.len(), "finished last group");
                Ok(Group { key, records })
            }
            _ => Err(GroupError::NoMoreGroups),
        }
    }

    /// Finds the location bucket nearest in time to `timestamp`.
    ///
    /// An exact hit wins. Otherwise the closer of the neighboring buckets within
    /// the rounding window is used; the earlier one wins a tie.
    pub fn find_location_by_time(
        &self,
        timestamp: DateTime<Utc>,
    ) -> Result<&'a TimeBucket, GroupError> {
        let locations = self.locations;
        let series = locations.series();
        let position = locations.search(timestamp);

        let successor = series.get(position);
        if let Some(bucket) = successor.filter(|b| b.timestamp() == timestamp) {
            return Ok(bucket);
        }

        let predecessor = position.checked_sub(1).and_then(|p| series.get(p));
        let window = self.config.rounding_window;

        let before = predecessor
            .map(|b| (timestamp - b.timestamp(), b))
            .filter(|(delta, _)| *delta <= window);
        let after = successor
            .map(|b| (b.timestamp() - timestamp, b))
            .filter(|(delta, _)| *delta <= window);

        match (before, after) {
            (Some((since, previous)), Some((until, next))) => {
                Ok(if until < since { next } else { previous })
            }
            (Some((_, bucket)), None) | (None, Some((_, bucket))) => Ok(bucket),
            (None, None) => Err(GroupError::NoNearLocationRecord { timestamp }),
        }
    }

    /// Computes the group key for one image, or `None` if it was unassigned.
    fn key_for(
        &mut self,
        timestamp: DateTime<Utc>,
        record: &Arc<Record>,
    ) -> Result<Option<GroupKey>, GroupError> {
        let (latitude, longitude) = if record.has_geographic() {
            (record.latitude(), record.longitude())
        } else {
            match self.find_location_by_time(timestamp) {
                Ok(bucket) => {
                    let location = bucket
                        .items()
                        .first()
                        .filter(|location| location.has_geographic())
                        .ok_or_else(|| GroupError::LocationWithoutGeographic {
                            timestamp: bucket.timestamp(),
                        })?;
                    (location.latitude(), location.longitude())
                }
                Err(GroupError::NoNearLocationRecord { .. }) => {
                    self.add_unassigned(record, UnassignedReason::NoNearLocation);
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        };

        let nearest = match self.resolver.nearest(latitude, longitude) {
            Ok(nearest) => nearest,
            Err(e) => {
                tracing::debug!(error = %e, latitude, longitude, "place lookup failed");
                self.add_unassigned(record, UnassignedReason::NoNearPlace);
                return Ok(None);
            }
        };

        let place_key = nearest.key();
        self.nearest_places
            .entry(place_key.clone())
            .or_insert(nearest.place);

        let mut time_key = floor_to_grid(timestamp);
        if let Some(current) = self
            .current_key
            .as_ref()
            .filter(|current| time_key - current.time_key < self.config.coalescence_window)
        {
            time_key = current.time_key;
        }

        let camera_model = if record.source().is_image() {
            record.camera_model().unwrap_or_default().to_string()
        } else {
            String::new()
        };

        Ok(Some(GroupKey {
            time_key,
            place_key,
            camera_model,
        }))
    }

    fn add_unassigned(&mut self, record: &Arc<Record>, reason: UnassignedReason) {
        tracing::warn!(record = %record, reason = %reason, "skipping image");
        self.unassigned.push(UnassignedRecord {
            record: Arc::clone(record),
            reason,
        });
    }
}

impl<R: PlaceResolver> Iterator for GroupFinder<'_, R> {
    type Item = Result<Group, GroupError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.find_next() {
            Err(GroupError::NoMoreGroups) => None,
            result => Some(result),
        }
    }
}

fn floor_to_grid(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .duration_trunc(TimeDelta::seconds(TIME_KEY_GRID_SECS))
        .unwrap_or(timestamp)
}
