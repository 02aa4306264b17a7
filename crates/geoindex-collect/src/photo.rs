//! JPEG photographs.
//!
//! Timestamps, GPS coordinates and the camera model come from the EXIF block.
//! EXIF times carry no reliable zone, so they are read as UTC and shifted by a
//! configurable skew.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use exif::{Exif, In, Tag, Value};
use geoindex_core::{Record, RecordMetadata, SourceKind};

use crate::cache::MetadataCache;
use crate::processor::{FileProcessor, ProcessError};

/// Timestamp tags in order of preference.
const TIMESTAMP_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

/// Reads one record per JPEG with a usable timestamp.
#[derive(Debug, Clone, Default)]
pub struct JpegFileProcessor {
    timestamp_skew: TimeDelta,
    camera_models: HashSet<String>,
    cache: Option<MetadataCache>,
}

impl JpegFileProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shifts every EXIF timestamp by `skew`.
    #[must_use]
    pub const fn with_timestamp_skew(mut self, skew: TimeDelta) -> Self {
        self.timestamp_skew = skew;
        self
    }

    /// Keeps only images taken with one of these camera models. An empty list
    /// keeps everything.
    #[must_use]
    pub fn with_camera_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.camera_models = models.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: MetadataCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn accepts(&self, record: &Record) -> bool {
        self.camera_models.is_empty()
            || record
                .camera_model()
                .is_some_and(|model| self.camera_models.contains(model))
    }

    fn extract(&self, path: &Path) -> Result<Option<Record>, ProcessError> {
        let file = File::open(path).map_err(|source| ProcessError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let exif = match exif::Reader::new().read_from_container(&mut BufReader::new(file)) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => {
                tracing::debug!(path = ?path, "no EXIF data");
                return Ok(None);
            }
            Err(source) => {
                return Err(ProcessError::Exif {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let Some(timestamp) = TIMESTAMP_TAGS
            .iter()
            .find_map(|&tag| read_timestamp(&exif, tag, path))
        else {
            tracing::warn!(path = ?path, "image has no timestamp");
            return Ok(None);
        };
        let Some(timestamp) = timestamp.checked_add_signed(self.timestamp_skew) else {
            tracing::warn!(path = ?path, skew = %self.timestamp_skew, "timestamp out of range");
            return Ok(None);
        };

        let metadata = RecordMetadata::Image {
            camera_model: ascii_value(&exif, Tag::Model).unwrap_or_default(),
        };

        let record = match gps_position(&exif) {
            Some(position) => Record::new(
                SourceKind::Jpeg,
                path,
                timestamp,
                Some(position),
                metadata.clone(),
            )
            .unwrap_or_else(|e| {
                tracing::warn!(path = ?path, error = %e, "ignoring invalid GPS position");
                Record::without_position(SourceKind::Jpeg, path, timestamp, metadata)
            }),
            None => Record::without_position(SourceKind::Jpeg, path, timestamp, metadata),
        };

        Ok(Some(record))
    }
}

impl FileProcessor for JpegFileProcessor {
    fn name(&self) -> &'static str {
        "jpeg"
    }

    fn process(&self, path: &Path) -> Result<Vec<Record>, ProcessError> {
        let cached = self
            .cache
            .as_ref()
            .map(|cache| cache.load(path))
            .transpose()?
            .flatten();

        let record = match cached {
            Some(record) => record,
            None => {
                let Some(record) = self.extract(path)? else {
                    return Ok(Vec::new());
                };
                if let Some(cache) = &self.cache {
                    cache.store(path, &record)?;
                }
                record
            }
        };

        if !self.accepts(&record) {
            tracing::debug!(path = ?path, model = ?record.camera_model(), "camera model filtered out");
            return Ok(Vec::new());
        }

        Ok(vec![record])
    }
}

/// Reads a timestamp tag. Empty or unparseable values are logged and skipped.
fn read_timestamp(exif: &Exif, tag: Tag, path: &Path) -> Option<DateTime<Utc>> {
    let field = exif.get_field(tag, In::PRIMARY)?;

    let raw = match &field.value {
        Value::Ascii(values) => values.first().filter(|v| !v.is_empty()),
        _ => None,
    };
    let Some(raw) = raw else {
        tracing::warn!(path = ?path, tag = %tag, "empty image timestamp");
        return None;
    };

    let parsed = exif::DateTime::from_ascii(raw)
        .ok()
        .and_then(|dt| exif_to_utc(&dt));
    if parsed.is_none() {
        tracing::warn!(
            path = ?path,
            tag = %tag,
            value = %String::from_utf8_lossy(raw),
            "unparseable image timestamp"
        );
    }
    parsed
}

fn exif_to_utc(dt: &exif::DateTime) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())?;
    let time = NaiveTime::from_hms_opt(dt.hour.into(), dt.minute.into(), dt.second.into())?;
    let timestamp = date.and_time(time).and_utc();

    let nanos = dt.nanosecond.map_or(0, i64::from);
    Some(timestamp + TimeDelta::nanoseconds(nanos))
}

/// Decimal degrees from a degrees/minutes/seconds tag and its hemisphere ref.
fn gps_coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative_ref: &str) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };

    let value = parts
        .iter()
        .take(3)
        .zip([1.0, 60.0, 3600.0])
        .map(|(part, divisor)| part.to_f64() / divisor)
        .sum::<f64>();
    if parts.is_empty() || !value.is_finite() {
        return None;
    }

    let negative =
        ascii_value(exif, ref_tag).is_some_and(|r| r.eq_ignore_ascii_case(negative_ref));
    Some(if negative { -value } else { value })
}

fn gps_position(exif: &Exif) -> Option<(f64, f64)> {
    let latitude = gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S")?;
    let longitude = gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W")?;
    Some((latitude, longitude))
}

/// The first string of an ASCII tag, trimmed.
fn ascii_value(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(values) => values.first().map(|raw| {
            String::from_utf8_lossy(raw)
                .trim_end_matches('\0')
                .trim()
                .to_string()
        }),
        _ => None,
    }
}
