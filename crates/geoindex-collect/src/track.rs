//! GPX track files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use geoindex_core::{Record, RecordMetadata, SourceKind, from_gpx_time};

use crate::processor::{FileProcessor, ProcessError};

/// Reads every timed track point in a GPX file as a location record.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpxFileProcessor;

impl FileProcessor for GpxFileProcessor {
    fn name(&self) -> &'static str {
        "gpx"
    }

    fn process(&self, path: &Path) -> Result<Vec<Record>, ProcessError> {
        let file = File::open(path).map_err(|source| ProcessError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let document = gpx::read(BufReader::new(file)).map_err(|source| ProcessError::Gpx {
            path: path.to_path_buf(),
            source,
        })?;

        let points = document
            .tracks
            .into_iter()
            .flat_map(|track| track.segments)
            .flat_map(|segment| segment.points);

        let mut records = Vec::new();
        for point in points {
            let position = point.point();
            let (latitude, longitude) = (position.y(), position.x());

            let Some(timestamp) = point.time.and_then(from_gpx_time) else {
                tracing::warn!(path = ?path, latitude, longitude, "skipping track point without time");
                continue;
            };

            match Record::new(
                SourceKind::Gpx,
                path,
                timestamp,
                Some((latitude, longitude)),
                RecordMetadata::None,
            ) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "skipping track point");
                }
            }
        }

        tracing::info!(path = ?path, count = records.len(), "read track points");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    const TRACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>morning</name>
    <trkseg>
      <trkpt lat="41.850030" lon="-87.650050">
        <time>2024-06-01T12:00:00Z</time>
      </trkpt>
      <trkpt lat="41.851000" lon="-87.651000">
        <time>2024-06-01T12:00:10Z</time>
      </trkpt>
      <trkpt lat="41.852000" lon="-87.652000"></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="42.331430" lon="-83.045750">
        <time>2024-06-01T15:30:00Z</time>
      </trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

    #[test]
    fn reads_timed_points_across_segments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("morning.gpx");
        fs::write(&path, TRACK).unwrap();

        let records = GpxFileProcessor.process(&path).unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.source() == SourceKind::Gpx));
        assert!(records.iter().all(Record::has_geographic));
        assert!(records.iter().all(|r| r.filepath() == path));

        assert_eq!(
            records[0].timestamp(),
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
        );
        assert!((records[0].latitude() - 41.85003).abs() < 1e-9);
        assert!((records[0].longitude() + 87.65005).abs() < 1e-9);
        assert_eq!(
            records[2].timestamp(),
            Utc.with_ymd_and_hms(2024, 6, 1, 15, 30, 0).unwrap()
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.gpx");
        fs::write(&path, "<gpx><trk>").unwrap();

        let err = GpxFileProcessor.process(&path).unwrap_err();
        assert!(matches!(err, ProcessError::Gpx { .. }));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = GpxFileProcessor
            .process(&dir.path().join("absent.gpx"))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Io { .. }));
    }
}
