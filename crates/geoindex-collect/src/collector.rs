//! Crawls a directory tree and feeds extracted records into the indices.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::TimeDelta;
use geoindex_core::{IndexError, SpatialIndex, TimeIndex};
use rayon::prelude::*;
use thiserror::Error;
use walkdir::WalkDir;

use crate::cache::MetadataCache;
use crate::photo::JpegFileProcessor;
use crate::processor::{FileProcessor, ProcessError};
use crate::track::GpxFileProcessor;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("extension {0:?} must start with a period")]
    InvalidExtension(String),

    #[error("extension {0:?} already registered")]
    DuplicateExtension(String),

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Counts from one crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Files handed to a processor.
    pub files: usize,
    /// Records extracted across all files.
    pub records: usize,
    /// Records kept out of the spatial index for lack of coordinates.
    pub without_position: usize,
}

/// Dispatches files to processors by extension.
#[derive(Default)]
pub struct Collector {
    processors: HashMap<String, Arc<dyn FileProcessor>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a processor for an extension such as `.gpx`.
    ///
    /// Extensions are case-insensitive. One processor may serve several
    /// extensions, but each extension takes only one processor.
    pub fn add_file_processor(
        &mut self,
        extension: &str,
        processor: Arc<dyn FileProcessor>,
    ) -> Result<(), CollectError> {
        let extension = extension.to_lowercase();
        if !extension.starts_with('.') || extension.len() < 2 {
            return Err(CollectError::InvalidExtension(extension));
        }
        if self.processors.contains_key(&extension) {
            return Err(CollectError::DuplicateExtension(extension));
        }

        tracing::debug!(extension = %extension, processor = processor.name(), "registered file processor");
        self.processors.insert(extension, processor);
        Ok(())
    }

    /// The processor registered for a path's extension, if any.
    pub fn processor_for(&self, path: &Path) -> Option<&Arc<dyn FileProcessor>> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        self.processors.get(&format!(".{extension}"))
    }

    /// Extracts records from every recognized file under `root` and adds them
    /// to whichever indices are given.
    ///
    /// Files are parsed in parallel. Records are then added one at a time in
    /// path order, so the indices come out the same on every run. Records
    /// without coordinates only go to the time index. The first processor
    /// failure aborts the crawl before anything is added.
    pub fn read_from_path(
        &self,
        root: &Path,
        mut time_index: Option<&mut TimeIndex>,
        mut spatial_index: Option<&mut SpatialIndex>,
    ) -> Result<CollectStats, CollectError> {
        let mut files: Vec<(PathBuf, &Arc<dyn FileProcessor>)> = Vec::new();

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(processor) = self.processor_for(entry.path()) {
                files.push((entry.into_path(), processor));
            }
        }

        tracing::debug!(root = ?root, files = files.len(), "found files to process");

        let parsed: Vec<Vec<_>> = files
            .par_iter()
            .map(|(path, processor)| processor.process(path))
            .collect::<Result<_, _>>()?;

        let mut stats = CollectStats {
            files: files.len(),
            ..CollectStats::default()
        };

        for record in parsed.into_iter().flatten() {
            let record = Arc::new(record);
            stats.records += 1;

            if let Some(index) = spatial_index.as_deref_mut() {
                if record.has_geographic() {
                    index.add(Arc::clone(&record))?;
                } else {
                    stats.without_position += 1;
                }
            }

            if let Some(index) = time_index.as_deref_mut() {
                index.add(record);
            }
        }

        tracing::info!(
            root = ?root,
            files = stats.files,
            records = stats.records,
            "collected records"
        );
        Ok(stats)
    }
}

/// Registers the processors for location data files.
pub fn register_data_file_processors(collector: &mut Collector) -> Result<(), CollectError> {
    collector.add_file_processor(".gpx", Arc::new(GpxFileProcessor))
}

/// Registers the processors for image files.
///
/// `timestamp_skew` shifts the EXIF times, which are read as UTC. A non-empty
/// `camera_models` list keeps only images from those models.
pub fn register_image_file_processors(
    collector: &mut Collector,
    timestamp_skew: TimeDelta,
    camera_models: &[String],
    cache: Option<MetadataCache>,
) -> Result<(), CollectError> {
    let mut processor = JpegFileProcessor::new()
        .with_timestamp_skew(timestamp_skew)
        .with_camera_models(camera_models.iter().cloned());
    if let Some(cache) = cache {
        processor = processor.with_cache(cache);
    }

    let processor: Arc<dyn FileProcessor> = Arc::new(processor);
    collector.add_file_processor(".jpg", Arc::clone(&processor))?;
    collector.add_file_processor(".jpeg", processor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use geoindex_core::{Record, RecordMetadata, SourceKind};
    use std::fs;
    use tempfile::TempDir;

    /// Emits one record per line of `<unix seconds>[,<lat>,<lon>]`.
    struct LineProcessor;

    impl FileProcessor for LineProcessor {
        fn name(&self) -> &'static str {
            "lines"
        }

        fn process(&self, path: &Path) -> Result<Vec<Record>, ProcessError> {
            let text = fs::read_to_string(path).map_err(|source| ProcessError::Io {
                path: path.to_path_buf(),
                source,
            })?;

            Ok(text
                .lines()
                .map(|line| {
                    let parts: Vec<&str> = line.split(',').collect();
                    let timestamp =
                        DateTime::<Utc>::from_timestamp(parts[0].parse().unwrap(), 0).unwrap();
                    let position = (parts.len() == 3)
                        .then(|| (parts[1].parse().unwrap(), parts[2].parse().unwrap()));
                    Record::new(
                        SourceKind::Gpx,
                        path,
                        timestamp,
                        position,
                        RecordMetadata::None,
                    )
                    .unwrap()
                })
                .collect())
        }
    }

    #[test]
    fn add_file_processor_validates_extensions() {
        let mut collector = Collector::new();
        collector
            .add_file_processor(".TXT", Arc::new(LineProcessor))
            .unwrap();

        assert!(matches!(
            collector.add_file_processor(".txt", Arc::new(LineProcessor)),
            Err(CollectError::DuplicateExtension(ext)) if ext == ".txt"
        ));
        assert!(matches!(
            collector.add_file_processor("txt", Arc::new(LineProcessor)),
            Err(CollectError::InvalidExtension(_))
        ));
        assert!(collector.processor_for(Path::new("/a/B.Txt")).is_some());
        assert!(collector.processor_for(Path::new("/a/b.csv")).is_none());
        assert!(collector.processor_for(Path::new("/a/txt")).is_none());
    }

    #[test]
    fn read_from_path_fills_both_indices() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.txt"), "100,41.85,-87.65\n200\n").unwrap();
        fs::write(dir.path().join("nested/b.TXT"), "150,42.33,-83.04\n").unwrap();
        fs::write(dir.path().join("ignored.csv"), "300,1,1\n").unwrap();

        let mut collector = Collector::new();
        collector
            .add_file_processor(".txt", Arc::new(LineProcessor))
            .unwrap();

        let mut time_index = TimeIndex::new();
        let mut spatial_index = SpatialIndex::new();
        let stats = collector
            .read_from_path(dir.path(), Some(&mut time_index), Some(&mut spatial_index))
            .unwrap();

        assert_eq!(
            stats,
            CollectStats {
                files: 2,
                records: 3,
                without_position: 1,
            }
        );

        let seconds: Vec<i64> = time_index
            .records()
            .map(|r| r.timestamp().timestamp())
            .collect();
        assert_eq!(seconds, [100, 150, 200]);
        assert!(spatial_index.query_metro_limited(41.85, -87.65).is_ok());
        assert!(spatial_index.query_metro_limited(42.33, -83.04).is_ok());
    }

    #[test]
    fn read_from_path_accepts_missing_indices() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "100,41.85,-87.65\n").unwrap();

        let mut collector = Collector::new();
        collector
            .add_file_processor(".txt", Arc::new(LineProcessor))
            .unwrap();

        let mut spatial_index = SpatialIndex::new();
        let stats = collector
            .read_from_path(dir.path(), None, Some(&mut spatial_index))
            .unwrap();
        assert_eq!(stats.records, 1);
        assert!(!spatial_index.is_empty());

        let stats = collector.read_from_path(dir.path(), None, None).unwrap();
        assert_eq!(stats.records, 1);
    }

    #[test]
    fn processor_failure_aborts_crawl() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("good.gpx"), "<gpx version=\"1.1\"></gpx>").unwrap();
        fs::write(dir.path().join("bad.gpx"), "<gpx><trk>").unwrap();

        let mut collector = Collector::new();
        register_data_file_processors(&mut collector).unwrap();

        let mut time_index = TimeIndex::new();
        let err = collector
            .read_from_path(dir.path(), Some(&mut time_index), None)
            .unwrap_err();

        assert!(matches!(
            err,
            CollectError::Process(ProcessError::Gpx { .. })
        ));
        assert!(time_index.is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Collector::new()
            .read_from_path(&dir.path().join("absent"), None, None)
            .unwrap_err();
        assert!(matches!(err, CollectError::Walk(_)));
    }

    #[test]
    fn image_processors_share_one_instance() {
        let mut collector = Collector::new();
        register_image_file_processors(&mut collector, TimeDelta::zero(), &[], None).unwrap();
        register_data_file_processors(&mut collector).unwrap();

        let short = collector.processor_for(Path::new("a.JPG")).unwrap();
        let long = collector.processor_for(Path::new("a.jpeg")).unwrap();
        assert!(Arc::ptr_eq(short, long));
        assert_eq!(short.name(), "jpeg");
        assert_eq!(
            collector.processor_for(Path::new("a.gpx")).unwrap().name(),
            "gpx"
        );

        assert!(matches!(
            register_data_file_processors(&mut collector),
            Err(CollectError::DuplicateExtension(_))
        ));
    }
}
