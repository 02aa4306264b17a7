//! The per-format extraction seam.

use std::path::{Path, PathBuf};

use geoindex_core::Record;
use thiserror::Error;

use crate::cache::CacheError;

/// Hard failures while extracting records from one file.
///
/// Files that are merely uninteresting (no EXIF block, no timestamp) are not
/// errors; processors return an empty list for them.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse GPX in {}: {source}", .path.display())]
    Gpx {
        path: PathBuf,
        #[source]
        source: gpx::errors::GpxError,
    },

    #[error("failed to parse EXIF in {}: {source}", .path.display())]
    Exif {
        path: PathBuf,
        #[source]
        source: exif::Error,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Extracts records from files of one format.
///
/// Processors run on the rayon pool, several files at a time, so they must be
/// shareable across threads.
pub trait FileProcessor: Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Parses one file into zero or more records.
    fn process(&self, path: &Path) -> Result<Vec<Record>, ProcessError>;
}
