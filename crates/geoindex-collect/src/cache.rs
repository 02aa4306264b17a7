//! On-disk cache of records extracted from images.
//!
//! One JSON file per image, named `<basename>.<hash>` where the hash is the
//! BLAKE3 digest of the image's full path. Unreadable entries are removed so
//! the next run rebuilds them.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use geoindex_core::Record;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A directory of cached image records.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    root: PathBuf,
}

impl MetadataCache {
    /// Opens the cache, creating its directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CacheError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The cache file for an image.
    pub fn entry_path(&self, image: &Path) -> PathBuf {
        let basename = image
            .file_name()
            .map_or_else(|| "image".into(), |n| n.to_string_lossy());
        let digest = blake3::hash(image.as_os_str().as_encoded_bytes());

        self.root.join(format!("{basename}.{}", digest.to_hex()))
    }

    /// Returns the cached record for an image, if there is a usable one.
    pub fn load(&self, image: &Path) -> Result<Option<Record>, CacheError> {
        let entry = self.entry_path(image);

        let bytes = match fs::read(&entry) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                tracing::warn!(path = ?entry, error = %e, "unreadable cache entry");
                remove_entry(&entry)?;
                return Ok(None);
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => {
                tracing::trace!(image = ?image, "cache hit");
                Ok(Some(record))
            }
            Err(e) => {
                tracing::warn!(path = ?entry, error = %e, "corrupt cache entry");
                remove_entry(&entry)?;
                Ok(None)
            }
        }
    }

    /// Writes the record extracted from an image.
    pub fn store(&self, image: &Path, record: &Record) -> Result<(), CacheError> {
        let entry = self.entry_path(image);
        let json = serde_json::to_vec(record)?;

        fs::write(&entry, json).map_err(|source| CacheError::Io {
            path: entry,
            source,
        })
    }
}

fn remove_entry(entry: &Path) -> Result<(), CacheError> {
    fs::remove_file(entry).map_err(|source| CacheError::Io {
        path: entry.to_path_buf(),
        source,
    })
}
