//! CLI subcommand implementations.

pub mod export;
pub mod group;
pub mod query;
pub mod util;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use geoindex_collect::{
    Collector, MetadataCache, register_data_file_processors, register_image_file_processors,
};

use crate::Config;

/// A collector for location data files.
pub(crate) fn data_collector() -> Result<Collector> {
    let mut collector = Collector::new();
    register_data_file_processors(&mut collector)?;
    Ok(collector)
}

/// A collector for photographs, using the configured cache.
pub(crate) fn image_collector(
    config: &Config,
    skew: TimeDelta,
    camera_models: &[String],
) -> Result<Collector> {
    let cache = config
        .image_cache_path
        .as_deref()
        .map(|path| {
            MetadataCache::new(path)
                .with_context(|| format!("failed to open image cache {}", path.display()))
        })
        .transpose()?;

    let mut collector = Collector::new();
    register_image_file_processors(&mut collector, skew, camera_models, cache)?;
    Ok(collector)
}

pub(crate) fn ensure_directory(path: &Path) -> Result<()> {
    anyhow::ensure!(path.is_dir(), "not a directory: {}", path.display());
    Ok(())
}
