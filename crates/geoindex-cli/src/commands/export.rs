//! Export command: merges every track under a directory into one GPX track.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use geoindex_core::TimeIndex;

use super::{data_collector, ensure_directory};

/// Writes the track points found under `path` as GPX. Returns the number of
/// points written.
pub fn run<W: Write>(writer: W, path: &Path) -> Result<usize> {
    ensure_directory(path)?;

    let mut index = TimeIndex::new();
    data_collector()?
        .read_from_path(path, Some(&mut index), None)
        .with_context(|| format!("failed to read tracks from {}", path.display()))?;

    let written = index.export_gpx(writer).context("failed to write GPX")?;
    tracing::info!(points = written, "exported track");
    Ok(written)
}
