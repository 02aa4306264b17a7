//! Query command: what was recorded near a coordinate.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use geoindex_core::{IndexError, Resolution, SpatialIndex};

use super::{data_collector, ensure_directory, image_collector};
use crate::Config;

pub fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    path: &Path,
    latitude: f64,
    longitude: f64,
    level: u8,
) -> Result<()> {
    ensure_directory(path)?;
    let lowest = Resolution::try_from(level).with_context(|| format!("invalid level: {level}"))?;

    let mut index = SpatialIndex::new();
    data_collector()?
        .read_from_path(path, None, Some(&mut index))
        .with_context(|| format!("failed to read tracks from {}", path.display()))?;
    image_collector(config, TimeDelta::zero(), &[])?
        .read_from_path(path, None, Some(&mut index))
        .with_context(|| format!("failed to read images from {}", path.display()))?;

    tracing::debug!(
        buckets = index.bucket_count(),
        entries = index.entry_count(),
        "built spatial index"
    );

    match index.query(latitude, longitude, lowest) {
        Ok(records) => {
            let mut records = records.to_vec();
            records.sort_by_key(|r| r.timestamp());
            for record in records {
                writeln!(writer, "{record}")?;
            }
        }
        Err(IndexError::NoNearMatch { .. }) => {
            writeln!(writer, "No records near ({latitude:.6}, {longitude:.6}).")?;
        }
        Err(e) => return Err(e).context("query failed"),
    }

    Ok(())
}
