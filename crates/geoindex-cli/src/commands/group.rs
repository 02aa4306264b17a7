//! Group command: clusters photographs into visits.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use geoindex_core::{Gazetteer, Group, GroupFinder, GroupKey, Place, TimeIndex, UnassignedRecord};
use serde::Serialize;

use super::{data_collector, ensure_directory, image_collector};
use crate::{Config, GroupArgs};

pub fn run<W: Write>(writer: &mut W, config: &Config, args: &GroupArgs) -> Result<()> {
    ensure_directory(&args.locations)?;
    ensure_directory(&args.images)?;

    let mut grouping = config.grouping()?;
    if let Some(window) = args.rounding_window {
        grouping.rounding_window = window;
    }
    if let Some(window) = args.coalescence_window {
        grouping.coalescence_window = window;
    }
    let skew = match args.skew {
        Some(skew) => skew,
        None => config.image_timestamp_skew()?,
    };

    let mut locations = TimeIndex::new();
    data_collector()?
        .read_from_path(&args.locations, Some(&mut locations), None)
        .with_context(|| format!("failed to read locations from {}", args.locations.display()))?;

    let mut images = TimeIndex::new();
    image_collector(config, skew, &args.camera_models)?
        .read_from_path(&args.images, Some(&mut images), None)
        .with_context(|| format!("failed to read images from {}", args.images.display()))?;

    let gazetteer = Gazetteer::open_geonames(&config.gazetteer_path, config.minimum_population)
        .with_context(|| {
            format!(
                "failed to load gazetteer {}",
                config.gazetteer_path.display()
            )
        })?;
    tracing::debug!(
        locations = locations.record_count(),
        images = images.record_count(),
        places = gazetteer.len(),
        "loaded inputs"
    );

    let mut finder = GroupFinder::with_config(&locations, &images, &gazetteer, grouping);
    let groups: Vec<Group> = finder
        .by_ref()
        .collect::<Result<_, _>>()
        .context("grouping failed")?;

    if args.json {
        render_json(
            writer,
            &groups,
            finder.nearest_places(),
            finder.unassigned_records(),
        )
    } else {
        render_text(
            writer,
            &groups,
            finder.nearest_places(),
            finder.unassigned_records(),
        )
    }
}

fn place_label(places: &HashMap<String, Place>, key: &GroupKey) -> String {
    places.get(&key.place_key).map_or_else(
        || key.place_key.clone(),
        |place| format!("{}, {}", place.name, place.country),
    )
}

fn render_text<W: Write>(
    writer: &mut W,
    groups: &[Group],
    places: &HashMap<String, Place>,
    unassigned: &[UnassignedRecord],
) -> Result<()> {
    if groups.is_empty() {
        writeln!(writer, "No groups.")?;
    }

    for group in groups {
        let camera = if group.key.camera_model.is_empty() {
            "unknown camera"
        } else {
            group.key.camera_model.as_str()
        };
        writeln!(
            writer,
            "{}  {}  [{camera}]  ({} images)",
            group.key.time_key.to_rfc3339(),
            place_label(places, &group.key),
            group.records.len()
        )?;
        for record in &group.records {
            writeln!(writer, "  {record}")?;
        }
    }

    if !unassigned.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Unassigned ({}):", unassigned.len())?;
        for entry in unassigned {
            writeln!(writer, "  {}: {}", entry.record, entry.reason)?;
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct GroupReport<'a> {
    groups: Vec<GroupEntry<'a>>,
    unassigned: Vec<UnassignedEntry<'a>>,
}

#[derive(Serialize)]
struct GroupEntry<'a> {
    #[serde(flatten)]
    key: &'a GroupKey,
    place: Option<&'a Place>,
    files: Vec<&'a Path>,
}

#[derive(Serialize)]
struct UnassignedEntry<'a> {
    file: &'a Path,
    timestamp: String,
    reason: &'static str,
}

fn render_json<W: Write>(
    writer: &mut W,
    groups: &[Group],
    places: &HashMap<String, Place>,
    unassigned: &[UnassignedRecord],
) -> Result<()> {
    let report = GroupReport {
        groups: groups
            .iter()
            .map(|group| GroupEntry {
                key: &group.key,
                place: places.get(&group.key.place_key),
                files: group.records.iter().map(|r| r.filepath()).collect(),
            })
            .collect(),
        unassigned: unassigned
            .iter()
            .map(|entry| UnassignedEntry {
                file: entry.record.filepath(),
                timestamp: entry.record.timestamp().to_rfc3339(),
                reason: entry.reason.as_str(),
            })
            .collect(),
    };

    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    Ok(())
}
