//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::TimeDelta;
use clap::{Parser, Subcommand};

use crate::commands::util::parse_duration;

/// Index GPS tracks and photographs by time and place.
///
/// Reads GPX tracks and JPEG photographs from disk, and groups photographs
/// into visits by time, nearest city and camera model.
#[derive(Debug, Parser)]
#[command(name = "geoindex", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Export the track points found under a directory as one GPX track.
    ExportGpx {
        /// Directory to scan for GPX files.
        path: PathBuf,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the records in the finest cell around a coordinate.
    Query {
        /// Directory to scan for GPX and JPEG files.
        path: PathBuf,

        /// Latitude in degrees.
        #[arg(long, allow_negative_numbers = true)]
        latitude: f64,

        /// Longitude in degrees.
        #[arg(long, allow_negative_numbers = true)]
        longitude: f64,

        /// Coarsest cell resolution to search (0-15).
        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..=15))]
        level: u8,
    },

    /// Group photographs into visits.
    Group(GroupArgs),
}

/// Arguments for `geoindex group`.
#[derive(Debug, clap::Args)]
pub struct GroupArgs {
    /// Directory to scan for GPX location data.
    #[arg(long)]
    pub locations: PathBuf,

    /// Directory to scan for JPEG photographs.
    #[arg(long)]
    pub images: PathBuf,

    /// Only group photographs from this camera model (repeatable).
    #[arg(long = "camera-model")]
    pub camera_models: Vec<String>,

    /// Shift EXIF timestamps by this much (e.g., -2h).
    #[arg(long, value_parser = parse_duration, allow_hyphen_values = true)]
    pub skew: Option<TimeDelta>,

    /// How far a location fix may be from a photograph (e.g., 10m).
    #[arg(long, value_parser = parse_duration)]
    pub rounding_window: Option<TimeDelta>,

    /// How far a photograph may be from its group's time key (e.g., 24h).
    #[arg(long, value_parser = parse_duration)]
    pub coalescence_window: Option<TimeDelta>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}
