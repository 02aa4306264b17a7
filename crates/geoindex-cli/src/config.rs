//! Configuration loading and management.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::TimeDelta;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use geoindex_core::GroupingConfig;
use geoindex_core::group::{DEFAULT_COALESCENCE_WINDOW_SECS, DEFAULT_ROUNDING_WINDOW_SECS};
use serde::{Deserialize, Serialize};

/// Default minimum population for gazetteer places.
pub const DEFAULT_MINIMUM_POPULATION: u64 = 15_000;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for cached image metadata. Caching is off when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_cache_path: Option<PathBuf>,

    /// `GeoNames` dump used to resolve nearest cities.
    pub gazetteer_path: PathBuf,

    /// Places smaller than this are ignored.
    pub minimum_population: u64,

    /// Maximum distance between an image and the location fix that supplies
    /// its coordinates.
    pub rounding_window_secs: i64,

    /// Maximum distance between an image and its group's time key.
    pub coalescence_window_secs: i64,

    /// Added to every EXIF timestamp.
    pub image_timestamp_skew_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            image_cache_path: None,
            gazetteer_path: data_dir.join("cities15000.txt"),
            minimum_population: DEFAULT_MINIMUM_POPULATION,
            rounding_window_secs: DEFAULT_ROUNDING_WINDOW_SECS,
            coalescence_window_secs: DEFAULT_COALESCENCE_WINDOW_SECS,
            image_timestamp_skew_secs: 0,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // GEOINDEX_*
        figment = figment.merge(Env::prefixed("GEOINDEX_"));

        figment.extract()
    }

    pub fn grouping(&self) -> Result<GroupingConfig> {
        Ok(GroupingConfig {
            rounding_window: seconds("rounding_window_secs", self.rounding_window_secs)?,
            coalescence_window: seconds("coalescence_window_secs", self.coalescence_window_secs)?,
        })
    }

    pub fn image_timestamp_skew(&self) -> Result<TimeDelta> {
        seconds("image_timestamp_skew_secs", self.image_timestamp_skew_secs)
    }
}

fn seconds(field: &str, value: i64) -> Result<TimeDelta> {
    TimeDelta::try_seconds(value).with_context(|| format!("{field} out of range: {value}"))
}

/// Returns the platform-specific config directory for geoindex.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("geoindex"))
}

/// Returns the platform-specific data directory for geoindex.
///
/// On Linux: `~/.local/share/geoindex`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("geoindex"))
}
