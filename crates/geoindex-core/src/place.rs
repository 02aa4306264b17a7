//! Nearest named place resolution.
//!
//! [`PlaceResolver`] is the seam the grouping algorithm consumes. [`Gazetteer`]
//! is an in-memory implementation over a list of cities, typically loaded from
//! a `GeoNames` dump.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use h3o::{CellIndex, Resolution};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell::{self, CellError};

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A named place, usually a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Identifier, unique within its source.
    pub id: String,
    pub name: String,
    /// Country name or ISO code.
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub population: u64,
}

/// The result of a nearest-place lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestPlace {
    /// Name of the dataset the place came from.
    pub source_name: String,
    pub id: String,
    pub place: Place,
}

impl NearestPlace {
    /// The key used to group by place: `<source>,<id>`.
    pub fn key(&self) -> String {
        format!("{},{}", self.source_name, self.id)
    }
}

/// Place lookup errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlaceError {
    /// No place is close enough to the coordinates.
    #[error("no nearest place found for ({latitude:.6}, {longitude:.6})")]
    NoNearestPlace { latitude: f64, longitude: f64 },

    /// The coordinates could not be mapped to a cell.
    #[error(transparent)]
    Cell(#[from] CellError),

    /// The resolver itself failed (e.g. a remote service timed out).
    #[error("place lookup failed: {0}")]
    Lookup(String),
}

/// Resolves coordinates to the nearest named place.
///
/// Implementations backed by remote services should apply their own timeout
/// and retry policy and return a definite answer.
pub trait PlaceResolver {
    fn nearest(&self, latitude: f64, longitude: f64) -> Result<NearestPlace, PlaceError>;
}

impl<R: PlaceResolver + ?Sized> PlaceResolver for &R {
    fn nearest(&self, latitude: f64, longitude: f64) -> Result<NearestPlace, PlaceError> {
        (**self).nearest(latitude, longitude)
    }
}

/// Errors raised while loading a gazetteer.
#[derive(Debug, Error)]
pub enum GazetteerError {
    #[error("failed to read gazetteer: {0}")]
    Io(#[from] std::io::Error),

    /// A row could not be parsed.
    #[error("malformed gazetteer row at line {line}: {message}")]
    Malformed { line: usize, message: String },

    /// A place has unusable coordinates.
    #[error("invalid place {id}: {source}")]
    InvalidPlace {
        id: String,
        #[source]
        source: CellError,
    },
}

/// In-memory city index.
///
/// Places are filed under every ancestor of their leaf cell down to
/// `lowest_level`. A lookup zooms out from the query's leaf cell and picks the
/// closest place (great-circle distance) in the first non-empty cell.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    source_name: String,
    lowest_level: Resolution,
    places: Vec<Place>,
    cells: HashMap<CellIndex, Vec<usize>>,
}

impl Gazetteer {
    /// Source name used for `GeoNames` dumps.
    pub const GEONAMES: &'static str = "GeoNames";

    /// Creates an empty gazetteer searching out to resolution 0 (continent scale).
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            lowest_level: Resolution::Zero,
            places: Vec::new(),
            cells: HashMap::new(),
        }
    }

    /// Builds a gazetteer from a list of places.
    pub fn from_places(
        source_name: impl Into<String>,
        places: impl IntoIterator<Item = Place>,
    ) -> Result<Self, GazetteerError> {
        let mut gazetteer = Self::new(source_name);
        for place in places {
            gazetteer.add(place)?;
        }
        Ok(gazetteer)
    }

    /// Limits how far a lookup zooms out. Re-files existing places.
    #[must_use]
    pub fn with_lowest_level(mut self, lowest_level: Resolution) -> Self {
        self.lowest_level = lowest_level;
        self.cells.clear();

        let leaves: Vec<(usize, CellIndex)> = self
            .places
            .iter()
            .enumerate()
            .filter_map(|(i, p)| cell::leaf_cell(p.latitude, p.longitude).ok().map(|c| (i, c)))
            .collect();
        for (position, leaf) in leaves {
            self.file(position, leaf);
        }

        self
    }

    /// Adds a place.
    pub fn add(&mut self, place: Place) -> Result<(), GazetteerError> {
        let leaf = cell::leaf_cell(place.latitude, place.longitude).map_err(|source| {
            GazetteerError::InvalidPlace {
                id: place.id.clone(),
                source,
            }
        })?;

        let position = self.places.len();
        self.places.push(place);
        self.file(position, leaf);

        Ok(())
    }

    fn file(&mut self, position: usize, leaf: CellIndex) {
        for ancestor in cell::ancestors(leaf, self.lowest_level) {
            self.cells.entry(ancestor).or_default().push(position);
        }
    }

    /// Loads populated places from a `GeoNames` dump (`allCountries.txt`,
    /// `cities15000.txt`, ...).
    ///
    /// Rows are tab-separated; only feature class `P` rows with at least
    /// `minimum_population` inhabitants are kept.
    pub fn load_geonames<R: BufRead>(
        reader: R,
        minimum_population: u64,
    ) -> Result<Self, GazetteerError> {
        let mut gazetteer = Self::new(Self::GEONAMES);
        let mut skipped = 0usize;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let Some(place) = parse_geonames_row(&line, index + 1)? else {
                skipped += 1;
                continue;
            };
            if place.population < minimum_population {
                skipped += 1;
                continue;
            }

            gazetteer.add(place)?;
        }

        tracing::debug!(
            places = gazetteer.len(),
            skipped,
            "loaded GeoNames gazetteer"
        );

        Ok(gazetteer)
    }

    /// Opens and loads a `GeoNames` dump from disk.
    pub fn open_geonames(path: &Path, minimum_population: u64) -> Result<Self, GazetteerError> {
        let file = File::open(path)?;
        Self::load_geonames(BufReader::new(file), minimum_population)
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }
}

impl PlaceResolver for Gazetteer {
    fn nearest(&self, latitude: f64, longitude: f64) -> Result<NearestPlace, PlaceError> {
        let leaf = cell::leaf_cell(latitude, longitude)?;

        let candidates = cell::ancestors(leaf, self.lowest_level)
            .find_map(|ancestor| self.cells.get(&ancestor).filter(|c| !c.is_empty()))
            .ok_or(PlaceError::NoNearestPlace {
                latitude,
                longitude,
            })?;

        let place = candidates
            .iter()
            .filter_map(|&position| self.places.get(position))
            .min_by(|a, b| {
                let da = haversine_km(latitude, longitude, a.latitude, a.longitude);
                let db = haversine_km(latitude, longitude, b.latitude, b.longitude);
                da.total_cmp(&db)
            })
            .ok_or(PlaceError::NoNearestPlace {
                latitude,
                longitude,
            })?;

        Ok(NearestPlace {
            source_name: self.source_name.clone(),
            id: place.id.clone(),
            place: place.clone(),
        })
    }
}

/// Parses one `GeoNames` row. Returns `None` for rows that aren't populated places.
fn parse_geonames_row(line: &str, line_number: usize) -> Result<Option<Place>, GazetteerError> {
    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() < 15 {
        return Err(GazetteerError::Malformed {
            line: line_number,
            message: format!("expected at least 15 columns, found {}", columns.len()),
        });
    }

    if columns[6] != "P" {
        return Ok(None);
    }

    let parse_coordinate = |value: &str, field: &str| {
        value.parse::<f64>().map_err(|e| GazetteerError::Malformed {
            line: line_number,
            message: format!("invalid {field} {value:?}: {e}"),
        })
    };

    let latitude = parse_coordinate(columns[4], "latitude")?;
    let longitude = parse_coordinate(columns[5], "longitude")?;
    let population = columns[14].parse::<u64>().unwrap_or(0);

    Ok(Some(Place {
        id: columns[0].to_string(),
        name: columns[1].to_string(),
        country: columns[8].to_string(),
        latitude,
        longitude,
        population,
    }))
}

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (lat1.to_radians().cos() * lat2.to_radians().cos())
        .mul_add((d_lon / 2.0).sin().powi(2), (d_lat / 2.0).sin().powi(2));
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}
