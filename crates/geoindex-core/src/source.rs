//! Source kinds as the single source of truth for source tag strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a record was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A track point from a GPX file.
    Gpx,
    /// A photograph read from a JPEG file.
    Jpeg,
}

impl SourceKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gpx => "data-geographic-gpx",
            Self::Jpeg => "image-jpeg",
        }
    }

    /// Returns true for photo-derived records.
    #[must_use]
    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = UnknownSourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data-geographic-gpx" => Ok(Self::Gpx),
            "image-jpeg" => Ok(Self::Jpeg),
            _ => Err(UnknownSourceKind(s.to_string())),
        }
    }
}

impl Serialize for SourceKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SourceKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown source kind strings.
#[derive(Debug, Clone)]
pub struct UnknownSourceKind(String);

impl fmt::Display for UnknownSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown source kind: {}", self.0)
    }
}

impl std::error::Error for UnknownSourceKind {}
