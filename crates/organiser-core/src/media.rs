use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use geoutils::Location;
use serde::{Deserialize, Serialize};

/// Broad container family of a media file, decided from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    /// HEIC/HEIF: tags may only be reachable after a decode step.
    Heif,
    Video,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if ext == "heic" || ext == "heif" {
            return MediaKind::Heif;
        }
        match mime_guess::from_path(path).first() {
            Some(mime) if mime.type_() == mime_guess::mime::VIDEO => MediaKind::Video,
            _ => MediaKind::Image,
        }
    }

    pub fn needs_decode(self) -> bool {
        self == MediaKind::Heif
    }
}

/// A decimal-degree latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    /// Returns `None` unless both values are finite and within range.
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Key used by the geocode cache: six decimals, `"lat,lon"`.
    pub fn cache_key(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lon)
    }

    /// Inverse of [`Coordinate::cache_key`]. Tolerates surrounding whitespace.
    pub fn from_cache_key(key: &str) -> Option<Self> {
        let (lat, lon) = key.split_once(',')?;
        let lat = lat.trim().parse::<f64>().ok()?;
        let lon = lon.trim().parse::<f64>().ok()?;
        Self::new(lat, lon)
    }

    fn location(&self) -> Location {
        Location::new(self.lat, self.lon)
    }

    /// Ellipsoidal (Vincenty) distance in kilometres. Falls back to haversine
    /// for nearly antipodal points, where Vincenty does not converge.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        let (a, b) = (self.location(), other.location());
        let distance = a.distance_to(&b).unwrap_or_else(|_| a.haversine_distance_to(&b));
        distance.meters() / 1000.0
    }
}

/// Where a record stands in the per-file pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Unprocessed,
    Planned,
    Errored,
}

#[derive(Debug, Clone)]
pub struct MediaRecord {
    /// Path of the discovered file
    pub source_path: PathBuf,
    /// Best available capture time (EXIF, then mtime, then now)
    pub captured_at: NaiveDateTime,
    pub coordinate: Option<Coordinate>,
    /// Folder label: sanitised country, "NoLocation", or empty in two-level mode
    pub resolved_label: String,
    /// Planned destination, set once the record is planned
    pub destination: Option<PathBuf>,
    /// Error message, set if planning failed
    pub error: Option<String>,
}

impl MediaRecord {
    pub fn new(source_path: PathBuf, captured_at: NaiveDateTime) -> Self {
        Self {
            source_path,
            captured_at,
            coordinate: None,
            resolved_label: String::new(),
            destination: None,
            error: None,
        }
    }

    pub fn file_name(&self) -> &str {
        self.source_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
    }

    pub fn status(&self) -> RecordStatus {
        if self.error.is_some() {
            RecordStatus::Errored
        } else if self.destination.is_some() {
            RecordStatus::Planned
        } else {
            RecordStatus::Unprocessed
        }
    }
}
