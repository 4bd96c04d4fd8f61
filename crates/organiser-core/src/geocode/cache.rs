use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::media::Coordinate;

use super::UNKNOWN;

/// Default cache filename inside the destination root
pub const CACHE_FILENAME: &str = ".geocode_cache.json";

/// How many of the most recent entries the proximity scan looks at.
pub const MAX_PROXIMITY_ENTRIES: usize = 100;

/// Cached labels within this distance are reused.
pub const PROXIMITY_KM: f64 = 20.0;

/// Coordinate-to-country memo, persisted as a JSON object in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeCache {
    entries: IndexMap<String, String>,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing or unreadable file gives an empty cache.
    pub fn load(path: &Path) -> Self {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };
        match serde_json::from_reader::<_, IndexMap<String, String>>(BufReader::new(file)) {
            Ok(entries) => {
                debug!("loaded {} geocode cache entries from {}", entries.len(), path.display());
                Self { entries }
            }
            Err(e) => {
                warn!("ignoring unreadable geocode cache {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write to `path` as pretty-printed JSON. Failures are logged, never returned.
    pub fn save(&self, path: &Path) {
        if let Err(e) = self.try_save(path) {
            warn!("could not save geocode cache to {}: {}", path.display(), e);
        }
    }

    fn try_save(&self, path: &Path) -> anyhow::Result<()> {
        let temp_path = path.with_extension("json.tmp");

        // Write to temp file first, then rename for atomicity
        let file = File::create(&temp_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.entries)?;

        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Exact key match first, then the proximity scan over recent entries.
    pub fn lookup(&self, coord: &Coordinate) -> Option<&str> {
        if let Some(label) = self.entries.get(&coord.cache_key()).filter(|l| is_usable(l)) {
            return Some(label.as_str());
        }
        self.lookup_nearby(coord)
    }

    /// First recent entry within [`PROXIMITY_KM`], scanning oldest to newest.
    /// Recency beats accuracy here: the nearest entry is not searched for.
    fn lookup_nearby(&self, coord: &Coordinate) -> Option<&str> {
        let skip = self.entries.len().saturating_sub(MAX_PROXIMITY_ENTRIES);
        for (key, label) in self.entries.iter().skip(skip) {
            let Some(cached) = Coordinate::from_cache_key(key) else {
                continue;
            };
            let d_km = coord.distance_km(&cached);
            if d_km <= PROXIMITY_KM && is_usable(label) {
                debug!(
                    "using nearby cached label for {} -> {} (cached at {}, {:.1} km)",
                    coord.cache_key(),
                    label,
                    key,
                    d_km
                );
                return Some(label.as_str());
            }
        }
        None
    }

    /// Remember `label` for `coord`. Empty labels and the failure sentinel are refused.
    pub fn store(&mut self, coord: &Coordinate, label: &str) -> bool {
        if !is_usable(label) {
            debug!("not caching {:?} for {}", label, coord.cache_key());
            return false;
        }
        self.entries.insert(coord.cache_key(), label.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn is_usable(label: &str) -> bool {
    !label.is_empty() && label != UNKNOWN
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_store_then_lookup() {
        let mut cache = GeocodeCache::new();
        let c = coord(-33.8688, 151.2093);
        assert!(cache.store(&c, "Australia"));
        assert_eq!(cache.lookup(&c), Some("Australia"));
    }

    #[test]
    fn test_sentinel_and_empty_rejected() {
        let mut cache = GeocodeCache::new();
        let c = coord(1.0, 1.0);
        assert!(!cache.store(&c, UNKNOWN));
        assert!(!cache.store(&c, ""));
        assert!(cache.is_empty());
        assert_eq!(cache.lookup(&c), None);
    }

    #[test]
    fn test_proximity_hit_within_20km() {
        let mut cache = GeocodeCache::new();
        cache.store(&coord(48.8566, 2.3522), "France");
        // Versailles, ~17 km from central Paris
        assert_eq!(cache.lookup(&coord(48.8049, 2.1204)), Some("France"));
    }

    #[test]
    fn test_proximity_miss_beyond_20km() {
        let mut cache = GeocodeCache::new();
        cache.store(&coord(48.8566, 2.3522), "France");
        // Chartres, ~80 km away
        assert_eq!(cache.lookup(&coord(48.4469, 1.4890)), None);
    }

    #[test]
    fn test_proximity_only_scans_recent_entries() {
        let mut cache = GeocodeCache::new();
        cache.store(&coord(48.8566, 2.3522), "France");
        for i in 0..MAX_PROXIMITY_ENTRIES {
            cache.store(&coord(-40.0 + i as f64 * 0.5, 100.0), "Elsewhere");
        }
        // Exact match still works, proximity no longer reaches the Paris entry.
        assert_eq!(cache.lookup(&coord(48.8566, 2.3522)), Some("France"));
        assert_eq!(cache.lookup(&coord(48.8049, 2.1204)), None);
    }

    #[test]
    fn test_proximity_first_match_not_nearest() {
        let mut cache = GeocodeCache::new();
        cache.store(&coord(50.00, 5.00), "First");
        cache.store(&coord(50.05, 5.05), "Second");
        // Closer to "Second", but "First" was inserted earlier and is within range.
        assert_eq!(cache.lookup(&coord(50.06, 5.06)), Some("First"));
    }

    #[test]
    fn test_proximity_skips_bad_keys_and_sentinel_values() {
        let path_dir = tempdir().unwrap();
        let path = path_dir.path().join(CACHE_FILENAME);
        fs::write(
            &path,
            r#"{"not a key": "Nowhere", "10.000000,10.000000": "Unknown", "10.010000,10.010000": "Chad"}"#,
        )
        .unwrap();
        let cache = GeocodeCache::load(&path);
        assert_eq!(cache.lookup(&coord(10.02, 10.02)), Some("Chad"));
    }

    #[test]
    fn test_save_load_roundtrip_keeps_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CACHE_FILENAME);
        let mut cache = GeocodeCache::new();
        cache.store(&coord(35.6762, 139.6503), "Japan");
        cache.store(&coord(-22.9068, -43.1729), "Brazil");
        cache.store(&coord(64.1466, -21.9426), "Ísland");
        cache.save(&path);

        let loaded = GeocodeCache::load(&path);
        assert_eq!(loaded, cache);
        let keys: Vec<&str> = loaded.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["35.676200,139.650300", "-22.906800,-43.172900", "64.146600,-21.942600"]);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \""), "expected pretty-printed JSON");
        assert!(text.contains("Ísland"));
    }

    #[test]
    fn test_load_missing_or_corrupt() {
        let dir = tempdir().unwrap();
        assert!(GeocodeCache::load(&dir.path().join("absent.json")).is_empty());

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ this is not json").unwrap();
        assert!(GeocodeCache::load(&bad).is_empty());
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        let dir = tempdir().unwrap();
        let mut cache = GeocodeCache::new();
        cache.store(&coord(0.5, 0.5), "Somewhere");
        cache.save(&dir.path().join("missing-dir").join(CACHE_FILENAME));
    }
}
