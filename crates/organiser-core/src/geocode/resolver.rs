use log::debug;

use super::{GeocodeCache, ReverseGeocoder, UNKNOWN};
use crate::media::Coordinate;

/// Resolves coordinates to country labels, cache first.
pub struct GeocodeResolver {
    cache: GeocodeCache,
    geocoder: Option<Box<dyn ReverseGeocoder>>,
    language: String,
    external_calls: usize,
}

impl GeocodeResolver {
    /// `geocoder: None` restricts resolution to the cache.
    pub fn new(cache: GeocodeCache, geocoder: Option<Box<dyn ReverseGeocoder>>) -> Self {
        Self {
            cache,
            geocoder,
            language: "en".to_string(),
            external_calls: 0,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Country label for `coord`; [`UNKNOWN`] when nothing could be found.
    /// Never fails. Successful external answers are written to the cache.
    pub fn resolve(&mut self, coord: &Coordinate) -> String {
        if let Some(label) = self.cache.lookup(coord) {
            return label.to_string();
        }

        let Some(geocoder) = self.geocoder.as_ref() else {
            debug!("no geocoder configured, {} stays unresolved", coord.cache_key());
            return UNKNOWN.to_string();
        };

        self.external_calls += 1;
        let label = match geocoder.reverse(coord, &self.language, true) {
            Ok(Some(location)) => {
                debug!("reverse geocode result for {}: {:?}", coord.cache_key(), location.display_name);
                location.label()
            }
            Ok(None) => {
                debug!("reverse geocode found nothing for {}", coord.cache_key());
                UNKNOWN.to_string()
            }
            Err(e) => {
                debug!("reverse geocode failed for {}: {}", coord.cache_key(), e);
                UNKNOWN.to_string()
            }
        };

        self.cache.store(coord, &label);
        label
    }

    /// Number of calls made to the external geocoder so far.
    pub fn external_calls(&self) -> usize {
        self.external_calls
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    pub fn into_cache(self) -> GeocodeCache {
        self.cache
    }
}
