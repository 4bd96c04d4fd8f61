//! Coordinate-to-country resolution: a proximity-aware cache in front of a
//! rate-limited reverse-geocoding service.

pub mod cache;
pub mod nominatim;
pub mod rate_limit;
pub mod resolver;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::Coordinate;

pub use cache::{GeocodeCache, CACHE_FILENAME};
pub use nominatim::NominatimClient;
pub use rate_limit::{RateLimitPolicy, RateLimited};
pub use resolver::GeocodeResolver;

/// Label for a coordinate that could not be resolved. Never cached.
pub const UNKNOWN: &str = "Unknown";

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Response(String),
}

/// Structured part of a reverse-geocoding answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

/// One place returned by a reverse geocoder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationResult {
    pub address: Option<Address>,
    /// Free-form address line
    pub display_name: Option<String>,
    /// Full response, kept for the string fallback
    pub raw: serde_json::Value,
}

impl LocationResult {
    /// Country label, in priority order: `country`, `country_name`,
    /// `country_code`, display address, string form, then [`UNKNOWN`].
    pub fn label(&self) -> String {
        let address = self.address.as_ref();
        let candidates = [
            address.and_then(|a| a.country.clone()),
            address.and_then(|a| a.country_name.clone()),
            address.and_then(|a| a.country_code.clone()),
            self.display_name.clone(),
            Some(self.to_string()),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

impl fmt::Display for LocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.display_name, &self.raw) {
            (Some(name), _) => f.write_str(name),
            (None, serde_json::Value::Null) => Ok(()),
            (None, raw) => write!(f, "{}", raw),
        }
    }
}

/// A reverse-geocoding capability.
pub trait ReverseGeocoder {
    /// Look up the place at `coord`. `Ok(None)` means the service had no answer.
    fn reverse(
        &self,
        coord: &Coordinate,
        language: &str,
        exactly_one: bool,
    ) -> Result<Option<LocationResult>, GeocodeError>;
}

impl<G: ReverseGeocoder + ?Sized> ReverseGeocoder for Box<G> {
    fn reverse(
        &self,
        coord: &Coordinate,
        language: &str,
        exactly_one: bool,
    ) -> Result<Option<LocationResult>, GeocodeError> {
        (**self).reverse(coord, language, exactly_one)
    }
}

/// Settings for the external reverse-geocoding service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderOptions {
    pub endpoint: String,
    pub user_agent: String,
    pub language: String,
    pub timeout_secs: f64,
    pub min_delay_secs: f64,
    pub max_retries: u32,
    pub error_wait_secs: f64,
}

impl Default for GeocoderOptions {
    fn default() -> Self {
        Self {
            endpoint: nominatim::DEFAULT_ENDPOINT.to_string(),
            user_agent: concat!("photo-organiser/", env!("CARGO_PKG_VERSION")).to_string(),
            language: "en".to_string(),
            timeout_secs: 10.0,
            min_delay_secs: 1.0,
            max_retries: 2,
            error_wait_secs: 2.0,
        }
    }
}

impl GeocoderOptions {
    pub fn rate_limit(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            min_delay: secs(self.min_delay_secs),
            max_retries: self.max_retries,
            error_wait: secs(self.error_wait_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    /// The Nominatim client wrapped in this configuration's rate limiter.
    pub fn build(&self) -> Result<Box<dyn ReverseGeocoder>, GeocodeError> {
        let client = NominatimClient::new(self)?;
        Ok(Box::new(RateLimited::new(client, self.rate_limit())))
    }
}

/// Negative or non-finite settings collapse to zero.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}
