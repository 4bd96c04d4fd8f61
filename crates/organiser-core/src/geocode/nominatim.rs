use reqwest::blocking::Client;
use serde_json::Value;

use super::{Address, GeocodeError, GeocoderOptions, LocationResult, ReverseGeocoder};
use crate::media::Coordinate;

pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org/reverse";

/// Blocking client for the OpenStreetMap Nominatim `reverse` endpoint.
pub struct NominatimClient {
    client: Client,
    endpoint: String,
}

impl NominatimClient {
    pub fn new(options: &GeocoderOptions) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: options.endpoint.clone(),
        })
    }
}

impl ReverseGeocoder for NominatimClient {
    // The reverse endpoint always answers with a single place.
    fn reverse(
        &self,
        coord: &Coordinate,
        language: &str,
        _exactly_one: bool,
    ) -> Result<Option<LocationResult>, GeocodeError> {
        let query = [
            ("format", "jsonv2".to_string()),
            ("lat", coord.lat().to_string()),
            ("lon", coord.lon().to_string()),
            ("accept-language", language.to_string()),
            ("addressdetails", "1".to_string()),
        ];
        let body: Value = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()?
            .error_for_status()?
            .json()?;
        parse_response(body)
    }
}

/// Turn a Nominatim JSON body into a [`LocationResult`].
///
/// `{"error": ...}` (e.g. a point in the ocean) is a valid "no answer".
pub fn parse_response(body: Value) -> Result<Option<LocationResult>, GeocodeError> {
    if !body.is_object() {
        return Err(GeocodeError::Response(format!("expected a JSON object, got {}", body)));
    }
    if body.get("error").is_some() {
        return Ok(None);
    }
    let address = body
        .get("address")
        .and_then(|a| serde_json::from_value::<Address>(a.clone()).ok());
    let display_name = body
        .get("display_name")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(Some(LocationResult {
        address,
        display_name,
        raw: body,
    }))
}
