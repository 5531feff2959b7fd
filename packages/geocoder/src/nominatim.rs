//! Nominatim / OpenStreetMap geocoder client.
//!
//! The public instance has strict usage rules: an identifying
//! `User-Agent` header on every request and at most about one request per
//! second. The client sends the header; spacing requests is left to the
//! caller (see `rate_limit_ms` in `services/nominatim.toml`).
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use std::time::Duration;

use async_trait::async_trait;
use csv_mapper_address_models::Coordinate;

use crate::service_registry::NominatimConfig;
use crate::{Candidate, GeocodeError, Geocoder};

/// Free-form search client for a Nominatim instance.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    country_codes: Option<String>,
    limit: u32,
}

impl NominatimGeocoder {
    /// Builds a client with the configured `User-Agent` and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &NominatimConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            country_codes: config.country_codes.clone(),
            limit: config.limit.max(1),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn geocode(&self, query: &str) -> Result<Vec<Candidate>, GeocodeError> {
        let limit = self.limit.to_string();
        let mut params = vec![("q", query), ("format", "jsonv2"), ("limit", limit.as_str())];
        if let Some(codes) = self.country_codes.as_deref() {
            params.push(("countrycodes", codes));
        }

        let resp = self.client.get(&self.base_url).query(&params).send().await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        if !resp.status().is_success() {
            return Err(GeocodeError::Status {
                status: resp.status().as_u16(),
            });
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(&body)
    }
}

/// Parses a Nominatim `jsonv2` search response into candidates, in the
/// provider's ranking order.
///
/// # Errors
///
/// Returns [`GeocodeError::Parse`] if the body is not an array or an entry
/// lacks a numeric `lat`/`lon`.
pub fn parse_response(body: &serde_json::Value) -> Result<Vec<Candidate>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    results
        .iter()
        .map(|entry| {
            let lat = coordinate_field(entry, "lat")?;
            let lon = coordinate_field(entry, "lon")?;
            Ok(Candidate {
                coordinate: Coordinate::new(lat, lon),
                matched_address: entry["display_name"].as_str().map(String::from),
            })
        })
        .collect()
}

/// Nominatim encodes coordinates as strings; accept plain numbers too.
fn coordinate_field(entry: &serde_json::Value, key: &str) -> Result<f64, GeocodeError> {
    let value = &entry[key];
    value
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| value.as_f64())
        .ok_or_else(|| GeocodeError::Parse {
            message: format!("Missing {key} in Nominatim response"),
        })
}
