//! Compile-time registry of geocoding service configurations.
//!
//! Each provider is defined in a TOML file under `services/`. The registry
//! embeds these at compile time and exposes them via [`all_services`],
//! [`enabled_services`], and [`find_service`].
//!
//! A few settings can be overridden at runtime through environment
//! variables (see [`GeocodingService::with_env_overrides`]).

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::nominatim::NominatimGeocoder;
use crate::{GeocodeError, Geocoder};

/// Overrides the provider's base URL.
pub const ENV_GEOCODER_URL: &str = "CSV_MAPPER_GEOCODER_URL";
/// Overrides the `User-Agent` sent to the provider.
pub const ENV_USER_AGENT: &str = "CSV_MAPPER_USER_AGENT";
/// Overrides the minimum spacing between requests, in milliseconds.
pub const ENV_RATE_LIMIT_MS: &str = "CSV_MAPPER_RATE_LIMIT_MS";

/// A geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (e.g., `"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this service may be selected.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Nominatim / `OpenStreetMap` geocoder.
    Nominatim(NominatimConfig),
}

/// Settings for a Nominatim instance.
#[derive(Debug, Clone, Deserialize)]
pub struct NominatimConfig {
    /// Search endpoint (e.g., `"https://nominatim.openstreetmap.org/search"`).
    pub base_url: String,
    /// Minimum delay between requests in milliseconds.
    pub rate_limit_ms: u64,
    /// Identifying `User-Agent` required by the usage policy.
    pub user_agent: String,
    /// Comma-separated ISO country codes to restrict results to.
    #[serde(default)]
    pub country_codes: Option<String>,
    /// Maximum candidates requested per query.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_true() -> bool {
    true
}

const fn default_limit() -> u32 {
    1
}

const fn default_timeout_secs() -> u64 {
    20
}

impl GeocodingService {
    /// Returns the provider's base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::Nominatim(c) => &c.base_url,
        }
    }

    /// Minimum spacing between two requests to this provider.
    #[must_use]
    pub const fn rate_limit(&self) -> Duration {
        match &self.provider {
            ProviderConfig::Nominatim(c) => Duration::from_millis(c.rate_limit_ms),
        }
    }

    /// The Nominatim settings, if this is a Nominatim service.
    #[must_use]
    pub const fn nominatim(&self) -> Option<&NominatimConfig> {
        match &self.provider {
            ProviderConfig::Nominatim(c) => Some(c),
        }
    }

    /// Applies the `CSV_MAPPER_*` environment overrides.
    ///
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let ProviderConfig::Nominatim(config) = &mut self.provider;

        if let Some(url) = lookup(ENV_GEOCODER_URL).filter(|s| !s.is_empty()) {
            log::info!("Using geocoder URL from {ENV_GEOCODER_URL}: {url}");
            config.base_url = url;
        }
        if let Some(agent) = lookup(ENV_USER_AGENT).filter(|s| !s.is_empty()) {
            config.user_agent = agent;
        }
        if let Some(raw) = lookup(ENV_RATE_LIMIT_MS) {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => config.rate_limit_ms = ms,
                _ => log::warn!("Ignoring invalid {ENV_RATE_LIMIT_MS}='{raw}'"),
            }
        }

        self
    }

    /// Builds the provider client for this service.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the underlying HTTP client cannot be built.
    pub fn build(&self) -> Result<Arc<dyn Geocoder>, GeocodeError> {
        match &self.provider {
            ProviderConfig::Nominatim(c) => Ok(Arc::new(NominatimGeocoder::new(c)?)),
        }
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const SERVICE_TOMLS: &[(&str, &str)] = &[("nominatim", include_str!("../services/nominatim.toml"))];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 1;

/// Returns all geocoding service configurations (enabled and disabled).
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse geocoding service '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled services.
#[must_use]
pub fn enabled_services() -> Vec<GeocodingService> {
    all_services().into_iter().filter(|s| s.enabled).collect()
}

/// Looks up an enabled service by id.
#[must_use]
pub fn find_service(id: &str) -> Option<GeocodingService> {
    enabled_services().into_iter().find(|s| s.id == id)
}
