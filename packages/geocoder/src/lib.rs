#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding capability for address records.
//!
//! The batch pipeline only ever talks to the [`Geocoder`] trait: a single
//! asynchronous `geocode(query)` call returning zero or more candidate
//! coordinates. The concrete provider shipped here is
//! [`nominatim::NominatimGeocoder`]; its endpoint and rate limit come from
//! the TOML definitions in the [`service_registry`].
//!
//! Rate limiting is **not** done here. Callers schedule requests (see the
//! `csv_mapper_batch` scheduler) so that the provider's limit holds across
//! the whole batch.

pub mod nominatim;
pub mod service_registry;

use async_trait::async_trait;
use csv_mapper_address_models::Coordinate;
use thiserror::Error;

/// One candidate match returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Matched coordinate.
    pub coordinate: Coordinate,
    /// Canonical address as reported by the provider.
    pub matched_address: Option<String>,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Provider rejected the request for exceeding its rate limit.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Provider answered with a non-success status.
    #[error("Provider returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Provider answered successfully but found nothing.
    #[error("No candidates found")]
    NoCandidates,

    /// Any other provider failure.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of the failure.
        message: String,
    },
}

/// A service that turns a free-form address into candidate coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Short identifier used in log messages.
    fn name(&self) -> &str;

    /// Looks up a free-form address.
    ///
    /// An empty vector means the provider answered but found no match.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the provider could not be reached or its
    /// answer could not be understood.
    async fn geocode(&self, query: &str) -> Result<Vec<Candidate>, GeocodeError>;
}
