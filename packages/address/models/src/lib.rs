#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address record and coordinate types.
//!
//! This crate contains only data types and pure geometry helpers. It has no
//! I/O and no async runtime; importers, geocoders, and the batch pipeline
//! all build on these types.

pub mod coverage;

use serde::{Deserialize, Serialize};

pub use coverage::{Bounds, centroid};

/// Initial map centre (Frankfurt am Main) used before anything resolves.
pub const DEFAULT_MAP_CENTER: Coordinate = Coordinate {
    latitude: 50.1109,
    longitude: 8.6821,
};

/// A WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate from latitude and longitude in degrees.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Geocoding outcome of a single record.
///
/// The only legal transition is `Unresolved -> ResolvedAt`; once resolved
/// the coordinate is never cleared or replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    /// No coordinate (yet, or ever if geocoding failed).
    #[default]
    Unresolved,
    /// Resolved to a coordinate.
    ResolvedAt(Coordinate),
}

impl Resolution {
    /// Moves from [`Resolution::Unresolved`] to
    /// [`Resolution::ResolvedAt`].
    ///
    /// Returns `false` and leaves `self` untouched if it was already
    /// resolved.
    pub fn resolve(&mut self, coordinate: Coordinate) -> bool {
        match self {
            Self::Unresolved => {
                *self = Self::ResolvedAt(coordinate);
                true
            }
            Self::ResolvedAt(_) => false,
        }
    }

    /// The resolved coordinate, if any.
    #[must_use]
    pub const fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Self::Unresolved => None,
            Self::ResolvedAt(c) => Some(*c),
        }
    }
}

/// One imported address entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Street and house number.
    pub street: String,
    /// Postal code.
    pub postal_code: String,
    /// City name.
    pub city: String,
    /// Geocoding outcome. Starts [`Resolution::Unresolved`].
    #[serde(default)]
    pub resolution: Resolution,
}

impl AddressRecord {
    /// Creates an unresolved record.
    #[must_use]
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        street: impl Into<String>,
        postal_code: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            street: street.into(),
            postal_code: postal_code.into(),
            city: city.into(),
            resolution: Resolution::Unresolved,
        }
    }

    /// Free-form query string sent to the geocoding provider.
    ///
    /// Names are deliberately left out; providers match on the postal
    /// address only.
    #[must_use]
    pub fn full_address(&self) -> String {
        format!("{}, {} {}", self.street, self.postal_code, self.city)
    }

    /// Label shown next to the record's marker.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// The resolved coordinate, if any.
    #[must_use]
    pub const fn coordinate(&self) -> Option<Coordinate> {
        self.resolution.coordinate()
    }

    /// Whether this record has been resolved to a coordinate.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self.resolution, Resolution::ResolvedAt(_))
    }
}

/// Lifecycle of a record within one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Imported, not yet handed to the scheduler. Transient: a batch is
    /// first published with its records already `Scheduled`.
    Pending,
    /// Queued in the scheduler, waiting for its release slot.
    Scheduled,
    /// Released; the provider call is outstanding.
    InFlight,
    /// Completed with a coordinate.
    Resolved,
    /// Completed without a coordinate (provider error or no candidates).
    Unresolved,
}

impl RecordState {
    /// Whether the record has completed (successfully or not).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Unresolved)
    }
}
