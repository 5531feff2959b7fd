//! Summary geometry over a set of resolved coordinates.

use serde::{Deserialize, Serialize};

use crate::Coordinate;

/// Arithmetic mean of the given coordinates.
///
/// Returns `None` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn centroid(points: &[Coordinate]) -> Option<Coordinate> {
    if points.is_empty() {
        return None;
    }
    let count = points.len() as f64;
    let (lat, lon) = points.iter().fold((0.0, 0.0), |(lat, lon), p| {
        (lat + p.latitude, lon + p.longitude)
    });
    Some(Coordinate::new(lat / count, lon / count))
}

/// Axis-aligned latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Southernmost latitude.
    pub min_latitude: f64,
    /// Westernmost longitude.
    pub min_longitude: f64,
    /// Northernmost latitude.
    pub max_latitude: f64,
    /// Easternmost longitude.
    pub max_longitude: f64,
}

impl Bounds {
    /// Smallest box enclosing every point, or `None` for an empty slice.
    #[must_use]
    pub fn enclosing(points: &[Coordinate]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self {
            min_latitude: first.latitude,
            min_longitude: first.longitude,
            max_latitude: first.latitude,
            max_longitude: first.longitude,
        };
        for p in rest {
            bounds.min_latitude = bounds.min_latitude.min(p.latitude);
            bounds.min_longitude = bounds.min_longitude.min(p.longitude);
            bounds.max_latitude = bounds.max_latitude.max(p.latitude);
            bounds.max_longitude = bounds.max_longitude.max(p.longitude);
        }
        Some(bounds)
    }

    /// Whether `point` lies inside the box (edges included).
    #[must_use]
    pub fn contains(&self, point: Coordinate) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&point.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&point.longitude)
    }

    /// `[west, south, east, north]`, the GeoJSON `bbox` order.
    #[must_use]
    pub const fn to_bbox(&self) -> [f64; 4] {
        [
            self.min_longitude,
            self.min_latitude,
            self.max_longitude,
            self.max_latitude,
        ]
    }
}
