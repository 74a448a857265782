//! Great-circle distance over recorded tracks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::track::Coordinate;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distances below this are shown in whole meters, above it in kilometers.
const KILOMETER_THRESHOLD_M: f64 = 1000.0;

/// A distance in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distance(f64);

impl Distance {
    /// Zero distance.
    pub const ZERO: Self = Self(0.0);

    /// Create a distance from meters.
    #[must_use]
    pub fn from_meters(meters: f64) -> Self {
        Self(meters)
    }

    /// The distance in meters.
    #[must_use]
    pub fn meters(self) -> f64 {
        self.0
    }

    /// The distance in kilometers.
    #[must_use]
    pub fn kilometers(self) -> f64 {
        self.0 / 1000.0
    }
}

impl std::ops::Add for Distance {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Distance {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, d| acc + d)
    }
}

/// `734 m` below one kilometer (truncated), `1.23 km` from there on.
impl fmt::Display for Distance {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < KILOMETER_THRESHOLD_M {
            write!(f, "{} m", self.0.trunc() as i64)
        } else {
            write!(f, "{:.2} km", self.kilometers())
        }
    }
}

/// Haversine distance in meters between two `(latitude, longitude)` points.
#[must_use]
pub fn haversine(a: (f64, f64), b: (f64, f64)) -> f64 {
    let lat1 = a.0.to_radians();
    let lat2 = b.0.to_radians();
    let dlat = (b.0 - a.0).to_radians();
    let dlon = (b.1 - a.1).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Total length of an ordered sequence of points.
///
/// Fewer than two points yield [`Distance::ZERO`].
#[must_use]
pub fn path_length(points: &[(f64, f64)]) -> Distance {
    points
        .windows(2)
        .map(|w| Distance::from_meters(haversine(w[0], w[1])))
        .sum()
}

/// Total length of a recorded track, in the order the samples are given.
#[must_use]
pub fn total_distance(coordinates: &[Coordinate]) -> Distance {
    let points: Vec<(f64, f64)> = coordinates.iter().map(Coordinate::lat_lon).collect();
    path_length(&points)
}
