//! Core track types for georun.
//!
//! This module defines the data structures for recorded track sessions and
//! the location samples stored against them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::distance::Distance;
use crate::error::{Error, Result};

/// Identifier of a track session (the `tracks` row id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// A single position delivered by a location source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// When the position was observed.
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    /// Create a fix observed now.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::at(latitude, longitude, Utc::now())
    }

    /// Create a fix observed at the given time.
    #[must_use]
    pub fn at(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Check that the fix lies within the WGS84 coordinate range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCoordinate`] for non-finite or out-of-range values.
    pub fn validate(&self) -> Result<()> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(Error::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

impl fmt::Display for LocationFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lat: {} Lon: {}", self.latitude, self.longitude)
    }
}

/// A stored location sample belonging to a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Session this sample belongs to.
    pub session_id: SessionId,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// When the sample was observed.
    pub timestamp: DateTime<Utc>,
}

impl Coordinate {
    /// Attach a fix to a session.
    #[must_use]
    pub fn from_fix(session_id: SessionId, fix: &LocationFix) -> Self {
        Self {
            session_id,
            latitude: fix.latitude,
            longitude: fix.longitude,
            timestamp: fix.timestamp,
        }
    }

    /// The `(latitude, longitude)` pair.
    #[must_use]
    pub fn lat_lon(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// A recorded tracking session.
///
/// A session is open while it is being recorded and closed once it has an
/// end time and a derived distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSession {
    /// Session identifier.
    pub id: SessionId,
    /// When recording started.
    pub start_time: DateTime<Utc>,
    /// When recording stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Total distance covered, set when the session is closed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<Distance>,
}

impl TrackSession {
    /// Whether the session is still being recorded.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Elapsed time between start and end, for closed sessions.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display_and_parse() {
        assert_eq!(SessionId(42).to_string(), "42");
        assert_eq!(" 17 ".parse::<SessionId>().unwrap(), SessionId(17));
        assert!("abc".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_fix_validate() {
        assert!(LocationFix::new(55.75, 37.61).validate().is_ok());
        assert!(LocationFix::new(-90.0, 180.0).validate().is_ok());
        assert!(LocationFix::new(90.5, 0.0).validate().is_err());
        assert!(LocationFix::new(0.0, -180.1).validate().is_err());
        assert!(LocationFix::new(f64::NAN, 0.0).validate().is_err());
        assert!(LocationFix::new(0.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_fix_display() {
        let fix = LocationFix::new(55.5, 37.25);
        assert_eq!(fix.to_string(), "Lat: 55.5 Lon: 37.25");
    }

    #[test]
    fn test_coordinate_from_fix() {
        let fix = LocationFix::new(10.0, 20.0);
        let coord = Coordinate::from_fix(SessionId(1), &fix);
        assert_eq!(coord.session_id, SessionId(1));
        assert_eq!(coord.lat_lon(), (10.0, 20.0));
        assert_eq!(coord.timestamp, fix.timestamp);
    }

    #[test]
    fn test_session_open_and_duration() {
        let start = Utc::now();
        let mut session = TrackSession {
            id: SessionId(1),
            start_time: start,
            end_time: None,
            distance: None,
        };
        assert!(session.is_open());
        assert!(session.duration().is_none());

        session.end_time = Some(start + Duration::minutes(5));
        assert!(!session.is_open());
        assert_eq!(session.duration(), Some(Duration::minutes(5)));
    }

    #[test]
    fn test_session_serialization_skips_missing_end() {
        let session = TrackSession {
            id: SessionId(9),
            start_time: Utc::now(),
            end_time: None,
            distance: None,
        };
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"id\":9"));
        assert!(!json.contains("end_time"));
        assert!(!json.contains("distance"));
    }
}
