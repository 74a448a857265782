//! Map view model for a recorded track.
//!
//! Rendering is left to the caller; this module only decides where the
//! camera points and which polyline to draw.

use serde::Serialize;

use crate::track::Coordinate;

/// Camera target used when a session has no coordinates.
pub const FALLBACK_CENTER: (f64, f64) = (41.303_921, -81.901_693);

/// Default camera zoom level.
pub const DEFAULT_ZOOM: f64 = 17.0;

/// Default camera azimuth in degrees.
pub const DEFAULT_AZIMUTH: f64 = 0.0;

/// Default camera tilt in degrees.
pub const DEFAULT_TILT: f64 = 30.0;

/// Where the map camera looks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraPosition {
    /// Target latitude.
    pub latitude: f64,
    /// Target longitude.
    pub longitude: f64,
    /// Zoom level.
    pub zoom: f64,
    /// Azimuth in degrees.
    pub azimuth: f64,
    /// Tilt in degrees.
    pub tilt: f64,
}

impl CameraPosition {
    /// A camera with default zoom, azimuth and tilt looking at a point.
    #[must_use]
    pub fn looking_at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            zoom: DEFAULT_ZOOM,
            azimuth: DEFAULT_AZIMUTH,
            tilt: DEFAULT_TILT,
        }
    }
}

/// Bounding box of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
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

/// What to show for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    /// Initial camera.
    pub camera: CameraPosition,
    /// Track line as `(latitude, longitude)` pairs; only present with two or
    /// more points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polyline: Option<Vec<(f64, f64)>>,
}

impl MapView {
    /// Build the view for a session's coordinates.
    #[must_use]
    pub fn for_coordinates(coordinates: &[Coordinate]) -> Self {
        let (latitude, longitude) = coordinates
            .first()
            .map_or(FALLBACK_CENTER, Coordinate::lat_lon);

        let polyline = (coordinates.len() >= 2)
            .then(|| coordinates.iter().map(Coordinate::lat_lon).collect());

        Self {
            camera: CameraPosition::looking_at(latitude, longitude),
            polyline,
        }
    }

    /// The bounding box of the polyline, if there is one.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        let points = self.polyline.as_deref()?;
        let (&(lat, lon), rest) = points.split_first()?;

        let mut bounds = Bounds {
            min_latitude: lat,
            min_longitude: lon,
            max_latitude: lat,
            max_longitude: lon,
        };
        for &(lat, lon) in rest {
            bounds.min_latitude = bounds.min_latitude.min(lat);
            bounds.min_longitude = bounds.min_longitude.min(lon);
            bounds.max_latitude = bounds.max_latitude.max(lat);
            bounds.max_longitude = bounds.max_longitude.max(lon);
        }
        Some(bounds)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::track::SessionId;

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            session_id: SessionId(1),
            latitude,
            longitude,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_empty_track_uses_fallback_camera() {
        let view = MapView::for_coordinates(&[]);
        assert_eq!(view.camera.latitude, 41.303_921);
        assert_eq!(view.camera.longitude, -81.901_693);
        assert!(view.polyline.is_none());
        assert!(view.bounds().is_none());
    }

    #[test]
    fn test_camera_defaults() {
        let camera = MapView::for_coordinates(&[coord(1.0, 2.0)]).camera;
        assert_eq!(camera.zoom, 17.0);
        assert_eq!(camera.azimuth, 0.0);
        assert_eq!(camera.tilt, 30.0);
    }

    #[test]
    fn test_single_point_has_no_polyline() {
        let view = MapView::for_coordinates(&[coord(48.2, 16.37)]);
        assert_eq!((view.camera.latitude, view.camera.longitude), (48.2, 16.37));
        assert!(view.polyline.is_none());
    }

    #[test]
    fn test_polyline_follows_track_order() {
        let track = [coord(48.2, 16.37), coord(48.1, 16.5), coord(48.3, 16.4)];
        let view = MapView::for_coordinates(&track);

        assert_eq!((view.camera.latitude, view.camera.longitude), (48.2, 16.37));
        assert_eq!(
            view.polyline.as_deref(),
            Some(&[(48.2, 16.37), (48.1, 16.5), (48.3, 16.4)][..])
        );
    }

    #[test]
    fn test_bounds() {
        let track = [coord(48.2, 16.37), coord(48.1, 16.5), coord(48.3, 16.4)];
        let bounds = MapView::for_coordinates(&track).bounds().unwrap();

        assert_eq!(bounds.min_latitude, 48.1);
        assert_eq!(bounds.max_latitude, 48.3);
        assert_eq!(bounds.min_longitude, 16.37);
        assert_eq!(bounds.max_longitude, 16.5);
    }

    #[test]
    fn test_serialize_omits_missing_polyline() {
        let json = serde_json::to_string(&MapView::for_coordinates(&[])).unwrap();
        assert!(json.contains("\"zoom\":17.0"));
        assert!(!json.contains("polyline"));
    }
}
