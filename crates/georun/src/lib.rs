//! `georun` - A GPS track recorder
//!
//! This library records location fixes into track sessions kept in a local
//! `SQLite` database, computes the distance covered by each session and
//! prepares sessions for display on a map.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod distance;
pub mod error;
pub mod location;
pub mod logging;
pub mod map;
pub mod storage;
pub mod track;
pub mod tracker;

pub use config::Config;
pub use distance::{haversine, total_distance, Distance};
pub use error::{Error, Result};
pub use location::{JsonLinesSource, LocationSource, PermissionStatus, SubscriptionHandle};
pub use logging::init_logging;
pub use map::MapView;
pub use storage::{Storage, StorageStats};
pub use track::{Coordinate, LocationFix, SessionId, TrackSession};
pub use tracker::{Tracker, TrackerState};
