//! Storage layer for georun.
//!
//! This module provides `SQLite`-based persistent storage for track sessions
//! and the coordinates recorded against them. Every write runs inside a
//! transaction.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::distance::{total_distance, Distance};
use crate::error::{Error, Result};
use crate::track::{Coordinate, LocationFix, SessionId, TrackSession};

/// Storage engine for track sessions.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Opening and closing sessions
/// - Appending timestamped coordinates
/// - Listing sessions and reading a session's track
/// - Deleting a session together with its coordinates
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a new open session starting at `start_time`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn start_session(&self, start_time: DateTime<Utc>) -> Result<SessionId> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO tracks (start_time) VALUES (?1)",
            [encode_time(start_time)],
        )?;
        let id = SessionId(tx.last_insert_rowid());
        tx.commit()?;

        debug!("Started track session {}", id);
        Ok(id)
    }

    /// Append a location sample to an open session.
    ///
    /// Returns the row id of the stored coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCoordinate`] for out-of-range fixes,
    /// [`Error::SessionNotFound`] for an unknown session and
    /// [`Error::SessionClosed`] if the session already ended.
    pub fn add_coordinate(&self, id: SessionId, fix: &LocationFix) -> Result<i64> {
        fix.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        ensure_open(&tx, id)?;
        tx.execute(
            r"
            INSERT INTO coordinates (track_id, latitude, longitude, timestamp)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![id.0, fix.latitude, fix.longitude, encode_time(fix.timestamp)],
        )?;
        let row_id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(row_id)
    }

    /// Close a session, recording its end time and total distance.
    ///
    /// The distance is computed from the session's coordinates in the order
    /// they were recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] for an unknown session,
    /// [`Error::SessionClosed`] if it already ended, or a database error.
    pub fn end_session(&self, id: SessionId, end_time: DateTime<Utc>) -> Result<TrackSession> {
        let tx = self.conn.unchecked_transaction()?;
        ensure_open(&tx, id)?;

        let coordinates = load_coordinates(&tx, id)?;
        let distance = total_distance(&coordinates);

        tx.execute(
            "UPDATE tracks SET end_time = ?1, distance_m = ?2 WHERE id = ?3",
            params![encode_time(end_time), distance.meters(), id.0],
        )?;
        let session = load_session(&tx, id)?.ok_or(Error::SessionNotFound(id))?;
        tx.commit()?;

        info!(
            "Closed track session {} with {} points over {}",
            id,
            coordinates.len(),
            distance
        );
        Ok(session)
    }

    /// Get a session by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_session(&self, id: SessionId) -> Result<Option<TrackSession>> {
        load_session(&self.conn, id)
    }

    /// List closed sessions, oldest first.
    ///
    /// Sessions that were never stopped are not listed; see [`Self::open_sessions`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_sessions(&self) -> Result<Vec<TrackSession>> {
        self.query_sessions(
            r"
            SELECT id, start_time, end_time, distance_m FROM tracks
            WHERE end_time IS NOT NULL
            ORDER BY start_time ASC, id ASC
            ",
        )
    }

    /// List sessions that have no end time.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn open_sessions(&self) -> Result<Vec<TrackSession>> {
        self.query_sessions(
            r"
            SELECT id, start_time, end_time, distance_m FROM tracks
            WHERE end_time IS NULL
            ORDER BY start_time ASC, id ASC
            ",
        )
    }

    fn query_sessions(&self, sql: &str) -> Result<Vec<TrackSession>> {
        let mut stmt = self.conn.prepare(sql)?;
        let sessions = stmt
            .query_map([], row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Get the coordinates of a session in recording order.
    ///
    /// An unknown session yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn coordinates(&self, id: SessionId) -> Result<Vec<Coordinate>> {
        load_coordinates(&self.conn, id)
    }

    /// Count the coordinates recorded for a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn coordinate_count(&self, id: SessionId) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM coordinates WHERE track_id = ?1",
            [id.0],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete a session and all of its coordinates.
    ///
    /// Returns `true` if a session was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_session(&self, id: SessionId) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let points = tx.execute("DELETE FROM coordinates WHERE track_id = ?1", [id.0])?;
        let affected = tx.execute("DELETE FROM tracks WHERE id = ?1", [id.0])?;
        tx.commit()?;

        if affected > 0 {
            info!("Deleted track session {} and {} coordinates", id, points);
        }
        Ok(affected > 0)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_sessions: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        let open_sessions: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tracks WHERE end_time IS NULL",
            [],
            |row| row.get(0),
        )?;
        let total_coordinates: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM coordinates", [], |row| row.get(0))?;
        let total_distance_m: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(distance_m), 0.0) FROM tracks",
            [],
            |row| row.get(0),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_sessions,
            open_sessions,
            total_coordinates,
            total_distance: Distance::from_meters(total_distance_m),
            db_size_bytes,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageStats {
    /// Number of sessions, open or closed.
    pub total_sessions: i64,
    /// Number of sessions without an end time.
    pub open_sessions: i64,
    /// Number of stored coordinates.
    pub total_coordinates: i64,
    /// Sum of the distances of all closed sessions.
    pub total_distance: Distance,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Fail unless `id` names an existing session without an end time.
fn ensure_open(conn: &Connection, id: SessionId) -> Result<()> {
    let end_time: Option<Option<String>> = conn
        .query_row("SELECT end_time FROM tracks WHERE id = ?1", [id.0], |row| {
            row.get(0)
        })
        .optional()?;

    match end_time {
        None => Err(Error::SessionNotFound(id)),
        Some(Some(_)) => Err(Error::SessionClosed(id)),
        Some(None) => Ok(()),
    }
}

fn load_session(conn: &Connection, id: SessionId) -> Result<Option<TrackSession>> {
    let session = conn
        .query_row(
            "SELECT id, start_time, end_time, distance_m FROM tracks WHERE id = ?1",
            [id.0],
            row_to_session,
        )
        .optional()?;
    Ok(session)
}

fn load_coordinates(conn: &Connection, id: SessionId) -> Result<Vec<Coordinate>> {
    let mut stmt = conn.prepare(
        r"
        SELECT track_id, latitude, longitude, timestamp
        FROM coordinates WHERE track_id = ?1
        ORDER BY id ASC
        ",
    )?;

    let coordinates = stmt
        .query_map([id.0], row_to_coordinate)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(coordinates)
}

/// Convert a database row to a `TrackSession`.
fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<TrackSession> {
    let id: i64 = row.get(0)?;
    let start_time: String = row.get(1)?;
    let end_time: Option<String> = row.get(2)?;
    let distance_m: Option<f64> = row.get(3)?;

    Ok(TrackSession {
        id: SessionId(id),
        start_time: decode_time(1, &start_time)?,
        end_time: end_time.map(|s| decode_time(2, &s)).transpose()?,
        distance: distance_m.map(Distance::from_meters),
    })
}

/// Convert a database row to a `Coordinate`.
fn row_to_coordinate(row: &rusqlite::Row) -> rusqlite::Result<Coordinate> {
    let track_id: i64 = row.get(0)?;
    let timestamp: String = row.get(3)?;

    Ok(Coordinate {
        session_id: SessionId(track_id),
        latitude: row.get(1)?,
        longitude: row.get(2)?,
        timestamp: decode_time(3, &timestamp)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn record(storage: &Storage, points: &[(f64, f64)]) -> SessionId {
        let id = storage.start_session(Utc::now()).unwrap();
        for &(lat, lon) in points {
            storage
                .add_coordinate(id, &LocationFix::new(lat, lon))
                .unwrap();
        }
        id
    }

    #[test]
    fn test_open_in_memory() {
        assert!(Storage::open_in_memory().is_ok());
    }

    #[test]
    fn test_start_session_is_open() {
        let storage = create_test_storage();
        let start = Utc::now();
        let id = storage.start_session(start).unwrap();

        let session = storage.get_session(id).unwrap().unwrap();
        assert_eq!(session.id, id);
        assert!(session.is_open());
        assert!(session.distance.is_none());
        assert_eq!(
            session.start_time.timestamp_micros(),
            start.timestamp_micros()
        );
    }

    #[test]
    fn test_session_ids_increase() {
        let storage = create_test_storage();
        let a = storage.start_session(Utc::now()).unwrap();
        let b = storage.start_session(Utc::now()).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_add_coordinate_and_read_back_in_order() {
        let storage = create_test_storage();
        let id = record(&storage, &[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);

        let coords = storage.coordinates(id).unwrap();
        assert_eq!(coords.len(), 3);
        assert_eq!(coords[0].lat_lon(), (1.0, 1.0));
        assert_eq!(coords[2].lat_lon(), (3.0, 3.0));
        assert!(coords.iter().all(|c| c.session_id == id));
        assert_eq!(storage.coordinate_count(id).unwrap(), 3);
    }

    #[test]
    fn test_add_coordinate_unknown_session() {
        let storage = create_test_storage();
        let err = storage
            .add_coordinate(SessionId(404), &LocationFix::new(0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(SessionId(404))));
    }

    #[test]
    fn test_add_coordinate_rejects_invalid_fix() {
        let storage = create_test_storage();
        let id = storage.start_session(Utc::now()).unwrap();
        let err = storage
            .add_coordinate(id, &LocationFix::new(120.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCoordinate { .. }));
        assert_eq!(storage.coordinate_count(id).unwrap(), 0);
    }

    #[test]
    fn test_add_coordinate_to_closed_session() {
        let storage = create_test_storage();
        let id = record(&storage, &[(1.0, 1.0)]);
        storage.end_session(id, Utc::now()).unwrap();

        let err = storage
            .add_coordinate(id, &LocationFix::new(2.0, 2.0))
            .unwrap_err();
        assert!(matches!(err, Error::SessionClosed(_)));
        assert_eq!(storage.coordinate_count(id).unwrap(), 1);
    }

    #[test]
    fn test_end_session_computes_distance() {
        let storage = create_test_storage();
        let id = record(&storage, &[(0.0, 0.0), (0.0, 0.01), (0.0, 0.02)]);
        let end = Utc::now() + Duration::minutes(10);

        let session = storage.end_session(id, end).unwrap();
        assert!(!session.is_open());
        let meters = session.distance.unwrap().meters();
        // 0.02 degrees of longitude at the equator is about 2.22 km
        assert!(meters > 2_200.0 && meters < 2_250.0, "got {meters}");
        assert_eq!(session.distance.unwrap().to_string(), "2.22 km");

        let stored = storage.get_session(id).unwrap().unwrap();
        assert_eq!(stored, session);
    }

    #[test]
    fn test_end_session_without_points_is_zero() {
        let storage = create_test_storage();
        let id = storage.start_session(Utc::now()).unwrap();
        let session = storage.end_session(id, Utc::now()).unwrap();
        assert_eq!(session.distance, Some(Distance::ZERO));
        assert_eq!(session.distance.unwrap().to_string(), "0 m");
    }

    #[test]
    fn test_end_session_twice() {
        let storage = create_test_storage();
        let id = storage.start_session(Utc::now()).unwrap();
        storage.end_session(id, Utc::now()).unwrap();
        assert!(matches!(
            storage.end_session(id, Utc::now()),
            Err(Error::SessionClosed(_))
        ));
    }

    #[test]
    fn test_end_unknown_session() {
        let storage = create_test_storage();
        let err = storage.end_session(SessionId(5), Utc::now()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_sessions_hides_open_ones() {
        let storage = create_test_storage();
        let now = Utc::now();
        let first = storage.start_session(now - Duration::hours(2)).unwrap();
        storage.end_session(first, now - Duration::hours(1)).unwrap();
        let open = storage.start_session(now).unwrap();

        let listed = storage.list_sessions().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, first);

        let open_list = storage.open_sessions().unwrap();
        assert_eq!(open_list.len(), 1);
        assert_eq!(open_list[0].id, open);
    }

    #[test]
    fn test_list_sessions_ordered_by_start() {
        let storage = create_test_storage();
        let now = Utc::now();
        let late = storage.start_session(now).unwrap();
        let early = storage.start_session(now - Duration::days(1)).unwrap();
        storage.end_session(late, now).unwrap();
        storage.end_session(early, now).unwrap();

        let ids: Vec<SessionId> = storage
            .list_sessions()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![early, late]);
    }

    #[test]
    fn test_coordinates_unknown_session_empty() {
        let storage = create_test_storage();
        assert!(storage.coordinates(SessionId(77)).unwrap().is_empty());
    }

    #[test]
    fn test_delete_session_removes_coordinates() {
        let storage = create_test_storage();
        let keep = record(&storage, &[(5.0, 5.0)]);
        let id = record(&storage, &[(1.0, 1.0), (2.0, 2.0)]);
        storage.end_session(id, Utc::now()).unwrap();

        assert!(storage.delete_session(id).unwrap());
        assert!(storage.get_session(id).unwrap().is_none());
        assert!(storage.coordinates(id).unwrap().is_empty());
        assert_eq!(storage.coordinate_count(keep).unwrap(), 1);
    }

    #[test]
    fn test_delete_nonexistent() {
        let storage = create_test_storage();
        assert!(!storage.delete_session(SessionId(99_999)).unwrap());
    }

    #[test]
    fn test_stats() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.total_coordinates, 0);
        assert_eq!(stats.total_distance, Distance::ZERO);

        let id = record(&storage, &[(0.0, 0.0), (0.0, 0.001)]);
        storage.end_session(id, Utc::now()).unwrap();
        record(&storage, &[(1.0, 1.0)]);

        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.open_sessions, 1);
        assert_eq!(stats.total_coordinates, 3);
        assert!(stats.total_distance.meters() > 100.0);
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_path() {
        let storage = create_test_storage();
        assert_eq!(storage.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_corrupt_timestamp_is_an_error() {
        let storage = create_test_storage();
        let id = storage.start_session(Utc::now()).unwrap();
        storage
            .conn
            .execute(
                "UPDATE tracks SET start_time = 'yesterday' WHERE id = ?1",
                [id.0],
            )
            .unwrap();
        assert!(storage.get_session(id).is_err());
    }

    #[test]
    fn test_open_file_based_persists() {
        let db_path =
            std::env::temp_dir().join(format!("georun_test_{}.db", std::process::id()));

        let id = {
            let storage = Storage::open(&db_path).unwrap();
            assert_eq!(storage.path(), db_path);
            let id = record(&storage, &[(1.0, 2.0), (1.001, 2.0)]);
            storage.end_session(id, Utc::now()).unwrap();
            id
        };

        let reopened = Storage::open(&db_path).unwrap();
        assert_eq!(reopened.list_sessions().unwrap().len(), 1);
        assert_eq!(reopened.coordinates(id).unwrap().len(), 2);
        assert!(reopened.stats().unwrap().db_size_bytes > 0);

        drop(reopened);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("georun_test_dirs_{}", std::process::id()));
        let nested_path = root.join("nested/tracks.db");
        let _ = std::fs::remove_dir_all(&root);

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        let _ = std::fs::remove_dir_all(&root);
    }
}
