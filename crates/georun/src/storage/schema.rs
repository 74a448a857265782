//! `SQLite` schema definitions for georun.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the tracks (sessions) table.
pub const CREATE_TRACKS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_time TEXT NOT NULL,
    end_time TEXT,
    distance_m REAL
)
";

/// SQL statement to create the coordinates table.
pub const CREATE_COORDINATES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS coordinates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    track_id INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    timestamp TEXT NOT NULL
)
";

/// SQL statement to create an index on `track_id` for per-session reads.
pub const CREATE_TRACK_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_coordinates_track ON coordinates(track_id)
";

/// SQL statement to create an index on `start_time` for listing.
pub const CREATE_START_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_tracks_start ON tracks(start_time)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_TRACKS_TABLE,
    CREATE_COORDINATES_TABLE,
    CREATE_TRACK_INDEX,
    CREATE_START_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_tracks_table_columns() {
        assert!(CREATE_TRACKS_TABLE.contains("id INTEGER PRIMARY KEY"));
        assert!(CREATE_TRACKS_TABLE.contains("start_time TEXT NOT NULL"));
        assert!(CREATE_TRACKS_TABLE.contains("end_time TEXT"));
        assert!(CREATE_TRACKS_TABLE.contains("distance_m REAL"));
    }

    #[test]
    fn test_coordinates_reference_tracks() {
        assert!(CREATE_COORDINATES_TABLE.contains("REFERENCES tracks(id)"));
        assert!(CREATE_COORDINATES_TABLE.contains("ON DELETE CASCADE"));
    }
}
