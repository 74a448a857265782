//! Error types for georun.
//!
//! This module defines all error types used throughout the georun crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::track::SessionId;

/// The main error type for georun operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Session Errors ===
    /// No session exists with the given id.
    #[error("track session {0} not found")]
    SessionNotFound(SessionId),

    /// The session already has an end time and cannot be modified.
    #[error("track session {0} is already closed")]
    SessionClosed(SessionId),

    /// The session is being recorded and cannot be deleted.
    #[error("track session {0} is currently being recorded")]
    SessionActive(SessionId),

    /// A location sample is outside the valid coordinate range.
    #[error("invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate {
        /// Rejected latitude in degrees.
        latitude: f64,
        /// Rejected longitude in degrees.
        longitude: f64,
    },

    // === Tracking Errors ===
    /// Start was requested while a session is being recorded.
    #[error("tracking is already active for session {0}")]
    AlreadyTracking(SessionId),

    /// A location source failed to start.
    #[error("failed to start location source '{name}': {message}")]
    LocationSourceStart {
        /// Name of the location source.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Platform Errors ===
    /// Location permission is not granted.
    #[error("missing permission: {permission}. {instructions}")]
    PermissionMissing {
        /// Name of the required permission.
        permission: String,
        /// Instructions for granting the permission.
        instructions: String,
    },

    // === I/O Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for georun operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a permission missing error with instructions.
    #[must_use]
    pub fn permission_missing(
        permission: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self::PermissionMissing {
            permission: permission.into(),
            instructions: instructions.into(),
        }
    }

    /// Create a location source start error.
    #[must_use]
    pub fn location_source_start(name: &'static str, message: impl Into<String>) -> Self {
        Self::LocationSourceStart {
            name,
            message: message.into(),
        }
    }

    /// Check if this error is a permission issue.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionMissing { .. })
    }

    /// Check if this error means the requested session does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_))
    }
}
