//! Store error handling
//!
//! Typed errors for project store operations, shared by the local SQLite
//! store and the HTTP client.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::InvalidProjectId;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to create or open the database location
    #[error("Failed to open database at '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Request to the persistence service failed before a response arrived
    #[error("Persistence service request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Persistence service answered with a non-success status
    #[error("Persistence service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Persistence service URL could not be parsed or joined
    #[error("Invalid persistence service URL: {0}")]
    InvalidUrl(String),

    /// Stored payload or response body could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Project id rejected before reaching storage
    #[error(transparent)]
    InvalidId(#[from] InvalidProjectId),

    /// Stored row is unreadable
    #[error("Corrupt project record '{id}': {details}")]
    CorruptRecord { id: String, details: String },
}

impl StoreError {
    /// Whether the service reported the project as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Status { status: 404, .. })
    }

    /// Whether retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(e) => e.is_timeout() || e.is_connect(),
            StoreError::Status { status, .. } => *status >= 500,
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
