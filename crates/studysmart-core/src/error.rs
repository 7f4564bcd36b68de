//! Core error types for studysmart-core.
//!
//! Nothing in this crate treats an error as fatal: storage and session
//! errors are recovered where they occur and surfaced to the caller as
//! messages. Commands that have no effect in the current timer phase are
//! silent no-ops and never produce an error at all.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for studysmart-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Session commit errors
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Configuration-related errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A commit or command was issued while no timer core is live
    #[error("no active study session")]
    TimerInactive,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("database is locked")]
    Locked,

    /// Data directory could not be created or read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session commit errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Finish attempted before the minimum session duration was reached.
    /// The timer is reset to idle; nothing is persisted.
    #[error("single session can not be less than {min_secs} seconds (elapsed: {elapsed_secs})")]
    TooShort { elapsed_secs: u64, min_secs: u64 },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
