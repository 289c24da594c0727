//! Error types for the storage layer.

use std::io;

/// Errors raised by storages, databases and connections.
///
/// These are runtime failures of already-constructed objects. Configuration
/// problems (bad syntax, bad option values) belong to the config layer, which
/// wraps this type unchanged when a storage fails during construction.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A write was attempted on a storage opened read-only, or a read-only
    /// storage was asked to open data that does not exist yet.
    #[error("storage '{storage}' is read-only")]
    ReadOnly { storage: String },

    /// A database with the same name is already part of the shared registry.
    #[error("database_name '{name}' already in databases")]
    DuplicateDatabase { name: String },

    /// A storage was used after being closed.
    #[error("storage '{storage}' is closed")]
    Closed { storage: String },

    /// A write would grow a storage past its configured quota.
    #[error("storage '{storage}' quota of {quota} bytes exceeded ({size} bytes)")]
    QuotaExceeded {
        storage: String,
        quota: u64,
        size: u64,
    },

    /// The backing file of a storage has unexpected contents.
    #[error("storage '{storage}' is corrupt: {message}")]
    Corrupt { storage: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is a read-only violation.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Error::ReadOnly { .. })
    }
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;
