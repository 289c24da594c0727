//! The Storage trait implemented by every backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{Result, Value};

/// A batch of records written together by one commit.
pub type Records = BTreeMap<String, Value>;

/// A shared, type-erased storage handle.
pub type StorageRef = Arc<dyn Storage>;

/// Keyed record storage.
///
/// Storages are shared between a database and its connections, so every
/// operation takes `&self`; implementations use interior mutability.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn Storage>`.
pub trait Storage: Send + Sync {
    /// Human-readable name of this storage.
    fn name(&self) -> &str;

    /// Whether writes are refused.
    fn is_read_only(&self) -> bool;

    /// Load the record stored under `key`.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No record is stored under the key.
    /// * `Ok(Some(value))` - The stored record.
    /// * `Err(Error)` - The storage is closed or could not be read.
    fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Store a batch of records atomically from the caller's point of view.
    ///
    /// Read-only storages fail with [`Error::ReadOnly`](crate::Error::ReadOnly).
    fn store(&self, records: Records) -> Result<()>;

    /// All keys currently stored, sorted.
    fn keys(&self) -> Result<Vec<String>>;

    /// Release resources. Further use fails with `Error::Closed`.
    fn close(&self) -> Result<()>;

    /// Remove any files the storage created. Used by tests and demos.
    fn cleanup(&self) -> Result<()> {
        Ok(())
    }

    /// Describe the storage as a JSON tree (type, options, wrapped storages).
    fn describe(&self) -> Value;
}
