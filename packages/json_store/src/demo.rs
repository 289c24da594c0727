//! DemoStorage: an in-memory layer of changes over a base storage.
//!
//! Reads fall through the changes to the base; writes never reach the base.
//! This makes a read-only or shared storage safe to experiment on.

use std::collections::BTreeSet;

use serde_json::json;

use dbtopo_core_store::{Records, Result, Storage, StorageRef, Value};

use crate::MappingStorage;

/// A writable overlay on top of another storage.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use dbtopo_core_store::{Records, Storage};
/// use dbtopo_json_store::{DemoStorage, MappingStorage};
///
/// let base = Arc::new(MappingStorage::new());
/// let demo = DemoStorage::new(None, base.clone());
///
/// let mut batch = Records::new();
/// batch.insert("scratch".to_string(), serde_json::json!(1));
/// demo.store(batch).unwrap();
///
/// assert!(demo.load("scratch").unwrap().is_some());
/// assert!(base.load("scratch").unwrap().is_none());
/// ```
pub struct DemoStorage {
    name: String,
    base: StorageRef,
    changes: MappingStorage,
}

impl DemoStorage {
    /// Wrap `base`. Without an explicit name the storage is called
    /// `DemoStorage(<base name>)`.
    pub fn new(name: Option<String>, base: StorageRef) -> Self {
        let name = name.unwrap_or_else(|| format!("DemoStorage({})", base.name()));
        let changes = MappingStorage::named(&format!("{} changes", name));
        Self {
            name,
            base,
            changes,
        }
    }

    pub fn base(&self) -> &StorageRef {
        &self.base
    }

    /// Keys written through this storage, not present in the base view.
    pub fn changed_keys(&self) -> Result<Vec<String>> {
        self.changes.keys()
    }
}

impl Storage for DemoStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn load(&self, key: &str) -> Result<Option<Value>> {
        match self.changes.load(key)? {
            Some(value) => Ok(Some(value)),
            None => self.base.load(key),
        }
    }

    fn store(&self, records: Records) -> Result<()> {
        self.changes.store(records)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: BTreeSet<String> = self.base.keys()?.into_iter().collect();
        keys.extend(self.changes.keys()?);
        Ok(keys.into_iter().collect())
    }

    fn close(&self) -> Result<()> {
        self.changes.close()?;
        self.base.close()
    }

    fn cleanup(&self) -> Result<()> {
        self.base.cleanup()
    }

    fn describe(&self) -> Value {
        json!({
            "type": "demostorage",
            "name": self.name,
            "base": self.base.describe(),
        })
    }
}
