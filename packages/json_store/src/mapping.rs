//! In-memory storage.

use std::sync::{PoisonError, RwLock};

use serde_json::json;

use dbtopo_core_store::{Error, Records, Result, Storage, Value};

/// Default name of a mapping storage.
pub const DEFAULT_NAME: &str = "Mapping Storage";

/// A storage keeping every record in a map.
///
/// Nothing survives the process. Closing drops the records.
///
/// # Example
///
/// ```rust
/// use dbtopo_json_store::MappingStorage;
/// use dbtopo_core_store::{Records, Storage};
///
/// let storage = MappingStorage::new();
/// let mut batch = Records::new();
/// batch.insert("name".to_string(), serde_json::json!("Alice"));
/// storage.store(batch).unwrap();
///
/// assert_eq!(storage.load("name").unwrap(), Some(serde_json::json!("Alice")));
/// ```
pub struct MappingStorage {
    name: String,
    records: RwLock<Option<Records>>,
}

impl MappingStorage {
    /// Create an empty storage with the default name.
    pub fn new() -> Self {
        Self::named(DEFAULT_NAME)
    }

    pub fn named(name: &str) -> Self {
        Self::with_records(name, Records::new())
    }

    /// Create a storage with initial records.
    pub fn with_records(name: &str, records: Records) -> Self {
        Self {
            name: name.to_string(),
            records: RwLock::new(Some(records)),
        }
    }

    fn closed(&self) -> Error {
        Error::Closed {
            storage: self.name.clone(),
        }
    }
}

impl Default for MappingStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MappingStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn load(&self, key: &str) -> Result<Option<Value>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let records = records.as_ref().ok_or_else(|| self.closed())?;
        Ok(records.get(key).cloned())
    }

    fn store(&self, batch: Records) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.as_mut().ok_or_else(|| self.closed())?.extend(batch);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let records = records.as_ref().ok_or_else(|| self.closed())?;
        Ok(records.keys().cloned().collect())
    }

    fn close(&self) -> Result<()> {
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn describe(&self) -> Value {
        json!({"type": "mappingstorage", "name": self.name})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(key: &str, value: Value) -> Records {
        let mut records = Records::new();
        records.insert(key.to_string(), value);
        records
    }

    #[test]
    fn basic_store_load() {
        let storage = MappingStorage::new();
        storage.store(batch("foo", json!("bar"))).unwrap();
        assert_eq!(storage.load("foo").unwrap(), Some(json!("bar")));
        assert_eq!(storage.name(), DEFAULT_NAME);
        assert!(!storage.is_read_only());
    }

    #[test]
    fn load_nonexistent_returns_none() {
        let storage = MappingStorage::new();
        assert_eq!(storage.load("nonexistent").unwrap(), None);
    }

    #[test]
    fn overwrite_works() {
        let storage = MappingStorage::named("scratch");
        storage.store(batch("value", json!("first"))).unwrap();
        storage.store(batch("value", json!("second"))).unwrap();
        assert_eq!(storage.load("value").unwrap(), Some(json!("second")));
        assert_eq!(storage.keys().unwrap(), vec!["value".to_string()]);
    }

    #[test]
    fn with_records_constructor() {
        let storage = MappingStorage::with_records("seeded", batch("key", json!({"a": [1, 2]})));
        assert_eq!(storage.load("key").unwrap(), Some(json!({"a": [1, 2]})));
    }

    #[test]
    fn closed_storage_refuses_access() {
        let storage = MappingStorage::new();
        storage.close().unwrap();
        assert!(matches!(storage.load("a"), Err(Error::Closed { .. })));
        assert!(matches!(
            storage.store(batch("a", json!(1))),
            Err(Error::Closed { .. })
        ));
    }
}
