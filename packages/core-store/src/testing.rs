//! Test support: a minimal storage for exercising databases and connections.

use std::sync::{PoisonError, RwLock};

use serde_json::json;

use crate::{Error, Records, Result, Storage, Value};

/// A map-backed storage without any configuration surface.
pub struct MemoryStorage {
    name: String,
    read_only: bool,
    records: RwLock<Option<Records>>,
}

impl MemoryStorage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            read_only: false,
            records: RwLock::new(Some(Records::new())),
        }
    }

    pub fn read_only(name: &str) -> Self {
        Self {
            read_only: true,
            ..Self::new(name)
        }
    }

    fn closed(&self) -> Error {
        Error::Closed {
            storage: self.name.clone(),
        }
    }
}

impl Storage for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn load(&self, key: &str) -> Result<Option<Value>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let records = records.as_ref().ok_or_else(|| self.closed())?;
        Ok(records.get(key).cloned())
    }

    fn store(&self, batch: Records) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly {
                storage: self.name.clone(),
            });
        }
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
        json!({"type": "memory", "name": self.name})
    }
}
