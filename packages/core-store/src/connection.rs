//! Connections: a view of one database with pending, uncommitted writes.

use std::sync::Arc;

use crate::{Database, Records, Result, Value};

/// A handle on a database's storage.
///
/// Writes are buffered until [`Connection::commit`]; reads see pending writes
/// first, then the storage.
pub struct Connection {
    database: Arc<Database>,
    pending: Records,
}

impl Connection {
    pub(crate) fn new(database: Arc<Database>) -> Self {
        Self {
            database,
            pending: Records::new(),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Read a record, preferring uncommitted writes.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        match self.pending.get(key) {
            Some(value) => Ok(Some(value.clone())),
            None => self.database.storage().load(key),
        }
    }

    /// Buffer a write until the next commit.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.pending.insert(key.into(), value);
    }

    /// A snapshot of the root mapping: committed records overlaid with
    /// pending ones.
    pub fn root(&self) -> Result<Records> {
        let storage = self.database.storage();
        let mut root = Records::new();
        for key in storage.keys()? {
            if let Some(value) = storage.load(&key)? {
                root.insert(key, value);
            }
        }
        root.extend(self.pending.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(root)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Write all pending records to the storage.
    ///
    /// On failure the pending records are kept, so the caller may
    /// [`abort`](Connection::abort) or retry.
    pub fn commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        log::debug!(
            "Committing {} record(s) to database '{}'...",
            self.pending.len(),
            self.database.name()
        );
        self.database.storage().store(self.pending.clone())?;
        self.pending.clear();
        Ok(())
    }

    /// Drop all pending records.
    pub fn abort(&mut self) {
        self.pending.clear();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.database.release_connection();
    }
}
