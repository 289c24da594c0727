//! Database handles wrapping one storage.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::registry::DatabaseRegistry;
use crate::{Error, Result, StorageRef, Value};

/// Tunables for a database.
///
/// The cache and pool settings are hints recorded for the object cache of
/// client code; the database itself only enforces the pool size as a soft limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct DatabaseConfig {
    /// Name under which the database is registered.
    pub database_name: String,
    /// Whether implicit cross-database references are allowed.
    pub xrefs: bool,
    pub cache_size: i64,
    pub cache_size_bytes: u64,
    /// Soft limit on concurrently open connections.
    pub pool_size: usize,
    /// Seconds an idle pooled connection is kept, if limited.
    pub pool_timeout: Option<u64>,
    pub historical_pool_size: usize,
    pub historical_cache_size: i64,
    /// Seconds.
    pub historical_timeout: u64,
    pub large_record_size: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_name: String::new(),
            xrefs: true,
            cache_size: 5000,
            cache_size_bytes: 0,
            pool_size: 7,
            pool_timeout: None,
            historical_pool_size: 3,
            historical_cache_size: 1000,
            historical_timeout: 300,
            large_record_size: 16 << 20,
        }
    }
}

/// A named database over one storage.
///
/// Every database built by one compilation holds the same
/// [`DatabaseRegistry`], so any of them can reach its siblings by name:
///
/// ```ignore
/// use std::sync::Arc;
/// use dbtopo_core_store::{Database, DatabaseConfig, DatabaseRegistry};
///
/// let registry = Arc::new(DatabaseRegistry::new());
/// let storage = Arc::new(my_storage);
/// let db = Database::new(storage, DatabaseConfig::default(), &registry);
/// registry.register(Arc::clone(&db)).unwrap();
///
/// let found = db.databases().get("").unwrap();
/// assert!(Arc::ptr_eq(&found, &db));
/// ```
pub struct Database {
    storage: StorageRef,
    config: DatabaseConfig,
    databases: Arc<DatabaseRegistry>,
    open_connections: AtomicUsize,
    closed: AtomicBool,
}

impl Database {
    /// Create a database. It is not registered until passed to
    /// [`DatabaseRegistry::register`].
    pub fn new(
        storage: StorageRef,
        config: DatabaseConfig,
        databases: &Arc<DatabaseRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            storage,
            config,
            databases: Arc::clone(databases),
            open_connections: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.database_name
    }

    pub fn xrefs(&self) -> bool {
        self.config.xrefs
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageRef {
        &self.storage
    }

    /// The registry shared with every sibling database.
    pub fn databases(&self) -> &Arc<DatabaseRegistry> {
        &self.databases
    }

    /// Number of connections currently open.
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    /// Open a connection.
    pub fn open(self: &Arc<Self>) -> Result<Connection> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed {
                storage: self.storage.name().to_string(),
            });
        }
        let open = self.open_connections.fetch_add(1, Ordering::SeqCst) + 1;
        if open > self.config.pool_size {
            log::warn!(
                "database '{}' has {} open connections, exceeding pool-size {}",
                self.name(),
                open,
                self.config.pool_size
            );
        }
        Ok(Connection::new(Arc::clone(self)))
    }

    pub(crate) fn release_connection(&self) {
        self.open_connections.fetch_sub(1, Ordering::SeqCst);
    }

    /// Close the storage and leave the shared registry.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        log::debug!("Closing database '{}'...", self.name());
        self.databases.remove(self);
        self.storage.close()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Describe the database and its storage as JSON.
    pub fn describe(&self) -> Value {
        let mut description = serde_json::to_value(&self.config).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut description {
            map.insert("storage".to_string(), self.storage.describe());
        }
        description
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("database_name", &self.config.database_name)
            .field("storage", &self.storage.name())
            .field("xrefs", &self.config.xrefs)
            .finish()
    }
}
