//! The shared namespace of databases built together.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::{Database, Error, Result};

/// Databases keyed by `database-name`.
///
/// One registry is shared by reference between every database of a
/// multi-database setup. Names are unique; the empty string is a valid name
/// and is the default.
///
/// Registered databases hold the registry in turn. [`Database::close`] and
/// [`DatabaseRegistry::close_all`] remove entries, which releases that cycle.
#[derive(Default)]
pub struct DatabaseRegistry {
    databases: RwLock<BTreeMap<String, Arc<Database>>>,
}

impl DatabaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a database under its own name.
    ///
    /// Fails with [`Error::DuplicateDatabase`] when the name is taken.
    pub fn register(&self, database: Arc<Database>) -> Result<()> {
        let mut databases = self
            .databases
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let name = database.name().to_string();
        if databases.contains_key(&name) {
            return Err(Error::DuplicateDatabase { name });
        }
        log::info!("Registered database '{}'", name);
        databases.insert(name, database);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Database>> {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove `database` if it is the one registered under its name.
    pub(crate) fn remove(&self, database: &Database) -> bool {
        let mut databases = self
            .databases
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let registered = databases
            .get(database.name())
            .is_some_and(|kept| std::ptr::eq(Arc::as_ptr(kept), database));
        if registered {
            databases.remove(database.name());
        }
        registered
    }

    /// Close every registered database, returning the first failure.
    ///
    /// All databases are closed even if one of them fails.
    pub fn close_all(&self) -> Result<()> {
        let databases: Vec<Arc<Database>> = self
            .databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut first_error = None;
        for database in databases {
            if let Err(e) = database.close() {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for DatabaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseRegistry")
            .field("names", &self.names())
            .finish()
    }
}
