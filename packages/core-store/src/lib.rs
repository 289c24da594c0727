//! Core dbtopo: storages, databases and the shared database registry.
//!
//! This layer defines what the configuration compiler produces:
//! - `Storage`: keyed record storage implemented by each backend
//! - `Database`: a named handle over one storage, with tunables
//! - `DatabaseRegistry`: the namespace shared by databases built together
//! - `Connection`: buffered reads and writes against a database
//!
//! Backends live in `dbtopo-json-store`; the compiler in `dbtopo-config`.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use dbtopo_core_store::{Database, DatabaseRegistry};
//!
//! fn sibling(db: &Arc<Database>, name: &str) -> Option<Arc<Database>> {
//!     db.databases().get(name)
//! }
//! ```

mod connection;
mod database;
mod error;
mod registry;
mod storage;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use connection::Connection;
pub use database::{Database, DatabaseConfig};
pub use error::{Error, Result};
pub use registry::DatabaseRegistry;
pub use storage::{Records, Storage, StorageRef};

/// Record values are JSON trees.
pub use serde_json::Value;
