//! Storage engines for dbtopo.
//!
//! - [`MappingStorage`]: records in memory
//! - [`FileStorage`]: records in a JSON file, optionally read-only or quota-bound
//! - [`DemoStorage`]: an in-memory change layer over any other storage

pub mod demo;
pub mod file;
pub mod mapping;

pub use demo::DemoStorage;
pub use file::{FileStorage, FileStorageConfig};
pub use mapping::MappingStorage;
