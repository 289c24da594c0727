//! dbtopo: declarative database topologies.
//!
//! A configuration text declares databases, each over one storage; compiling
//! it yields the databases sharing one registry, so every database can reach
//! its siblings by name.
//!
//! ```rust
//! let db = dbtopo::database_from_str(
//!     "<zodb>\n  <demostorage>\n    <mappingstorage/>\n  </demostorage>\n</zodb>\n",
//! )
//! .unwrap();
//!
//! let mut conn = db.open().unwrap();
//! conn.set("answer", serde_json::json!(42));
//! conn.commit().unwrap();
//! assert_eq!(conn.get("answer").unwrap(), Some(serde_json::json!(42)));
//! ```

pub use dbtopo_config::{
    database_from_file, database_from_str, default_registry, parse, storage_from_file,
    storage_from_str, BuildContext, BuilderRegistry, Built, ChildShape, Coercion, Compiler,
    ConfigError, OptionSchema, OptionValue, Options, Section, SectionBuilder, SectionKind,
    Topology,
};
pub use dbtopo_core_store::{
    Connection, Database, DatabaseConfig, DatabaseRegistry, Error, Records, Storage, StorageRef,
    Value,
};
pub use dbtopo_json_store::{DemoStorage, FileStorage, FileStorageConfig, MappingStorage};
