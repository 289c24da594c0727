//! Compiles nested configuration sections into storages and databases.
//!
//! A configuration declares databases, each over one storage:
//!
//! ```text
//! <zodb>
//!   <filestorage>
//!     path /var/data/Data.fs
//!     read-only true
//!   </filestorage>
//! </zodb>
//!
//! <zodb scratch>
//!   cache-size 1000
//!   <demostorage>
//!     <mappingstorage/>
//!   </demostorage>
//! </zodb>
//! ```
//!
//! Compilation runs in two phases. The text is parsed and checked against
//! the [`BuilderRegistry`] first, so malformed nesting, unknown section types
//! and duplicate section names fail as [`ConfigError::Syntax`] before anything
//! is built. Sections are then built children-first; option values are
//! coerced against each builder's [`OptionSchema`] and bad values fail as
//! [`ConfigError::Value`]. Every database of one compilation shares one
//! [`DatabaseRegistry`](dbtopo_core_store::DatabaseRegistry) so any of them
//! can find a sibling by its `database-name`.
//!
//! # Example
//!
//! ```rust
//! use dbtopo_config::Compiler;
//!
//! let topology = Compiler::new()
//!     .compile(
//!         "<zodb>\n<mappingstorage/>\n</zodb>\n\
//!          <zodb other>\ndatabase-name Other\n<mappingstorage/>\n</zodb>\n",
//!     )
//!     .unwrap();
//!
//! assert_eq!(topology.registry().names(), vec!["", "Other"]);
//! let main = topology.primary().unwrap();
//! assert!(main.databases().get("Other").is_some());
//! ```

pub mod builder;
pub mod builtins;
pub mod compiler;
pub mod error;
pub mod parser;
pub mod schema;
pub mod section;

pub use builder::{
    default_registry, BuildContext, BuilderRegistry, Built, ChildShape, SectionBuilder,
    SectionKind,
};
pub use compiler::{
    database_from_file, database_from_str, storage_from_file, storage_from_str, Compiler,
    Topology,
};
pub use error::{ConfigError, Result};
pub use parser::parse;
pub use schema::{Coercion, OptionSchema, OptionSpec, OptionValue, Options};
pub use section::{OptionLine, Section};
