//! The compiler driver: parse, validate, build bottom-up, register.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use dbtopo_core_store::{Database, DatabaseRegistry, StorageRef};

use crate::builder::{
    default_registry, BuildContext, BuilderRegistry, Built, ChildShape, SectionKind,
};
use crate::error::{ConfigError, Result};
use crate::parser::parse;
use crate::section::Section;

/// Compiles configuration text into databases or a storage.
///
/// ```rust
/// use dbtopo_config::Compiler;
///
/// let topology = Compiler::new()
///     .compile("<zodb>\n  <mappingstorage/>\n</zodb>\n")
///     .unwrap();
/// let db = topology.primary().unwrap();
/// assert_eq!(db.name(), "");
/// assert!(db.xrefs());
/// ```
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Arc<BuilderRegistry>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// A compiler over the built-in section types.
    pub fn new() -> Self {
        Self::with_registry(default_registry())
    }

    pub fn with_registry(registry: Arc<BuilderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<BuilderRegistry> {
        &self.registry
    }

    /// Compile database sections.
    ///
    /// Every top-level section must build a database. Databases are built
    /// and registered in source order, all sharing one registry. On failure
    /// the databases built so far are closed; directories they created stay.
    pub fn compile(&self, text: &str) -> Result<Topology> {
        let sections = parse(text)?;
        for section in &sections {
            self.validate(section, SectionKind::Database)?;
        }

        let registry = Arc::new(DatabaseRegistry::new());
        let ctx = BuildContext::new(Arc::clone(&registry));
        let mut databases = Vec::with_capacity(sections.len());
        for section in &sections {
            if let Err(e) = self.build_database(&ctx, section, &mut databases) {
                let _ = registry.close_all();
                return Err(e);
            }
        }

        Ok(Topology {
            databases,
            registry,
        })
    }

    /// Compile a single storage section.
    pub fn compile_storage(&self, text: &str) -> Result<StorageRef> {
        let sections = parse(text)?;
        let section = match sections.as_slice() {
            [] => return Err(ConfigError::value("no storage section was configured")),
            [section] => section,
            [_, extra, ..] => {
                return Err(ConfigError::syntax(
                    "only one top-level storage section is allowed",
                    extra.line,
                ))
            }
        };
        self.validate(section, SectionKind::Storage)?;

        let ctx = BuildContext::new(Arc::new(DatabaseRegistry::new()));
        match self.build(&ctx, section)? {
            Built::Storage(storage) => Ok(storage),
            Built::Database(database) => {
                let _ = database.close();
                Err(ConfigError::value(format!(
                    "<{}> did not build a storage",
                    section.type_name
                )))
            }
        }
    }

    fn build_database(
        &self,
        ctx: &BuildContext,
        section: &Section,
        databases: &mut Vec<Arc<Database>>,
    ) -> Result<()> {
        let database = match self.build(ctx, section)? {
            Built::Database(database) => database,
            Built::Storage(storage) => {
                let _ = storage.close();
                return Err(ConfigError::value(format!(
                    "<{}> did not build a database",
                    section.type_name
                )));
            }
        };

        if let Err(e) = ctx.databases().register(Arc::clone(&database)) {
            let _ = database.close();
            return Err(match e {
                dbtopo_core_store::Error::DuplicateDatabase { .. } => {
                    ConfigError::value(e.to_string())
                }
                other => other.into(),
            });
        }
        databases.push(database);
        Ok(())
    }

    /// Check types and nesting before anything is built.
    fn validate(&self, section: &Section, expected: SectionKind) -> Result<()> {
        let builder = self.registry.resolve(section)?;
        if builder.kind() != expected {
            return Err(ConfigError::syntax(
                format!(
                    "<{}> builds a {} where a {} section is expected",
                    section.type_name,
                    builder.kind(),
                    expected
                ),
                section.line,
            ));
        }

        match builder.children() {
            ChildShape::None => {
                if let Some(child) = section.children.first() {
                    return Err(ConfigError::syntax(
                        format!(
                            "<{}> does not take nested sections, found <{}>",
                            section.type_name, child.type_name
                        ),
                        section.line,
                    ));
                }
            }
            ChildShape::ExactlyOne(kind) => {
                if section.children.len() != 1 {
                    return Err(ConfigError::syntax(
                        format!(
                            "<{}> requires exactly one nested {} section, found {}",
                            section.type_name,
                            kind,
                            section.children.len()
                        ),
                        section.line,
                    ));
                }
                self.validate(&section.children[0], kind)?;
            }
        }
        Ok(())
    }

    fn build(&self, ctx: &BuildContext, section: &Section) -> Result<Built> {
        let builder = self.registry.resolve(section)?;
        let children = section
            .children
            .iter()
            .map(|child| self.build(ctx, child))
            .collect::<Result<Vec<_>>>()?;
        let options = builder.schema().coerce(section)?;
        log::debug!("Building <{}> (line {})", section.type_name, section.line);
        builder.build(ctx, section.name.as_deref(), options, children)
    }
}

/// The databases of one compilation and their shared registry.
#[derive(Debug)]
pub struct Topology {
    databases: Vec<Arc<Database>>,
    registry: Arc<DatabaseRegistry>,
}

impl Topology {
    /// Databases in source order.
    pub fn databases(&self) -> &[Arc<Database>] {
        &self.databases
    }

    pub fn registry(&self) -> &Arc<DatabaseRegistry> {
        &self.registry
    }

    /// The first database declared.
    pub fn primary(&self) -> Option<&Arc<Database>> {
        self.databases.first()
    }

    pub fn into_primary(self) -> Option<Arc<Database>> {
        self.databases.into_iter().next()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Database>> {
        self.registry.get(name)
    }

    /// Close every database of the registry.
    pub fn close(&self) -> dbtopo_core_store::Result<()> {
        self.registry.close_all()
    }

    /// Describe every database, keyed by name.
    pub fn describe(&self) -> Value {
        let databases: Map<String, Value> = self
            .databases
            .iter()
            .map(|db| (db.name().to_string(), db.describe()))
            .collect();
        json!({ "databases": databases })
    }
}

/// Compile `text` and return its first database.
pub fn database_from_str(text: &str) -> Result<Arc<Database>> {
    Compiler::new()
        .compile(text)?
        .into_primary()
        .ok_or_else(|| ConfigError::value("no database section was configured"))
}

pub fn database_from_file(path: impl AsRef<Path>) -> Result<Arc<Database>> {
    database_from_str(&read_config(path.as_ref())?)
}

/// Compile `text` holding one storage section.
pub fn storage_from_str(text: &str) -> Result<StorageRef> {
    Compiler::new().compile_storage(text)
}

pub fn storage_from_file(path: impl AsRef<Path>) -> Result<StorageRef> {
    storage_from_str(&read_config(path.as_ref())?)
}

fn read_config(path: &Path) -> Result<String> {
    log::debug!("Reading configuration {}...", path.display());
    fs::read_to_string(path).map_err(|error| ConfigError::Io {
        path: path.to_path_buf(),
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_compiles_to_nothing() {
        let topology = Compiler::new().compile("# nothing here\n").unwrap();
        assert!(topology.primary().is_none());
        assert!(topology.registry().is_empty());
        assert!(database_from_str("").unwrap_err().is_value());
    }

    #[test]
    fn storage_at_top_level_is_syntax_error() {
        let err = Compiler::new().compile("<mappingstorage/>\n").unwrap_err();
        assert!(err.is_syntax());
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn database_inside_database_is_syntax_error() {
        let text = "<zodb>\n  <zodb>\n    <mappingstorage/>\n  </zodb>\n</zodb>\n";
        let err = Compiler::new().compile(text).unwrap_err();
        assert!(err.is_syntax());
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn missing_storage_is_syntax_error() {
        let err = Compiler::new().compile("<zodb>\n</zodb>\n").unwrap_err();
        assert!(err.is_syntax());
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn two_storages_is_syntax_error() {
        let text = "<zodb>\n<mappingstorage a/>\n<mappingstorage b/>\n</zodb>\n";
        let err = Compiler::new().compile(text).unwrap_err();
        assert!(err.is_syntax());
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn leaf_with_children_is_syntax_error() {
        let text = "<mappingstorage>\n  <mappingstorage/>\n</mappingstorage>\n";
        let err = Compiler::new().compile_storage(text).err().unwrap();
        assert!(err.is_syntax());
    }

    #[test]
    fn unknown_type_fails_before_building() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = dir.path().join("blobs");
        let text = format!(
            "<zodb a>\n  <filestorage>\n    path {}\n    blob-dir {}\n  </filestorage>\n</zodb>\n\
             <zodb b>\n  <nosuchstorage/>\n</zodb>\n",
            dir.path().join("Data.fs").display(),
            blobs.display()
        );
        let err = Compiler::new().compile(&text).unwrap_err();
        assert!(err.is_syntax());
        assert_eq!(err.line(), Some(8));
        assert!(!blobs.exists());
    }

    #[test]
    fn storage_compile_counts_sections() {
        assert!(Compiler::new().compile_storage("").err().unwrap().is_value());

        let err = Compiler::new()
            .compile_storage("<mappingstorage a/>\n<mappingstorage b/>\n")
            .err()
            .unwrap();
        assert!(err.is_syntax());
        assert_eq!(err.line(), Some(2));

        let err = Compiler::new()
            .compile_storage("<zodb>\n<mappingstorage/>\n</zodb>\n")
            .err()
            .unwrap();
        assert!(err.is_syntax());
    }

    #[test]
    fn bad_value_in_later_database_fails_compile() {
        let text = "<zodb a>\n<mappingstorage/>\n</zodb>\n\
                    <zodb b>\n<mappingstorage/>\ncache-size lots\n</zodb>\n";
        let err = Compiler::new().compile(text).unwrap_err();
        assert!(err.is_value());
    }

    #[test]
    fn describe_lists_databases() {
        let topology = Compiler::new()
            .compile("<zodb>\n<mappingstorage/>\n</zodb>\n<zodb x>\n<mappingstorage/>\n</zodb>\n")
            .unwrap();
        let description = topology.describe();
        assert_eq!(description["databases"][""]["storage"]["type"], "mappingstorage");
        assert_eq!(description["databases"]["x"]["database-name"], "x");
        topology.close().unwrap();
        assert!(topology.registry().is_empty());
    }

    #[test]
    fn missing_config_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = database_from_file(dir.path().join("absent.conf")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
