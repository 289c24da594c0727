//! The builder registry: which section types exist and how each is built.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;

use dbtopo_core_store::{Database, DatabaseRegistry, StorageRef};

use crate::error::{ConfigError, Result};
use crate::schema::{OptionSchema, Options};
use crate::section::Section;

lazy_static! {
    static ref DEFAULT_REGISTRY: Arc<BuilderRegistry> = Arc::new(BuilderRegistry::with_defaults());
}

/// The process-wide registry holding the built-in section types.
pub fn default_registry() -> Arc<BuilderRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

/// What a section builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Storage,
    Database,
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionKind::Storage => write!(f, "storage"),
            SectionKind::Database => write!(f, "database"),
        }
    }
}

/// The nested sections a section type accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildShape {
    None,
    ExactlyOne(SectionKind),
}

/// The product of one builder.
#[derive(Clone)]
pub enum Built {
    Storage(StorageRef),
    Database(Arc<Database>),
}

impl Built {
    pub fn kind(&self) -> SectionKind {
        match self {
            Built::Storage(_) => SectionKind::Storage,
            Built::Database(_) => SectionKind::Database,
        }
    }

    pub fn into_storage(self) -> Option<StorageRef> {
        match self {
            Built::Storage(storage) => Some(storage),
            Built::Database(_) => None,
        }
    }

    pub fn into_database(self) -> Option<Arc<Database>> {
        match self {
            Built::Database(database) => Some(database),
            Built::Storage(_) => None,
        }
    }
}

impl fmt::Debug for Built {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Built::Storage(storage) => f.debug_tuple("Storage").field(&storage.name()).finish(),
            Built::Database(database) => f.debug_tuple("Database").field(database).finish(),
        }
    }
}

/// State shared by every builder of one compilation.
#[derive(Debug, Clone)]
pub struct BuildContext {
    databases: Arc<DatabaseRegistry>,
}

impl BuildContext {
    pub fn new(databases: Arc<DatabaseRegistry>) -> Self {
        Self { databases }
    }

    /// The registry every database of this compilation shares.
    pub fn databases(&self) -> &Arc<DatabaseRegistry> {
        &self.databases
    }
}

/// Builds one section type.
///
/// Children are built before their parent and arrive in source order.
/// Options have already been coerced against [`SectionBuilder::schema`].
pub trait SectionBuilder: Send + Sync {
    fn kind(&self) -> SectionKind;

    fn children(&self) -> ChildShape {
        ChildShape::None
    }

    fn schema(&self) -> &OptionSchema;

    fn build(
        &self,
        ctx: &BuildContext,
        name: Option<&str>,
        options: Options,
        children: Vec<Built>,
    ) -> Result<Built>;
}

/// Section type names mapped to their builders.
#[derive(Clone, Default)]
pub struct BuilderRegistry {
    builders: BTreeMap<String, Arc<dyn SectionBuilder>>,
}

impl BuilderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `mappingstorage`, `filestorage`, `demostorage` and `zodb`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::builtins::register_defaults(&mut registry);
        registry
    }

    /// Register `builder` for `type_name`, returning the builder it replaces.
    ///
    /// Type names are case-insensitive.
    pub fn register(
        &mut self,
        type_name: &str,
        builder: Arc<dyn SectionBuilder>,
    ) -> Option<Arc<dyn SectionBuilder>> {
        self.builders.insert(type_name.to_lowercase(), builder)
    }

    pub fn lookup(&self, type_name: &str) -> Option<&Arc<dyn SectionBuilder>> {
        self.builders.get(&type_name.to_lowercase())
    }

    /// The builder for `section`, or a syntax error at its line.
    pub fn resolve(&self, section: &Section) -> Result<&Arc<dyn SectionBuilder>> {
        self.lookup(&section.type_name).ok_or_else(|| {
            ConfigError::syntax(
                format!("unknown type name: '{}'", section.type_name),
                section.line,
            )
        })
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderRegistry")
            .field("types", &self.types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbtopo_json_store::MappingStorage;

    struct Scratch {
        schema: OptionSchema,
    }

    impl SectionBuilder for Scratch {
        fn kind(&self) -> SectionKind {
            SectionKind::Storage
        }

        fn schema(&self) -> &OptionSchema {
            &self.schema
        }

        fn build(
            &self,
            _ctx: &BuildContext,
            _name: Option<&str>,
            _options: Options,
            _children: Vec<Built>,
        ) -> Result<Built> {
            Ok(Built::Storage(Arc::new(MappingStorage::named("scratch"))))
        }
    }

    #[test]
    fn defaults_are_registered() {
        let registry = default_registry();
        assert_eq!(
            registry.types(),
            vec!["demostorage", "filestorage", "mappingstorage", "zodb"]
        );
        assert_eq!(
            registry.lookup("zodb").unwrap().kind(),
            SectionKind::Database
        );
        assert_eq!(
            registry.lookup("demostorage").unwrap().children(),
            ChildShape::ExactlyOne(SectionKind::Storage)
        );
    }

    #[test]
    fn lookup_ignores_case() {
        let registry = BuilderRegistry::with_defaults();
        assert!(registry.lookup("MappingStorage").is_some());
    }

    #[test]
    fn unknown_type_is_syntax_error() {
        let registry = BuilderRegistry::new();
        let err = registry.resolve(&Section::new("nosuch", None, 4)).err().unwrap();
        assert!(err.is_syntax());
        assert_eq!(err.line(), Some(4));
        assert!(format!("{}", err).contains("'nosuch'"));
    }

    #[test]
    fn register_replaces() {
        let mut registry = BuilderRegistry::with_defaults();
        let previous = registry.register(
            "MappingStorage",
            Arc::new(Scratch {
                schema: OptionSchema::lenient(),
            }),
        );
        assert!(previous.is_some());
        assert_eq!(registry.types().len(), 4);

        let ctx = BuildContext::new(Arc::new(DatabaseRegistry::new()));
        let built = registry
            .lookup("mappingstorage")
            .unwrap()
            .build(&ctx, None, Options::default(), Vec::new())
            .unwrap();
        assert_eq!(built.kind(), SectionKind::Storage);
        assert_eq!(built.into_storage().unwrap().name(), "scratch");
    }
}
