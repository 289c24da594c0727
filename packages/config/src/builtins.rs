//! Built-in section types.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use dbtopo_core_store::{Database, DatabaseConfig, StorageRef};
use dbtopo_json_store::file::DEFAULT_BLOB_DIR_PERMISSIONS;
use dbtopo_json_store::mapping::DEFAULT_NAME;
use dbtopo_json_store::{DemoStorage, FileStorage, FileStorageConfig, MappingStorage};

use crate::builder::{BuildContext, BuilderRegistry, Built, ChildShape, SectionBuilder, SectionKind};
use crate::error::{ConfigError, Result};
use crate::schema::{Coercion, OptionSchema, Options};

pub(crate) fn register_defaults(registry: &mut BuilderRegistry) {
    registry.register("mappingstorage", Arc::new(MappingStorageBuilder::new()));
    registry.register("filestorage", Arc::new(FileStorageBuilder::new()));
    registry.register("demostorage", Arc::new(DemoStorageBuilder::new()));
    registry.register("zodb", Arc::new(DatabaseBuilder::new()));
}

/// The single nested storage of a wrapping section.
fn single_storage(children: Vec<Built>) -> Result<StorageRef> {
    let mut children = children.into_iter();
    match (children.next(), children.next()) {
        (Some(Built::Storage(storage)), None) => Ok(storage),
        _ => Err(ConfigError::value("expected exactly one nested storage section")),
    }
}

/// Create `path` and its parents, leaving it with exactly `mode`.
fn ensure_dir(path: &Path, mode: u32) -> io::Result<()> {
    log::debug!("Creating {} with mode {:o}...", path.display(), mode);
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    builder.create(path)?;

    // the umask applies at creation and an existing directory keeps its mode
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}

/// `<mappingstorage>`: records in memory.
pub struct MappingStorageBuilder {
    schema: OptionSchema,
}

impl MappingStorageBuilder {
    pub fn new() -> Self {
        Self {
            schema: OptionSchema::strict().optional("name", Coercion::String),
        }
    }
}

impl Default for MappingStorageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionBuilder for MappingStorageBuilder {
    fn kind(&self) -> SectionKind {
        SectionKind::Storage
    }

    fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    fn build(
        &self,
        _ctx: &BuildContext,
        name: Option<&str>,
        options: Options,
        _children: Vec<Built>,
    ) -> Result<Built> {
        let name = options.string("name").or(name).unwrap_or(DEFAULT_NAME);
        Ok(Built::Storage(Arc::new(MappingStorage::named(name))))
    }
}

/// `<filestorage>`: records in a JSON data file.
pub struct FileStorageBuilder {
    schema: OptionSchema,
}

impl FileStorageBuilder {
    pub fn new() -> Self {
        Self {
            schema: OptionSchema::strict()
                .required("path", Coercion::Path)
                .with_default("create", Coercion::Boolean, "false")
                .with_default("read-only", Coercion::Boolean, "false")
                .optional("quota", Coercion::ByteSize)
                .optional("blob-dir", Coercion::Path)
                .with_default("blob-dir-permissions", Coercion::Octal, "0700")
                .with_default("pack-gc", Coercion::Boolean, "true")
                .with_default("pack-keep-old", Coercion::Boolean, "true"),
        }
    }
}

impl Default for FileStorageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionBuilder for FileStorageBuilder {
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
        options: Options,
        _children: Vec<Built>,
    ) -> Result<Built> {
        let config = FileStorageConfig {
            create: options.boolean("create").unwrap_or(false),
            read_only: options.boolean("read-only").unwrap_or(false),
            quota: options.byte_size("quota"),
            blob_dir: options.path("blob-dir").map(Path::to_path_buf),
            blob_dir_permissions: options
                .octal("blob-dir-permissions")
                .unwrap_or(DEFAULT_BLOB_DIR_PERMISSIONS),
            pack_gc: options.boolean("pack-gc").unwrap_or(true),
            pack_keep_old: options.boolean("pack-keep-old").unwrap_or(true),
            ..FileStorageConfig::new(options.require_path("path")?)
        };

        if let Some(blob_dir) = &config.blob_dir {
            ensure_dir(blob_dir, config.blob_dir_permissions)
                .map_err(dbtopo_core_store::Error::from)?;
        }
        Ok(Built::Storage(Arc::new(FileStorage::open(config)?)))
    }
}

/// `<demostorage>`: a change layer over its one nested storage.
pub struct DemoStorageBuilder {
    schema: OptionSchema,
}

impl DemoStorageBuilder {
    pub fn new() -> Self {
        Self {
            schema: OptionSchema::strict().optional("name", Coercion::String),
        }
    }
}

impl Default for DemoStorageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionBuilder for DemoStorageBuilder {
    fn kind(&self) -> SectionKind {
        SectionKind::Storage
    }

    fn children(&self) -> ChildShape {
        ChildShape::ExactlyOne(SectionKind::Storage)
    }

    fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    fn build(
        &self,
        _ctx: &BuildContext,
        name: Option<&str>,
        options: Options,
        children: Vec<Built>,
    ) -> Result<Built> {
        let base = single_storage(children)?;
        let name = options.string("name").or(name).map(str::to_string);
        Ok(Built::Storage(Arc::new(DemoStorage::new(name, base))))
    }
}

/// `<zodb>`: a named database over its one nested storage.
pub struct DatabaseBuilder {
    schema: OptionSchema,
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        Self {
            schema: OptionSchema::strict()
                .optional("database-name", Coercion::String)
                .with_default("allow-implicit-cross-references", Coercion::Boolean, "true")
                .with_default("cache-size", Coercion::Integer, "5000")
                .with_default("cache-size-bytes", Coercion::ByteSize, "0")
                .with_default("pool-size", Coercion::Integer, "7")
                .optional("pool-timeout", Coercion::TimeInterval)
                .with_default("historical-pool-size", Coercion::Integer, "3")
                .with_default("historical-cache-size", Coercion::Integer, "1000")
                .with_default("historical-timeout", Coercion::TimeInterval, "300s")
                .with_default("large-record-size", Coercion::ByteSize, "16MB"),
        }
    }
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionBuilder for DatabaseBuilder {
    fn kind(&self) -> SectionKind {
        SectionKind::Database
    }

    fn children(&self) -> ChildShape {
        ChildShape::ExactlyOne(SectionKind::Storage)
    }

    fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    fn build(
        &self,
        ctx: &BuildContext,
        name: Option<&str>,
        options: Options,
        children: Vec<Built>,
    ) -> Result<Built> {
        let storage = single_storage(children)?;
        let defaults = DatabaseConfig::default();
        let config = DatabaseConfig {
            database_name: options
                .string("database-name")
                .or(name)
                .unwrap_or_default()
                .to_string(),
            xrefs: options
                .boolean("allow-implicit-cross-references")
                .unwrap_or(defaults.xrefs),
            cache_size: options.integer("cache-size").unwrap_or(defaults.cache_size),
            cache_size_bytes: options
                .byte_size("cache-size-bytes")
                .unwrap_or(defaults.cache_size_bytes),
            pool_size: options.count("pool-size")?.unwrap_or(defaults.pool_size),
            pool_timeout: options.seconds("pool-timeout"),
            historical_pool_size: options
                .count("historical-pool-size")?
                .unwrap_or(defaults.historical_pool_size),
            historical_cache_size: options
                .integer("historical-cache-size")
                .unwrap_or(defaults.historical_cache_size),
            historical_timeout: options
                .seconds("historical-timeout")
                .unwrap_or(defaults.historical_timeout),
            large_record_size: options
                .byte_size("large-record-size")
                .unwrap_or(defaults.large_record_size),
        };
        log::debug!(
            "Building database '{}' over {}",
            config.database_name,
            storage.name()
        );
        Ok(Built::Database(Database::new(
            storage,
            config,
            ctx.databases(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbtopo_core_store::DatabaseRegistry;

    use crate::section::{OptionLine, Section};

    fn section(type_name: &str, options: &[(&str, &str)]) -> Section {
        let mut section = Section::new(type_name, None, 1);
        for (key, value) in options {
            section.options.push(OptionLine {
                key: key.to_string(),
                value: value.to_string(),
                line: 2,
            });
        }
        section
    }

    fn build(
        builder: &dyn SectionBuilder,
        name: Option<&str>,
        section: &Section,
        children: Vec<Built>,
    ) -> Result<Built> {
        let ctx = BuildContext::new(Arc::new(DatabaseRegistry::new()));
        let options = builder.schema().coerce(section)?;
        builder.build(&ctx, name, options, children)
    }

    fn mapping() -> Built {
        Built::Storage(Arc::new(MappingStorage::new()))
    }

    #[test]
    fn mapping_storage_names() {
        let builder = MappingStorageBuilder::new();
        let plain = build(&builder, None, &section("mappingstorage", &[]), vec![]).unwrap();
        assert_eq!(plain.into_storage().unwrap().name(), "Mapping Storage");

        let named = build(&builder, Some("m"), &section("mappingstorage", &[]), vec![]).unwrap();
        assert_eq!(named.into_storage().unwrap().name(), "m");

        let option = build(
            &builder,
            Some("m"),
            &section("mappingstorage", &[("name", "Explicit")]),
            vec![],
        )
        .unwrap();
        assert_eq!(option.into_storage().unwrap().name(), "Explicit");
    }

    #[test]
    fn database_defaults() {
        let builder = DatabaseBuilder::new();
        let db = build(&builder, None, &section("zodb", &[]), vec![mapping()])
            .unwrap()
            .into_database()
            .unwrap();
        assert_eq!(db.name(), "");
        assert!(db.xrefs());
        assert_eq!(db.config(), &DatabaseConfig::default());
    }

    #[test]
    fn database_options() {
        let builder = DatabaseBuilder::new();
        let options = [
            ("database-name", "Bar"),
            ("allow-implicit-cross-references", "false"),
            ("cache-size", "1000"),
            ("cache-size-bytes", "1MB"),
            ("pool-size", "3"),
            ("pool-timeout", "10m"),
            ("historical-timeout", "1h"),
        ];
        let db = build(&builder, Some("foo"), &section("zodb", &options), vec![mapping()])
            .unwrap()
            .into_database()
            .unwrap();
        let config = db.config();
        assert_eq!(config.database_name, "Bar");
        assert!(!config.xrefs);
        assert_eq!(config.cache_size, 1000);
        assert_eq!(config.cache_size_bytes, 1 << 20);
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.pool_timeout, Some(600));
        assert_eq!(config.historical_timeout, 3600);
    }

    #[test]
    fn section_name_names_database() {
        let builder = DatabaseBuilder::new();
        let db = build(&builder, Some("foo"), &section("zodb", &[]), vec![mapping()])
            .unwrap()
            .into_database()
            .unwrap();
        assert_eq!(db.name(), "foo");
    }

    #[test]
    fn negative_pool_size_is_value_error() {
        let builder = DatabaseBuilder::new();
        let err = build(
            &builder,
            None,
            &section("zodb", &[("pool-size", "-2")]),
            vec![mapping()],
        )
        .unwrap_err();
        assert!(err.is_value());
    }

    #[test]
    fn demo_storage_wraps_child() {
        let builder = DemoStorageBuilder::new();
        let base = Built::Storage(Arc::new(MappingStorage::named("base")));
        let demo = build(&builder, None, &section("demostorage", &[]), vec![base])
            .unwrap()
            .into_storage()
            .unwrap();
        assert_eq!(demo.name(), "DemoStorage(base)");
    }

    #[test]
    fn single_storage_rejects_databases() {
        assert!(single_storage(vec![]).is_err());
        assert!(single_storage(vec![mapping(), mapping()]).is_err());
    }

    #[test]
    fn file_storage_requires_path() {
        let err = build(
            &FileStorageBuilder::new(),
            None,
            &section("filestorage", &[]),
            vec![],
        )
        .unwrap_err();
        assert!(err.is_value());
    }

    #[test]
    fn file_storage_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data.fs");
        let path_str = path.to_str().unwrap();
        let storage = build(
            &FileStorageBuilder::new(),
            None,
            &section("filestorage", &[("path", path_str), ("quota", "1KB")]),
            vec![],
        )
        .unwrap()
        .into_storage()
        .unwrap();

        let description = storage.describe();
        assert_eq!(description["quota"], 1024);
        assert_eq!(description["create"], false);
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn ensure_dir_sets_exact_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let blobs = dir.path().join("nested").join("blobs");
        ensure_dir(&blobs, 0o770).unwrap();
        let mode = fs::metadata(&blobs).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o770);

        // an existing directory is brought to the requested mode
        ensure_dir(&blobs, 0o700).unwrap();
        let mode = fs::metadata(&blobs).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o700);
    }
}
