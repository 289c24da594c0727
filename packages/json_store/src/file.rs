//! File-backed storage: all records in one JSON document on disk.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::{fs, io};

use serde::{Deserialize, Serialize};
use serde_json::json;

use dbtopo_core_store::{Error, Records, Result, Storage, Value};

/// Default permission bits for a blob directory.
pub const DEFAULT_BLOB_DIR_PERMISSIONS: u32 = 0o700;

/// Options of a file storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct FileStorageConfig {
    pub path: PathBuf,
    /// Start from an empty file, discarding existing contents.
    pub create: bool,
    pub read_only: bool,
    /// Maximum size of the data file in bytes.
    pub quota: Option<u64>,
    pub blob_dir: Option<PathBuf>,
    pub blob_dir_permissions: u32,
    pub pack_gc: bool,
    pub pack_keep_old: bool,
}

impl FileStorageConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create: false,
            read_only: false,
            quota: None,
            blob_dir: None,
            blob_dir_permissions: DEFAULT_BLOB_DIR_PERMISSIONS,
            pack_gc: true,
            pack_keep_old: true,
        }
    }
}

/// A storage persisting its records as a JSON object in a single file.
///
/// Every commit rewrites the file through a temporary sibling which is then
/// renamed over the original.
pub struct FileStorage {
    name: String,
    config: FileStorageConfig,
    records: RwLock<Option<Records>>,
}

impl FileStorage {
    /// Open (or create) the data file described by `config`.
    ///
    /// A missing file is created unless the storage is read-only, in which
    /// case opening fails with [`Error::ReadOnly`].
    pub fn open(config: FileStorageConfig) -> Result<Self> {
        let name = config.path.display().to_string();
        let exists = config.path.exists();

        let records = if config.read_only {
            if !exists {
                return Err(Error::ReadOnly { storage: name });
            }
            Self::read_records(&name, &config.path)?
        } else if config.create || !exists {
            log::debug!("Creating {}...", config.path.display());
            Self::write_records(&config.path, &Records::new())?;
            Records::new()
        } else {
            Self::read_records(&name, &config.path)?
        };

        Ok(Self {
            name,
            config,
            records: RwLock::new(Some(records)),
        })
    }

    pub fn config(&self) -> &FileStorageConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn blob_dir(&self) -> Option<&Path> {
        self.config.blob_dir.as_deref()
    }

    fn read_records(name: &str, path: &Path) -> Result<Records> {
        log::debug!("Reading {}...", path.display());
        let bytes = fs::read(path)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Records::new());
        }
        let value: Value = serde_json::from_slice(&bytes)?;
        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(Error::Corrupt {
                storage: name.to_string(),
                message: format!("expected a JSON object, found {}", other),
            }),
        }
    }

    fn encode(records: &Records) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(records)?)
    }

    fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = Self::tmp_path(path);
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn write_records(path: &Path, records: &Records) -> Result<()> {
        Self::write_bytes(path, &Self::encode(records)?)
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn closed(&self) -> Error {
        Error::Closed {
            storage: self.name.clone(),
        }
    }
}

fn remove_if_present(result: io::Result<()>) -> Result<()> {
    match result {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

impl Storage for FileStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    fn load(&self, key: &str) -> Result<Option<Value>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let records = records.as_ref().ok_or_else(|| self.closed())?;
        Ok(records.get(key).cloned())
    }

    fn store(&self, batch: Records) -> Result<()> {
        if self.config.read_only {
            return Err(Error::ReadOnly {
                storage: self.name.clone(),
            });
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let current = records.as_mut().ok_or_else(|| self.closed())?;

        let mut updated = current.clone();
        updated.extend(batch);
        let bytes = Self::encode(&updated)?;
        if let Some(quota) = self.config.quota {
            let size = bytes.len() as u64;
            if size > quota {
                return Err(Error::QuotaExceeded {
                    storage: self.name.clone(),
                    quota,
                    size,
                });
            }
        }

        log::debug!("Writing {}...", self.config.path.display());
        Self::write_bytes(&self.config.path, &bytes)?;
        *current = updated;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let records = records.as_ref().ok_or_else(|| self.closed())?;
        Ok(records.keys().cloned().collect())
    }

    fn close(&self) -> Result<()> {
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    /// Remove the data file and the blob directory.
    fn cleanup(&self) -> Result<()> {
        remove_if_present(fs::remove_file(&self.config.path))?;
        remove_if_present(fs::remove_file(Self::tmp_path(&self.config.path)))?;
        if let Some(blob_dir) = &self.config.blob_dir {
            remove_if_present(fs::remove_dir_all(blob_dir))?;
        }
        Ok(())
    }

    fn describe(&self) -> Value {
        let mut description = serde_json::to_value(&self.config).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut description {
            map.insert("type".to_string(), json!("filestorage"));
        }
        description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(key: &str, value: Value) -> Records {
        let mut records = Records::new();
        records.insert(key.to_string(), value);
        records
    }

    #[test]
    fn creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data.fs");

        let storage = FileStorage::open(FileStorageConfig::new(&path)).unwrap();
        assert!(path.exists());
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data.fs");

        let storage = FileStorage::open(FileStorageConfig::new(&path)).unwrap();
        storage.store(batch("test", json!(1))).unwrap();
        storage.close().unwrap();

        let reopened = FileStorage::open(FileStorageConfig::new(&path)).unwrap();
        assert_eq!(reopened.load("test").unwrap(), Some(json!(1)));
    }

    #[test]
    fn create_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data.fs");

        let storage = FileStorage::open(FileStorageConfig::new(&path)).unwrap();
        storage.store(batch("test", json!(1))).unwrap();

        let config = FileStorageConfig {
            create: true,
            ..FileStorageConfig::new(&path)
        };
        let recreated = FileStorage::open(config).unwrap();
        assert_eq!(recreated.load("test").unwrap(), None);
    }

    #[test]
    fn read_only_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.fs");
        let config = FileStorageConfig {
            read_only: true,
            ..FileStorageConfig::new(&path)
        };

        let err = FileStorage::open(config).err().unwrap();
        assert!(err.is_read_only());
        assert!(!path.exists());
    }

    #[test]
    fn read_only_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data.fs");
        FileStorage::open(FileStorageConfig::new(&path))
            .unwrap()
            .store(batch("kept", json!("yes")))
            .unwrap();

        let config = FileStorageConfig {
            read_only: true,
            ..FileStorageConfig::new(&path)
        };
        let storage = FileStorage::open(config).unwrap();
        assert!(storage.is_read_only());
        assert_eq!(storage.load("kept").unwrap(), Some(json!("yes")));
        assert!(storage.store(batch("a", json!(1))).unwrap_err().is_read_only());
    }

    #[test]
    fn quota_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileStorageConfig {
            quota: Some(16),
            ..FileStorageConfig::new(dir.path().join("Data.fs"))
        };
        let storage = FileStorage::open(config).unwrap();

        let err = storage
            .store(batch("big", json!("a string well past sixteen bytes")))
            .unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded { quota: 16, .. }));
        assert_eq!(storage.load("big").unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data.fs");
        fs::write(&path, b"[1, 2, 3]").unwrap();

        let err = FileStorage::open(FileStorageConfig::new(&path)).err().unwrap();
        assert!(matches!(err, Error::Corrupt { .. }));
    }

    #[test]
    fn empty_file_opens_empty() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let storage = FileStorage::open(FileStorageConfig::new(file.path())).unwrap();
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn cleanup_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data.fs");
        let blob_dir = dir.path().join("blobs");
        fs::create_dir(&blob_dir).unwrap();

        let config = FileStorageConfig {
            blob_dir: Some(blob_dir.clone()),
            ..FileStorageConfig::new(&path)
        };
        let storage = FileStorage::open(config).unwrap();
        storage.cleanup().unwrap();
        assert!(!path.exists());
        assert!(!blob_dir.exists());

        // nothing left to remove
        storage.cleanup().unwrap();
    }

    #[test]
    fn describe_reports_options() {
        let dir = tempfile::tempdir().unwrap();
        let storage =
            FileStorage::open(FileStorageConfig::new(dir.path().join("Data.fs"))).unwrap();
        let description = storage.describe();
        assert_eq!(description["type"], "filestorage");
        assert_eq!(description["read-only"], false);
        assert_eq!(description["blob-dir-permissions"], 0o700);
    }
}
