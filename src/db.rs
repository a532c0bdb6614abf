//! Facade: create and open database files
//!
//! Every session starts here. The lock is acquired before the file is read
//! or created, so a read-write session never loads a snapshot another
//! writer could still replace. Holding it, a new writer also deletes temp
//! files left by a writer that died before its rename.

use std::path::Path;

use uuid::Uuid;

use crate::config::DbConfig;
use crate::errors::DbResult;
use crate::lock::LockManager;
use crate::observability::{log_event_with_fields, Event};
use crate::session::{AccessMode, Session};
use crate::storage::{StorageError, StoredImage};
use crate::tree::validate_dimensions;

/// Options for [`MultiDb::create_with`]
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Replace an existing file at the path
    pub overwrite: bool,
    pub config: DbConfig,
}

impl CreateOptions {
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn config(mut self, config: DbConfig) -> Self {
        self.config = config;
        self
    }
}

/// Entry points for embedding applications.
///
/// ```ignore
/// use multidb::{AccessMode, MultiDb};
/// use serde_json::json;
///
/// let mut session = MultiDb::create("sales.json", 3)?;
/// session.set(["u1", "2025", "01"], json!({"orders": 5}))?;
/// session.commit()?;
/// session.close()?;
///
/// let reader = MultiDb::open("sales.json", AccessMode::ReadOnly)?;
/// let months = reader.list(["u1"], Some(1))?;
/// ```
pub struct MultiDb;

impl MultiDb {
    /// Creates a new empty database and opens it read-write.
    ///
    /// Fails with `AlreadyExists` if anything is at `path`.
    pub fn create(path: impl AsRef<Path>, dimensions: usize) -> DbResult<Session> {
        Self::create_inner(path.as_ref(), dimensions, &CreateOptions::default())
    }

    /// [`MultiDb::create`] with explicit options; applies the config's log level
    pub fn create_with(
        path: impl AsRef<Path>,
        dimensions: usize,
        options: CreateOptions,
    ) -> DbResult<Session> {
        options.config.apply_log_level()?;
        Self::create_inner(path.as_ref(), dimensions, &options)
    }

    /// Opens an existing database.
    ///
    /// Read-write takes the exclusive lock and fails immediately if it is
    /// held. Read-only takes no lock and reads the file as it is now.
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> DbResult<Session> {
        Self::open_inner(path.as_ref(), mode, &DbConfig::default())
    }

    /// [`MultiDb::open`] with explicit options; applies the config's log level
    pub fn open_with(
        path: impl AsRef<Path>,
        mode: AccessMode,
        config: &DbConfig,
    ) -> DbResult<Session> {
        config.apply_log_level()?;
        Self::open_inner(path.as_ref(), mode, config)
    }

    fn create_inner(path: &Path, dimensions: usize, options: &CreateOptions) -> DbResult<Session> {
        validate_dimensions(dimensions)?;

        let storage = options.config.storage_for(path);
        if !options.overwrite && storage.exists() {
            return Err(StorageError::already_exists(path).into());
        }
        storage.ensure_parent_dir()?;

        let id = Uuid::new_v4();
        let lock = LockManager::acquire(path, AccessMode::ReadWrite, &id.to_string())?;

        storage.remove_stale_temps()?;
        storage.create(dimensions, options.overwrite)?;

        let display = path.display().to_string();
        let dims = dimensions.to_string();
        log_event_with_fields(
            Event::FileCreated,
            &[("dimensions", dims.as_str()), ("path", display.as_str())],
        );

        Ok(Session::new(
            id,
            storage,
            StoredImage::empty(dimensions),
            AccessMode::ReadWrite,
            lock,
        ))
    }

    fn open_inner(path: &Path, mode: AccessMode, config: &DbConfig) -> DbResult<Session> {
        let storage = config.storage_for(path);

        let id = Uuid::new_v4();
        let lock = LockManager::acquire(path, mode, &id.to_string())?;

        // Temp files of a crashed writer; only a lock holder may sweep them
        if lock.is_some() {
            storage.remove_stale_temps()?;
        }
        let image = storage.read()?;

        Ok(Session::new(id, storage, image, mode, lock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::lock::lock_path;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_create_rejects_bad_dimensions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");

        let err = MultiDb::create(&path, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(MultiDb::create(&path, 33).is_err());
        assert!(!path.exists());
        assert!(!lock_path(&path).exists());
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, b"not a database").unwrap();

        let err = MultiDb::create(&path, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&path).unwrap(), b"not a database");
    }

    #[test]
    fn test_create_with_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        {
            let mut s = MultiDb::create(&path, 1).unwrap();
            s.set(["a"], json!(1)).unwrap();
            s.commit().unwrap();
        }

        let s = MultiDb::create_with(&path, 2, CreateOptions::default().overwrite(true)).unwrap();
        assert_eq!(s.dimensions(), 2);
        assert!(s.list(["x"], None).unwrap().is_empty());
    }

    #[test]
    fn test_open_missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");

        let err = MultiDb::open(&path, AccessMode::ReadWrite).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageAbsent);
        assert!(!lock_path(&path).exists());

        let err = MultiDb::open(&path, AccessMode::ReadOnly).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageAbsent);
    }

    #[test]
    fn test_open_corrupt_file_releases_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, br#"{"meta": {"dimensions": 2}, "data": {"a": 5}}"#).unwrap();

        let err = MultiDb::open(&path, AccessMode::ReadWrite).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageCorruption);
        assert!(!lock_path(&path).exists());
    }

    #[test]
    fn test_created_session_holds_lock_until_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");

        let mut s = MultiDb::create(&path, 2).unwrap();
        assert!(lock_path(&path).exists());
        assert_eq!(
            MultiDb::open(&path, AccessMode::ReadWrite).unwrap_err().kind(),
            ErrorKind::Lock
        );

        s.close().unwrap();
        assert!(!lock_path(&path).exists());
        assert!(MultiDb::open(&path, AccessMode::ReadWrite).is_ok());
    }
}
