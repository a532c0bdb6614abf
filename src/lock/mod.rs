//! Lock manager for multidb
//!
//! Serializes writers: at most one read-write session per database file.
//! Readers take no lock.
//!
//! The lock is an OS advisory lock (`flock` on Unix, `LockFileEx` on
//! Windows) on the sibling file `<db>.lock`. The operating system drops it
//! when the holding handle closes, including when the holder process dies,
//! so a crashed writer never keeps the database locked. The file body
//! records the holder's pid, session id and acquisition time for
//! diagnostics only; the file's existence means nothing by itself.
//!
//! # Rules
//!
//! - Acquisition never blocks or retries: a held lock fails immediately
//! - Release is idempotent and also runs on drop, on every exit path
//! - A lock file left by a crashed process is taken over by the next writer

mod errors;

pub use errors::{LockError, LockErrorCode, LockResult};

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::observability::{log_event_with_fields, metrics, Event};
use crate::session::AccessMode;

/// Contents of a lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub session_id: String,
    /// RFC3339 timestamp
    pub acquired_at: String,
}

/// Returns the lock file path for a database file
pub fn lock_path(db_path: &Path) -> PathBuf {
    let mut name = db_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    db_path.with_file_name(name)
}

/// Reads the last recorded holder, if the lock file has one.
///
/// The record may belong to a process that has since exited; use
/// [`is_locked`] to learn whether anyone holds the lock now.
pub fn read_holder(db_path: &Path) -> Option<LockInfo> {
    let contents = fs::read_to_string(lock_path(db_path)).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Whether a read-write session currently holds the lock
pub fn is_locked(db_path: &Path) -> LockResult<bool> {
    let path = lock_path(db_path);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(open_failed(&path, e)),
    };
    match file.try_lock() {
        Ok(()) => Ok(false),
        Err(TryLockError::WouldBlock) => Ok(true),
        Err(TryLockError::Error(e)) => Err(lock_failed(&path, e)),
    }
}

/// Removes a lock file nobody holds, e.g. one left by a crashed process.
///
/// Returns whether a file was removed. A lock that is held fails with
/// `MULTIDB_LOCK_HELD` and stays in place.
pub fn clear_stale_lock(db_path: &Path) -> LockResult<bool> {
    let path = lock_path(db_path);
    let file = match OpenOptions::new().read(true).write(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(open_failed(&path, e)),
    };
    match file.try_lock() {
        Ok(()) => {}
        Err(TryLockError::WouldBlock) => {
            return Err(LockError::held(&path, read_holder(db_path)))
        }
        Err(TryLockError::Error(e)) => return Err(lock_failed(&path, e)),
    }

    match fs::remove_file(&path) {
        Ok(()) => {
            let display = path.display().to_string();
            log_event_with_fields(Event::LockCleared, &[("lock_file", display.as_str())]);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(LockError::io_error(
            format!("Failed to remove lock file: {}", path.display()),
            e,
        )),
    }
}

/// Acquires locks for sessions.
pub struct LockManager;

impl LockManager {
    /// Acquires the lock required by `mode`.
    ///
    /// Read-write takes the exclusive lock and returns its guard; read-only
    /// needs none and returns `None`.
    pub fn acquire(
        db_path: &Path,
        mode: AccessMode,
        session_id: &str,
    ) -> LockResult<Option<LockGuard>> {
        match mode {
            AccessMode::ReadOnly => Ok(None),
            AccessMode::ReadWrite => Self::acquire_exclusive(db_path, session_id).map(Some),
        }
    }

    fn acquire_exclusive(db_path: &Path, session_id: &str) -> LockResult<LockGuard> {
        let path = lock_path(db_path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| open_failed(&path, e))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(Self::conflict(db_path, &path)),
            Err(TryLockError::Error(e)) => return Err(lock_failed(&path, e)),
        }

        // A releasing holder may have unlinked the file we opened; a lock on
        // an unlinked file excludes nobody.
        if !same_file(&file, &path) {
            return Err(Self::conflict(db_path, &path));
        }

        // From here on we own the lock; the guard gives it back on any failure
        let mut guard = LockGuard {
            path,
            file: Some(file),
            released: false,
        };

        let info = LockInfo {
            pid: std::process::id(),
            session_id: session_id.to_string(),
            acquired_at: Utc::now().to_rfc3339(),
        };
        guard.record(&info)?;

        let display = guard.path.display().to_string();
        log_event_with_fields(
            Event::LockAcquired,
            &[("session_id", session_id), ("lock_file", display.as_str())],
        );

        Ok(guard)
    }

    fn conflict(db_path: &Path, lock_file: &Path) -> LockError {
        metrics().increment_lock_conflicts();
        let display = lock_file.display().to_string();
        log_event_with_fields(Event::LockConflict, &[("lock_file", display.as_str())]);
        LockError::held(lock_file, read_holder(db_path))
    }
}

fn open_failed(path: &Path, e: io::Error) -> LockError {
    LockError::io_error(format!("Failed to open lock file: {}", path.display()), e)
}

fn lock_failed(path: &Path, e: io::Error) -> LockError {
    LockError::io_error(format!("Failed to lock: {}", path.display()), e)
}

/// Whether the open handle is still the file at `path`
#[cfg(unix)]
fn same_file(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(open), Ok(current)) => open.dev() == current.dev() && open.ino() == current.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(_file: &File, path: &Path) -> bool {
    path.exists()
}

/// Exclusive ownership of a database's write lock.
///
/// Released explicitly with [`LockGuard::release`] or on drop. If the
/// process dies first, the operating system releases it.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    file: Option<File>,
    released: bool,
}

impl LockGuard {
    pub fn lock_file(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Replaces the file body with `info`
    fn record(&mut self, info: &LockInfo) -> LockResult<()> {
        let body = serde_json::to_vec(info).map_err(|e| {
            LockError::io_error(
                "Failed to serialize lock info",
                io::Error::new(io::ErrorKind::InvalidData, e),
            )
        })?;
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        file.set_len(0)
            .and_then(|()| file.write_all(&body))
            .and_then(|()| file.flush())
            .map_err(|e| {
                LockError::io_error(
                    format!("Failed to write lock file: {}", self.path.display()),
                    e,
                )
            })
    }

    /// Removes the lock file and drops the OS lock. Calling it again is a
    /// no-op.
    ///
    /// The OS lock is dropped even when the file cannot be removed; that
    /// failure is still reported.
    pub fn release(&mut self) -> LockResult<()> {
        if self.released {
            return Ok(());
        }

        // Unlink while still locked, then close the handle
        let removed = match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::io_error(
                format!("Failed to remove lock file: {}", self.path.display()),
                e,
            )),
        };
        drop(self.file.take());
        self.released = true;

        let display = self.path.display().to_string();
        log_event_with_fields(Event::LockReleased, &[("lock_file", display.as_str())]);
        removed
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            let reason = e.to_string();
            log_event_with_fields(Event::LockReleaseFailed, &[("reason", reason.as_str())]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_is_sibling() {
        assert_eq!(
            lock_path(Path::new("/data/db.json")),
            PathBuf::from("/data/db.json.lock")
        );
        assert_eq!(lock_path(Path::new("db.json")), PathBuf::from("db.json.lock"));
    }

    #[test]
    fn test_read_only_takes_no_lock() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db.json");
        let guard = LockManager::acquire(&db, AccessMode::ReadOnly, "s1").unwrap();
        assert!(guard.is_none());
        assert!(!lock_path(&db).exists());
    }

    #[test]
    fn test_second_writer_fails_immediately() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db.json");

        let _first = LockManager::acquire(&db, AccessMode::ReadWrite, "s1").unwrap();
        let err = LockManager::acquire(&db, AccessMode::ReadWrite, "s2").unwrap_err();
        assert!(err.is_held());
        assert_eq!(err.holder().map(|h| h.session_id.as_str()), Some("s1"));
    }

    #[test]
    fn test_release_is_idempotent_and_frees_lock() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db.json");

        let mut guard = LockManager::acquire(&db, AccessMode::ReadWrite, "s1")
            .unwrap()
            .unwrap();
        guard.release().unwrap();
        guard.release().unwrap();
        assert!(guard.is_released());
        assert!(!is_locked(&db).unwrap());

        let again = LockManager::acquire(&db, AccessMode::ReadWrite, "s2").unwrap();
        assert!(again.is_some());
    }

    #[test]
    fn test_drop_releases_lock() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db.json");
        {
            let _guard = LockManager::acquire(&db, AccessMode::ReadWrite, "s1").unwrap();
            assert!(lock_path(&db).exists());
        }
        assert!(!lock_path(&db).exists());
    }

    #[test]
    fn test_holder_info_recorded() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db.json");
        let _guard = LockManager::acquire(&db, AccessMode::ReadWrite, "sess-9").unwrap();

        let holder = read_holder(&db).unwrap();
        assert_eq!(holder.pid, std::process::id());
        assert_eq!(holder.session_id, "sess-9");
        assert!(chrono::DateTime::parse_from_rfc3339(&holder.acquired_at).is_ok());
    }

    #[test]
    fn test_leftover_lock_file_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db.json");
        fs::write(
            lock_path(&db),
            br#"{"pid":999999,"session_id":"dead","acquired_at":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        assert!(!is_locked(&db).unwrap());
        let _guard = LockManager::acquire(&db, AccessMode::ReadWrite, "s1")
            .unwrap()
            .unwrap();
        assert!(is_locked(&db).unwrap());

        let holder = read_holder(&db).unwrap();
        assert_eq!(holder.session_id, "s1");
        assert_eq!(holder.pid, std::process::id());
    }

    #[test]
    fn test_clear_stale_lock() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db.json");
        fs::write(lock_path(&db), b"{}").unwrap();

        assert!(clear_stale_lock(&db).unwrap());
        assert!(!clear_stale_lock(&db).unwrap());
        assert!(!lock_path(&db).exists());
    }

    #[test]
    fn test_clear_refuses_held_lock() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db.json");
        let _guard = LockManager::acquire(&db, AccessMode::ReadWrite, "live").unwrap();

        let err = clear_stale_lock(&db).unwrap_err();
        assert!(err.is_held());
        assert!(lock_path(&db).exists());
        assert!(LockManager::acquire(&db, AccessMode::ReadWrite, "s2").is_err());
    }
}
