//! Atomic single-file persistence
//!
//! Write sequence (strict order):
//!
//! 1. Serialize `{meta, data}` to a temp file beside the target
//! 2. fsync the temp file
//! 3. Rename temp → target (atomic replace on POSIX)
//! 4. fsync the parent directory so the rename itself is durable
//!
//! A crash before step 3 leaves the previous file intact; a crash after
//! leaves the new file intact. Readers never observe a torn file.
//! Steps 2 and 4 are skipped when sync is disabled.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::crash_point::{maybe_crash, points};
use crate::observability::{log_event_with_fields, Event};
use crate::tree::Tree;

use super::errors::{StorageError, StorageResult};
use super::format::{self, StoredImage};

const TEMP_SUFFIX: &str = ".tmp";

/// Handle on one database file path.
#[derive(Debug, Clone)]
pub struct StorageFile {
    path: PathBuf,
    sync: bool,
    pretty: bool,
}

impl StorageFile {
    /// Storage handle with fsync and pretty-printing enabled
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sync: true,
            pretty: true,
        }
    }

    /// Enable or disable fsync of the temp file and parent directory
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Enable or disable indented JSON output
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Directory that holds the database file (and its temp and lock files)
    pub fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Creates the parent directory if it is missing
    pub fn ensure_parent_dir(&self) -> StorageResult<()> {
        let parent = self.parent_dir();
        if !parent.exists() {
            fs::create_dir_all(&parent).map_err(|e| {
                StorageError::io_error(
                    format!("Failed to create directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// Reads and validates the file.
    ///
    /// A missing file is `MULTIDB_STORAGE_ABSENT`; anything unparsable or
    /// structurally invalid is `MULTIDB_STORAGE_CORRUPTION`.
    pub fn read(&self) -> StorageResult<StoredImage> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::absent(&self.path))
            }
            Err(e) => return Err(StorageError::io_error_at_path(&self.path, e)),
        };

        format::decode(&bytes).map_err(|e| {
            let path = self.path.display().to_string();
            log_event_with_fields(
                Event::StorageCorruption,
                &[("path", path.as_str()), ("reason", e.message())],
            );
            e
        })
    }

    /// Writes an empty tree.
    ///
    /// Refuses to replace any existing file unless `overwrite` is set.
    pub fn create(&self, dimensions: usize, overwrite: bool) -> StorageResult<()> {
        if !overwrite && self.exists() {
            return Err(StorageError::already_exists(&self.path));
        }
        self.ensure_parent_dir()?;
        self.write(dimensions, &Tree::new())
    }

    /// Atomically replaces the file with `{dimensions, tree}`
    pub fn write(&self, dimensions: usize, tree: &Tree) -> StorageResult<()> {
        self.stage(dimensions, tree)?.publish()
    }

    /// Writes the new image to a temp file without making it visible.
    ///
    /// The returned [`StagedWrite`] must be published to replace the target;
    /// dropping it removes the temp file instead.
    pub fn stage(&self, dimensions: usize, tree: &Tree) -> StorageResult<StagedWrite> {
        let bytes = format::encode(dimensions, tree, self.pretty)?;
        let temp_path = self.temp_path();

        maybe_crash(points::STORAGE_BEFORE_TEMP_WRITE);

        let staged = StagedWrite {
            target: self.path.clone(),
            temp: temp_path,
            dir: self.parent_dir(),
            sync: self.sync,
            published: false,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staged.temp)
            .map_err(|e| {
                StorageError::io_error(
                    format!("Failed to create temp file: {}", staged.temp.display()),
                    e,
                )
            })?;

        file.write_all(&bytes).map_err(|e| {
            StorageError::io_error(
                format!("Failed to write temp file: {}", staged.temp.display()),
                e,
            )
        })?;

        if self.sync {
            file.sync_all().map_err(|e| {
                StorageError::io_error(
                    format!("fsync failed for: {}", staged.temp.display()),
                    e,
                )
            })?;
        }

        maybe_crash(points::STORAGE_AFTER_TEMP_WRITE);

        Ok(staged)
    }

    /// Unique temp path in the target's directory: `.<name>.<uuid>.tmp`
    fn temp_path(&self) -> PathBuf {
        self.parent_dir().join(format!(
            "{}{}{}",
            self.temp_prefix(),
            Uuid::new_v4().simple(),
            TEMP_SUFFIX
        ))
    }

    fn temp_prefix(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "multidb".to_string());
        format!(".{}.", name)
    }

    /// Whether `file_name` is one of this file's temp files
    fn is_own_temp(&self, file_name: &str) -> bool {
        let prefix = self.temp_prefix();
        file_name
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_suffix(TEMP_SUFFIX))
            .map_or(false, |id| {
                id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit())
            })
    }

    /// Deletes temp files left by writes that never reached the rename,
    /// e.g. when the writing process was killed.
    ///
    /// Only call this while holding the write lock: a live writer's temp
    /// file looks exactly the same. Returns the number of files removed.
    pub fn remove_stale_temps(&self) -> StorageResult<usize> {
        let dir = self.parent_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::io_error_at_path(&dir, e)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io_error_at_path(&dir, e))?;
            let name = entry.file_name();
            if !self.is_own_temp(&name.to_string_lossy()) {
                continue;
            }
            let temp = entry.path();
            match fs::remove_file(&temp) {
                Ok(()) => {
                    removed += 1;
                    let display = temp.display().to_string();
                    log_event_with_fields(Event::StaleTempRemoved, &[("path", display.as_str())]);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::io_error_at_path(&temp, e)),
            }
        }
        Ok(removed)
    }
}

/// A fully written, synced temp file waiting to replace its target.
#[derive(Debug)]
pub struct StagedWrite {
    target: PathBuf,
    temp: PathBuf,
    dir: PathBuf,
    sync: bool,
    published: bool,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    pub fn target_path(&self) -> &Path {
        &self.target
    }

    /// Atomically replaces the target with the staged file.
    pub fn publish(mut self) -> StorageResult<()> {
        maybe_crash(points::STORAGE_BEFORE_RENAME);

        fs::rename(&self.temp, &self.target).map_err(|e| {
            StorageError::io_error(
                format!(
                    "Failed to replace {} with {}",
                    self.target.display(),
                    self.temp.display()
                ),
                e,
            )
        })?;
        self.published = true;

        maybe_crash(points::STORAGE_AFTER_RENAME);

        if self.sync {
            fsync_dir(&self.dir)?;
        }

        let target = self.target.display().to_string();
        log_event_with_fields(Event::StorageWrite, &[("path", target.as_str())]);

        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.published {
            // Best effort removal - we're already abandoning this write
            let _ = fs::remove_file(&self.temp);
        }
    }
}

/// fsync a directory so a rename inside it survives power loss.
#[cfg(unix)]
fn fsync_dir(path: &Path) -> StorageResult<()> {
    let dir = File::open(path).map_err(|e| StorageError::io_error_at_path(path, e))?;
    dir.sync_all().map_err(|e| {
        StorageError::io_error(format!("fsync directory failed: {}", path.display()), e)
    })
}

#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> StorageResult<()> {
    Ok(())
}
