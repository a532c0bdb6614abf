//! Sessions
//!
//! A session is one open transaction on a database file:
//! an immutable snapshot loaded at open time, an overlay of pending writes,
//! and (in read-write mode) the file lock, held until close.
//!
//! ```text
//! Open ──get/set/delete/list/find──▶ Open
//! Open ──commit──▶ Open   (snapshot := merged, overlay cleared)
//! Open ──rollback──▶ Open (overlay cleared)
//! Open ──close/drop──▶ Closed (lock released; every further call fails)
//! ```
//!
//! A session is not meant to be shared across threads without external
//! serialization of whole read-modify-commit sequences.

mod merge;
mod overlay;

pub use merge::merge;
pub use overlay::{Overlay, PendingWrite};

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::crash_point::{maybe_crash, points};
use crate::errors::{DbError, DbResult, ValidationError};
use crate::lock::LockGuard;
use crate::observability::{log_event_with_fields, metrics, Event, ObservationScope};
use crate::query::{Predicate, QueryEvaluator};
use crate::storage::{StorageFile, StoredImage};
use crate::tree::{from_leaf, to_leaf, validate_value, Coordinate, Tree};

/// How a session may use its file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    ReadWrite,
    ReadOnly,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::ReadWrite => "read-write",
            AccessMode::ReadOnly => "read-only",
        }
    }

    pub fn is_read_only(&self) -> bool {
        *self == AccessMode::ReadOnly
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-write" | "rw" | "w" => Ok(AccessMode::ReadWrite),
            "read-only" | "ro" | "r" => Ok(AccessMode::ReadOnly),
            other => Err(format!(
                "unknown access mode {:?} (expected read-write or read-only)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    Closed,
}

/// One open transaction on a database file.
///
/// Obtained from [`crate::MultiDb::create`] or [`crate::MultiDb::open`].
pub struct Session {
    id: Uuid,
    storage: StorageFile,
    dimensions: usize,
    mode: AccessMode,
    snapshot: Tree,
    overlay: Overlay,
    lock: Option<LockGuard>,
    state: SessionState,
}

impl Session {
    pub(crate) fn new(
        id: Uuid,
        storage: StorageFile,
        image: StoredImage,
        mode: AccessMode,
        lock: Option<LockGuard>,
    ) -> Self {
        metrics().increment_sessions_opened();
        let session_id = id.to_string();
        let path = storage.path().display().to_string();
        log_event_with_fields(
            Event::SessionOpened,
            &[
                ("mode", mode.as_str()),
                ("path", path.as_str()),
                ("session_id", session_id.as_str()),
            ],
        );

        Self {
            id,
            storage,
            dimensions: image.dimensions,
            mode,
            snapshot: image.tree,
            overlay: Overlay::new(),
            lock,
            state: SessionState::Open,
        }
    }

    // ---- introspection ----

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.overlay.is_empty()
    }

    /// Number of coordinates with an uncommitted write
    pub fn pending_len(&self) -> usize {
        self.overlay.len()
    }

    // ---- reads ----

    /// Value at a full coordinate, `None` when absent.
    ///
    /// Pending writes win over the snapshot; a pending delete reads as absent.
    pub fn get(&self, coords: impl Into<Coordinate>) -> DbResult<Option<Value>> {
        self.ensure_open()?;
        let coordinate = coords.into();
        coordinate.validate_arity(self.dimensions)?;
        Ok(self.resolve(&coordinate).cloned())
    }

    /// [`Session::get`] decoded into `T`
    pub fn get_as<T: DeserializeOwned>(&self, coords: impl Into<Coordinate>) -> DbResult<Option<T>> {
        match self.get(coords)? {
            Some(value) => Ok(Some(from_leaf(value)?)),
            None => Ok(None),
        }
    }

    /// Deep copy of everything under `prefix`, `None` when nothing is there
    pub fn slice(&self, prefix: impl Into<Coordinate>) -> DbResult<Option<Value>> {
        self.ensure_open()?;
        let prefix = prefix.into();
        prefix.validate_prefix(self.dimensions)?;

        let view = merge::view(&self.snapshot, &self.overlay);
        if prefix.is_empty() {
            return Ok(Some(view.to_value()));
        }
        Ok(view.node(prefix.components()).map(|node| node.to_value()))
    }

    /// See [`QueryEvaluator::list`]
    pub fn list(
        &self,
        prefix: impl Into<Coordinate>,
        depth: Option<usize>,
    ) -> DbResult<Vec<Coordinate>> {
        self.ensure_open()?;
        let prefix = prefix.into();
        let view = merge::view(&self.snapshot, &self.overlay);
        Ok(QueryEvaluator::new(&view, self.dimensions).list(&prefix, depth)?)
    }

    /// See [`QueryEvaluator::find`]; values are copies
    pub fn find(
        &self,
        prefix: impl Into<Coordinate>,
        predicate: &Predicate,
    ) -> DbResult<Vec<(Coordinate, Value)>> {
        self.ensure_open()?;
        let prefix = prefix.into();
        let compiled = predicate.compile()?;
        let view = merge::view(&self.snapshot, &self.overlay);
        let found = QueryEvaluator::new(&view, self.dimensions).find(&prefix, &compiled)?;
        Ok(found
            .into_iter()
            .map(|(coordinate, value)| (coordinate, value.clone()))
            .collect())
    }

    // ---- writes ----

    /// Records a replacement value. Nothing reaches disk until commit.
    pub fn set(&mut self, coords: impl Into<Coordinate>, value: Value) -> DbResult<()> {
        self.ensure_open()?;
        let coordinate = coords.into();
        coordinate.validate_arity(self.dimensions)?;
        validate_value(&value)?;
        self.ensure_writable("set")?;

        self.overlay.put(coordinate, value);
        Ok(())
    }

    /// Alias of [`Session::set`]
    pub fn set_value(&mut self, coords: impl Into<Coordinate>, value: Value) -> DbResult<()> {
        self.set(coords, value)
    }

    /// [`Session::set`] for any serializable value
    pub fn set_as<T: Serialize + ?Sized>(
        &mut self,
        coords: impl Into<Coordinate>,
        value: &T,
    ) -> DbResult<()> {
        let value = to_leaf(value)?;
        self.set(coords, value)
    }

    /// Records a delete. Fails with `NotFound` if nothing is there.
    pub fn delete(&mut self, coords: impl Into<Coordinate>) -> DbResult<()> {
        self.ensure_open()?;
        let coordinate = coords.into();
        coordinate.validate_arity(self.dimensions)?;
        self.ensure_writable("delete")?;

        if self.resolve(&coordinate).is_none() {
            return Err(DbError::NotFound(coordinate));
        }
        self.overlay.tombstone(coordinate);
        Ok(())
    }

    /// Persists snapshot + overlay atomically.
    ///
    /// On failure the overlay is kept, so the commit can be retried, and the
    /// file stays at its last good state. A read-only commit does nothing.
    pub fn commit(&mut self) -> DbResult<()> {
        self.ensure_open()?;
        if self.mode.is_read_only() || self.overlay.is_empty() {
            return Ok(());
        }

        let session_id = self.id.to_string();
        let scope = ObservationScope::with_fields("COMMIT", &[("session_id", session_id.as_str())]);

        let merged = merge(&self.snapshot, &self.overlay);

        maybe_crash(points::COMMIT_BEFORE_WRITE);

        if let Err(e) = self.storage.write(self.dimensions, &merged) {
            metrics().increment_commit_failures();
            scope.fail(&e.to_string());
            return Err(e.into());
        }

        maybe_crash(points::COMMIT_AFTER_WRITE);

        let writes = self.overlay.len().to_string();
        self.snapshot = merged;
        self.overlay.clear();
        metrics().increment_commits();
        scope.complete_with_fields(&[("writes", writes.as_str())]);
        Ok(())
    }

    /// Discards every pending write. The snapshot is untouched.
    pub fn rollback(&mut self) -> DbResult<()> {
        self.ensure_open()?;
        let discarded = self.overlay.len().to_string();
        self.overlay.clear();

        metrics().increment_rollbacks();
        let session_id = self.id.to_string();
        log_event_with_fields(
            Event::Rollback,
            &[
                ("discarded", discarded.as_str()),
                ("session_id", session_id.as_str()),
            ],
        );
        Ok(())
    }

    /// Ends the session and releases its lock.
    ///
    /// Uncommitted writes are discarded. The session is closed even if the
    /// lock file cannot be removed; that failure is still reported.
    pub fn close(&mut self) -> DbResult<()> {
        self.ensure_open()?;
        self.state = SessionState::Closed;

        let session_id = self.id.to_string();
        if !self.overlay.is_empty() {
            let discarded = self.overlay.len().to_string();
            log_event_with_fields(
                Event::PendingDiscarded,
                &[
                    ("discarded", discarded.as_str()),
                    ("session_id", session_id.as_str()),
                ],
            );
            self.overlay.clear();
        }

        let released = match self.lock.take() {
            Some(mut guard) => guard.release(),
            None => Ok(()),
        };

        log_event_with_fields(Event::SessionClosed, &[("session_id", session_id.as_str())]);
        released.map_err(DbError::from)
    }

    // ---- internals ----

    fn ensure_open(&self) -> DbResult<()> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Closed => Err(DbError::SessionClosed),
        }
    }

    fn ensure_writable(&self, operation: &'static str) -> DbResult<()> {
        if self.mode.is_read_only() {
            return Err(DbError::read_only(operation));
        }
        Ok(())
    }

    /// Overlay first, then snapshot
    fn resolve(&self, coordinate: &Coordinate) -> Option<&Value> {
        match self.overlay.get(coordinate) {
            Some(PendingWrite::Put(value)) => Some(value),
            Some(PendingWrite::Tombstone) => None,
            None => self.snapshot.get(coordinate.components()),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("path", &self.storage.path())
            .field("dimensions", &self.dimensions)
            .field("mode", &self.mode)
            .field("pending", &self.overlay.len())
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.is_open() {
            // LockGuard's own drop logs a failed release
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;
    use tempfile::TempDir;

    fn session(dir: &TempDir, dimensions: usize, mode: AccessMode) -> Session {
        let storage = StorageFile::new(dir.path().join("db.json")).with_sync(false);
        if !storage.exists() {
            storage.create(dimensions, false).unwrap();
        }
        let image = storage.read().unwrap();
        Session::new(Uuid::new_v4(), storage, image, mode, None)
    }

    #[test]
    fn test_access_mode_parse_and_display() {
        assert_eq!("read-only".parse::<AccessMode>().unwrap(), AccessMode::ReadOnly);
        assert_eq!("rw".parse::<AccessMode>().unwrap(), AccessMode::ReadWrite);
        assert_eq!("w".parse::<AccessMode>().unwrap(), AccessMode::ReadWrite);
        assert_eq!("r".parse::<AccessMode>().unwrap(), AccessMode::ReadOnly);
        assert_eq!("ro".parse::<AccessMode>().unwrap(), AccessMode::ReadOnly);
        assert!("write".parse::<AccessMode>().is_err());
        assert_eq!(AccessMode::ReadWrite.to_string(), "read-write");
        assert_eq!(
            serde_json::to_value(AccessMode::ReadOnly).unwrap(),
            json!("read-only")
        );
    }

    #[test]
    fn test_get_reads_overlay_before_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, 2, AccessMode::ReadWrite);
        s.set(["a", "b"], json!(1)).unwrap();
        s.commit().unwrap();

        s.set(["a", "b"], json!(2)).unwrap();
        assert_eq!(s.get(["a", "b"]).unwrap(), Some(json!(2)));

        s.delete(["a", "b"]).unwrap();
        assert_eq!(s.get(["a", "b"]).unwrap(), None);
    }

    #[test]
    fn test_arity_is_validated() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, 2, AccessMode::ReadWrite);

        let err = s.set(["a"], json!(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(s.get(["a", "b", "c"]).is_err());
        assert!(s.delete(["a"]).is_err());
        assert!(!s.has_pending_changes());
    }

    #[test]
    fn test_too_deep_value_rejected() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, 1, AccessMode::ReadWrite);

        let mut deep = json!(0);
        for _ in 0..100 {
            deep = json!([deep]);
        }
        let err = s.set(["a"], deep).unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(ValidationError::ValueTooDeep { .. })
        ));
        assert_eq!(s.pending_len(), 0);
    }

    #[test]
    fn test_delete_absent_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, 2, AccessMode::ReadWrite);
        let err = s.delete(["x", "y"]).unwrap_err();
        assert!(err.is_not_found());
        assert!(!s.has_pending_changes());

        s.set(["x", "y"], json!(1)).unwrap();
        s.delete(["x", "y"]).unwrap();
        assert!(s.delete(["x", "y"]).unwrap_err().is_not_found());
    }

    #[test]
    fn test_rollback_discards_overlay() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, 2, AccessMode::ReadWrite);
        s.set(["a", "b"], json!("old")).unwrap();
        s.commit().unwrap();

        s.set(["a", "b"], json!("new")).unwrap();
        s.set(["c", "d"], json!(1)).unwrap();
        s.rollback().unwrap();

        assert_eq!(s.get(["a", "b"]).unwrap(), Some(json!("old")));
        assert_eq!(s.get(["c", "d"]).unwrap(), None);
        assert_eq!(s.pending_len(), 0);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, 2, AccessMode::ReadOnly);

        let err = s.set(["a", "b"], json!(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReadOnly);
        assert_eq!(s.delete(["a", "b"]).unwrap_err().kind(), ErrorKind::ReadOnly);
        assert!(s.commit().is_ok());
        assert!(s.rollback().is_ok());
    }

    #[test]
    fn test_queries_see_pending_writes() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, 2, AccessMode::ReadWrite);
        s.set(["k", "1"], json!({"customer_id": "c1"})).unwrap();
        s.set(["k", "2"], json!({"customer_id": "c2"})).unwrap();

        assert_eq!(s.list(Coordinate::root(), None).unwrap().len(), 2);
        let found = s
            .find(["k"], &Predicate::eq("customer_id", json!("c2")))
            .unwrap();
        assert_eq!(found, vec![(Coordinate::from(["k", "2"]), json!({"customer_id": "c2"}))]);
    }

    #[test]
    fn test_slice_is_a_copy() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, 2, AccessMode::ReadWrite);
        s.set(["u1", "a"], json!(1)).unwrap();
        s.set(["u1", "b"], json!(2)).unwrap();

        let mut slice = s.slice(["u1"]).unwrap().unwrap();
        assert_eq!(slice, json!({"a": 1, "b": 2}));
        slice["a"] = json!(100);
        assert_eq!(s.get(["u1", "a"]).unwrap(), Some(json!(1)));

        assert_eq!(s.slice(["nobody"]).unwrap(), None);
        assert_eq!(s.slice(Coordinate::root()).unwrap(), Some(json!({"u1": {"a": 1, "b": 2}})));
        assert!(s.slice(["a", "b", "c"]).is_err());
    }

    #[test]
    fn test_typed_helpers() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Order {
            sku: String,
            qty: u32,
        }

        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, 1, AccessMode::ReadWrite);
        let order = Order {
            sku: "A1".to_string(),
            qty: 3,
        };
        s.set_as(["o1"], &order).unwrap();
        assert_eq!(s.get_as::<Order>(["o1"]).unwrap(), Some(order));

        let err = s.get_as::<u32>(["o1"]).unwrap_err();
        assert!(matches!(err, DbError::Validation(ValidationError::Decode(_))));
    }

    #[test]
    fn test_closed_session_rejects_everything() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, 1, AccessMode::ReadWrite);
        s.set(["a"], json!(1)).unwrap();
        s.close().unwrap();

        assert!(!s.is_open());
        assert_eq!(s.get(["a"]).unwrap_err().kind(), ErrorKind::InvalidUse);
        assert!(matches!(s.commit(), Err(DbError::SessionClosed)));
        assert!(matches!(s.rollback(), Err(DbError::SessionClosed)));
        assert!(matches!(s.close(), Err(DbError::SessionClosed)));
    }

    #[test]
    fn test_commit_without_changes_does_not_write() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir, 1, AccessMode::ReadWrite);
        let before = std::fs::metadata(s.path()).unwrap().modified().unwrap();
        s.commit().unwrap();
        let after = std::fs::metadata(s.path()).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }
}
