//! Public error taxonomy for multidb
//!
//! Every public operation returns [`DbResult`]. Subsystem errors
//! ([`StorageError`], [`LockError`]) are carried through unchanged so a
//! transport layer can map them by [`DbError::kind`] or [`DbError::code`]
//! without losing any distinction.
//!
//! | Kind | Code | Caller action |
//! |---|---|---|
//! | Validation | `MULTIDB_VALIDATION` | fix the request |
//! | Lock | `MULTIDB_LOCK_HELD` | retry later with backoff |
//! | ReadOnly | `MULTIDB_READ_ONLY` | reopen read-write |
//! | StorageCorruption | `MULTIDB_STORAGE_CORRUPTION` | repair or recreate the file |
//! | NotFound | `MULTIDB_NOT_FOUND` | expected outcome |

use thiserror::Error;

use crate::lock::{LockError, LockErrorCode};
use crate::storage::{StorageError, StorageErrorCode};
use crate::tree::Coordinate;

/// Caller-fixable input problems. Never retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Coordinate length differs from the store's dimensions
    #[error("expected {expected} coordinate components, got {actual}")]
    Arity { expected: usize, actual: usize },

    /// Prefix is longer than the store's dimensions
    #[error("prefix has {actual} components but the store has {dimensions} dimensions")]
    PrefixTooLong { dimensions: usize, actual: usize },

    /// `prefix.len() + depth` exceeds the store's dimensions
    #[error("depth {depth} below a prefix of {prefix_len} components exceeds {dimensions} dimensions")]
    Depth {
        dimensions: usize,
        prefix_len: usize,
        depth: usize,
    },

    /// Dimensions outside `1..=MAX_DIMENSIONS`
    #[error("dimensions must be between 1 and {max}, got {actual}")]
    Dimensions { max: usize, actual: usize },

    /// Leaf value nests deeper than the persisted format allows
    #[error("value nests deeper than {max} levels")]
    ValueTooDeep { max: usize },

    /// Value could not be turned into a JSON document
    #[error("value cannot be stored as a document: {0}")]
    Unrepresentable(String),

    /// Stored value could not be decoded into the requested type
    #[error("stored value does not match the requested type: {0}")]
    Decode(String),

    /// Predicate literal or pattern is unusable
    #[error("invalid predicate: {0}")]
    Predicate(String),
}

/// Taxonomy of error kinds, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Lock,
    ReadOnly,
    StorageCorruption,
    StorageAbsent,
    AlreadyExists,
    Io,
    NotFound,
    InvalidUse,
    Config,
}

/// Top-level error returned by the facade and sessions.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Lock(#[from] LockError),

    /// Mutation attempted on a read-only session
    #[error("session is read-only: {operation} is not permitted")]
    ReadOnly { operation: &'static str },

    #[error("{0}")]
    Storage(#[from] StorageError),

    /// Absent coordinate on delete
    #[error("coordinate not found: {0}")]
    NotFound(Coordinate),

    /// Any call on a session after `close()`
    #[error("session is closed")]
    SessionClosed,

    #[error("configuration error: {0}")]
    Config(String),
}

impl DbError {
    pub(crate) fn read_only(operation: &'static str) -> Self {
        DbError::ReadOnly { operation }
    }

    /// Returns the taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Validation(_) => ErrorKind::Validation,
            DbError::ReadOnly { .. } => ErrorKind::ReadOnly,
            DbError::NotFound(_) => ErrorKind::NotFound,
            DbError::SessionClosed => ErrorKind::InvalidUse,
            DbError::Config(_) => ErrorKind::Config,
            DbError::Lock(e) => match e.code() {
                LockErrorCode::MultidbLockHeld => ErrorKind::Lock,
                LockErrorCode::MultidbLockIo => ErrorKind::Io,
            },
            DbError::Storage(e) => match e.code() {
                StorageErrorCode::MultidbStorageCorruption => ErrorKind::StorageCorruption,
                StorageErrorCode::MultidbStorageAbsent => ErrorKind::StorageAbsent,
                StorageErrorCode::MultidbStorageExists => ErrorKind::AlreadyExists,
                StorageErrorCode::MultidbStorageIo => ErrorKind::Io,
            },
        }
    }

    /// Returns the stable code string for transport mapping
    pub fn code(&self) -> &'static str {
        match self {
            DbError::Validation(_) => "MULTIDB_VALIDATION",
            DbError::ReadOnly { .. } => "MULTIDB_READ_ONLY",
            DbError::NotFound(_) => "MULTIDB_NOT_FOUND",
            DbError::SessionClosed => "MULTIDB_SESSION_CLOSED",
            DbError::Config(_) => "MULTIDB_CONFIG",
            DbError::Lock(e) => e.code().code(),
            DbError::Storage(e) => e.code().code(),
        }
    }

    /// Lock contention and transient I/O may succeed on a later attempt.
    ///
    /// A held lock always belongs to a live writer; the OS drops it when that
    /// process exits.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Lock | ErrorKind::Io)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type for public operations
pub type DbResult<T> = Result<T, DbError>;
