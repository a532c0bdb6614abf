//! Observable events
//!
//! Every lifecycle transition of a database file, lock or session has a
//! typed event with a fixed severity.

use std::fmt;

use super::logger::Severity;

/// Observable events in multidb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Storage
    /// New database file written by create
    FileCreated,
    /// Atomic replace of the database file completed
    StorageWrite,
    /// Database file failed validation on read
    StorageCorruption,
    /// Temp file of an interrupted write deleted
    StaleTempRemoved,

    // Locking
    LockAcquired,
    LockReleased,
    /// A second read-write session was refused
    LockConflict,
    /// A lock file could not be removed on release
    LockReleaseFailed,
    /// A stale lock file was removed by an operator
    LockCleared,

    // Sessions
    SessionOpened,
    SessionClosed,
    /// Session closed or dropped with uncommitted writes
    PendingDiscarded,
    Rollback,

    // Queries
    QueryExecuted,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::FileCreated => "FILE_CREATED",
            Event::StorageWrite => "STORAGE_WRITE",
            Event::StorageCorruption => "STORAGE_CORRUPTION",
            Event::StaleTempRemoved => "STORAGE_TEMP_REMOVED",

            Event::LockAcquired => "LOCK_ACQUIRED",
            Event::LockReleased => "LOCK_RELEASED",
            Event::LockConflict => "LOCK_CONFLICT",
            Event::LockReleaseFailed => "LOCK_RELEASE_FAILED",
            Event::LockCleared => "LOCK_CLEARED",

            Event::SessionOpened => "SESSION_OPENED",
            Event::SessionClosed => "SESSION_CLOSED",
            Event::PendingDiscarded => "PENDING_DISCARDED",
            Event::Rollback => "ROLLBACK",

            Event::QueryExecuted => "QUERY_COMPLETE",
        }
    }

    /// Severity this event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QueryExecuted | Event::StorageWrite => Severity::Trace,
            Event::LockConflict
            | Event::LockCleared
            | Event::PendingDiscarded
            | Event::StaleTempRemoved => Severity::Warn,
            Event::LockReleaseFailed => Severity::Error,
            Event::StorageCorruption => Severity::Fatal,
            _ => Severity::Info,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
