//! Lock error types
//!
//! Error codes:
//! - MULTIDB_LOCK_HELD (ERROR severity, retryable)
//! - MULTIDB_LOCK_IO (ERROR severity)

use std::fmt;
use std::io;
use std::path::Path;

use super::LockInfo;

/// Lock-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockErrorCode {
    /// Another read-write session holds the lock
    MultidbLockHeld,
    /// The lock file could not be created, read or removed
    MultidbLockIo,
}

impl LockErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            LockErrorCode::MultidbLockHeld => "MULTIDB_LOCK_HELD",
            LockErrorCode::MultidbLockIo => "MULTIDB_LOCK_IO",
        }
    }
}

impl fmt::Display for LockErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Lock error
#[derive(Debug)]
pub struct LockError {
    code: LockErrorCode,
    message: String,
    holder: Option<LockInfo>,
    source: Option<io::Error>,
}

impl LockError {
    /// The lock at `lock_path` is already held
    pub fn held(lock_path: &Path, holder: Option<LockInfo>) -> Self {
        let message = match &holder {
            Some(info) => format!(
                "Database is locked by session {} (pid {}, since {}); lock file: {}",
                info.session_id,
                info.pid,
                info.acquired_at,
                lock_path.display()
            ),
            None => format!("Database is locked; lock file: {}", lock_path.display()),
        };
        Self {
            code: LockErrorCode::MultidbLockHeld,
            message,
            holder,
            source: None,
        }
    }

    /// Lock file I/O failure
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: LockErrorCode::MultidbLockIo,
            message: message.into(),
            holder: None,
            source: Some(source),
        }
    }

    pub fn code(&self) -> LockErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Recorded owner of the lock, when it could be read
    pub fn holder(&self) -> Option<&LockInfo> {
        self.holder.as_ref()
    }

    pub fn is_held(&self) -> bool {
        self.code == LockErrorCode::MultidbLockHeld
    }
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ERROR] {}: {}", self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;
