//! Storage error types
//!
//! Error codes:
//! - MULTIDB_STORAGE_IO (ERROR severity)
//! - MULTIDB_STORAGE_ABSENT (ERROR severity)
//! - MULTIDB_STORAGE_EXISTS (ERROR severity)
//! - MULTIDB_STORAGE_CORRUPTION (FATAL severity for the affected file)

use std::fmt;
use std::io;
use std::path::Path;

/// Severity levels for storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the file stays usable
    Error,
    /// The file is unusable until repaired or recreated
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Disk I/O failure
    MultidbStorageIo,
    /// No file at the storage path
    MultidbStorageAbsent,
    /// A file already exists where a new one was requested
    MultidbStorageExists,
    /// File content fails parsing or structural validation
    MultidbStorageCorruption,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::MultidbStorageIo => "MULTIDB_STORAGE_IO",
            StorageErrorCode::MultidbStorageAbsent => "MULTIDB_STORAGE_ABSENT",
            StorageErrorCode::MultidbStorageExists => "MULTIDB_STORAGE_EXISTS",
            StorageErrorCode::MultidbStorageCorruption => "MULTIDB_STORAGE_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::MultidbStorageCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error with code, message, optional details and I/O source
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl StorageError {
    /// Disk I/O failure; `message` names the operation
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StorageErrorCode::MultidbStorageIo,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    pub fn io_error_at_path(path: &Path, source: io::Error) -> Self {
        Self {
            code: StorageErrorCode::MultidbStorageIo,
            message: format!("I/O error at path: {}", path.display()),
            details: None,
            source: Some(source),
        }
    }

    /// No file at `path`
    pub fn absent(path: &Path) -> Self {
        Self {
            code: StorageErrorCode::MultidbStorageAbsent,
            message: format!("Database file does not exist: {}", path.display()),
            details: None,
            source: None,
        }
    }

    /// Refusal to replace an existing file
    pub fn already_exists(path: &Path) -> Self {
        Self {
            code: StorageErrorCode::MultidbStorageExists,
            message: format!(
                "Database file already exists: {} (pass overwrite to replace it)",
                path.display()
            ),
            details: None,
            source: None,
        }
    }

    /// Content that fails to parse or validate
    pub fn corruption(reason: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::MultidbStorageCorruption,
            message: reason.into(),
            details: None,
            source: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Corruption leaves the file unusable until repaired
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn is_absent(&self) -> bool {
        self.code == StorageErrorCode::MultidbStorageAbsent
    }

    pub fn is_corruption(&self) -> bool {
        self.code == StorageErrorCode::MultidbStorageCorruption
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
