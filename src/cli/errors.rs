//! CLI-specific error types
//!
//! Database errors keep their own `MULTIDB_*` code so scripts can branch on
//! the same codes an embedding application sees.

use std::fmt;
use std::io;

use crate::errors::DbError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Unparsable coordinate, value or predicate argument
    InvalidArgument,
    /// stdout could not be written
    IoError,
    /// Error from the database itself
    Database(&'static str),
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "MULTIDB_CLI_INVALID_ARGUMENT",
            Self::IoError => "MULTIDB_CLI_IO_ERROR",
            Self::Database(code) => code,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<DbError> for CliError {
    fn from(e: DbError) -> Self {
        Self::new(CliErrorCode::Database(e.code()), e.to_string())
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Coordinate;

    #[test]
    fn test_database_code_passes_through() {
        let err = CliError::from(DbError::NotFound(Coordinate::from(["a"])));
        assert_eq!(err.code_str(), "MULTIDB_NOT_FOUND");
        assert!(err.message().contains("\"a\""));
    }

    #[test]
    fn test_display() {
        let err = CliError::invalid_argument("bad coordinate");
        assert_eq!(err.to_string(), "MULTIDB_CLI_INVALID_ARGUMENT: bad coordinate");
    }
}
