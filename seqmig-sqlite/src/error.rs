//! Error types for SQLite operations.

use std::fmt;

use rusqlite::ErrorCode;
use seqmig_core::DatabaseError;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Debug)]
pub enum SqliteError {
    /// SQLite driver error.
    Sqlite(tokio_rusqlite::Error),
    /// Configuration error.
    Config(String),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The underlying SQLite failure, if any.
    fn sqlite_failure(&self) -> Option<&rusqlite::ffi::Error> {
        match self {
            Self::Sqlite(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))) => {
                Some(e)
            }
            _ => None,
        }
    }

    /// Check if a primary key or unique constraint was violated.
    pub fn is_unique_violation(&self) -> bool {
        self.sqlite_failure().is_some_and(|e| {
            e.code == ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        })
    }

    /// Check if the database could not be reached.
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Sqlite(tokio_rusqlite::Error::ConnectionClosed) => true,
            _ => self.sqlite_failure().is_some_and(|e| {
                matches!(
                    e.code,
                    ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::SystemIoFailure
                )
            }),
        }
    }
}

impl fmt::Display for SqliteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "SQLite error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for SqliteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            Self::Config(_) => None,
        }
    }
}

impl From<tokio_rusqlite::Error> for SqliteError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        Self::Sqlite(err)
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(tokio_rusqlite::Error::Rusqlite(err))
    }
}

impl From<SqliteError> for DatabaseError {
    fn from(err: SqliteError) -> Self {
        let message = err.to_string();
        let classified = if err.is_unique_violation() {
            DatabaseError::unique_violation(message)
        } else if err.is_connection() {
            DatabaseError::connection(message)
        } else {
            DatabaseError::query(message)
        };
        classified.with_source(err)
    }
}
