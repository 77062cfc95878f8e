//! Error types for PostgreSQL operations.

use seqmig_core::DatabaseError;
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// Connection pool error.
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A parameter value does not fit the type the server expects.
    #[error("cannot bind parameter {index}: {value} is out of range for {pg_type}")]
    OutOfRange {
        /// Zero-based parameter index.
        index: usize,
        /// The rejected value.
        value: i64,
        /// The PostgreSQL type of the parameter.
        pg_type: &'static str,
    },
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an out-of-range parameter error.
    pub fn out_of_range(index: usize, value: i64, pg_type: &'static str) -> Self {
        Self::OutOfRange {
            index,
            value,
            pg_type,
        }
    }

    /// The SQLSTATE reported by the server, if any.
    pub fn code(&self) -> Option<&SqlState> {
        match self {
            Self::Postgres(e) => e.code(),
            _ => None,
        }
    }

    /// Check if a primary key or unique constraint was violated.
    pub fn is_unique_violation(&self) -> bool {
        self.code() == Some(&SqlState::UNIQUE_VIOLATION)
    }

    /// Check if the server could not be reached or the connection was lost.
    ///
    /// Client-side failures such as parameter serialization or row decoding
    /// are not connection errors.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Pool(_) => true,
            Self::Postgres(e) => {
                e.is_closed()
                    || std::error::Error::source(e).is_some_and(|s| s.is::<std::io::Error>())
                    || e.code().is_some_and(|code| {
                        // class 08: connection exception, 57P0x: server shutting down
                        code.code().starts_with("08") || code.code().starts_with("57P0")
                    })
            }
            Self::Config(_) | Self::OutOfRange { .. } => false,
        }
    }
}

impl From<PgError> for DatabaseError {
    fn from(err: PgError) -> Self {
        let message = err.to_string();
        let classified = if err.is_unique_violation() {
            DatabaseError::unique_violation(message)
        } else if err.is_connection_error() {
            DatabaseError::connection(message)
        } else {
            DatabaseError::query(message)
        };
        classified.with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PgError::config("invalid URL");
        assert_eq!(err.to_string(), "configuration error: invalid URL");
        assert!(!err.is_connection_error());
        assert!(err.code().is_none());
    }

    #[test]
    fn test_pool_error_is_connection() {
        let err: DatabaseError = PgError::from(deadpool_postgres::PoolError::Closed).into();
        assert!(err.is_connection());
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn test_client_side_error_is_not_connection() {
        let err = "host=localhost port=not-a-port"
            .parse::<tokio_postgres::Config>()
            .unwrap_err();
        let err = PgError::from(err);
        assert!(!err.is_connection_error());
        assert!(!err.is_unique_violation());

        let err: DatabaseError = err.into();
        assert_eq!(err.kind(), seqmig_core::DatabaseErrorKind::Query);
    }

    #[test]
    fn test_out_of_range_error() {
        let err = PgError::out_of_range(0, 1 << 40, "integer");
        assert_eq!(
            err.to_string(),
            "cannot bind parameter 0: 1099511627776 is out of range for integer"
        );
        assert!(!err.is_connection_error());
    }

    #[tokio::test]
    async fn test_refused_connection_is_connection() {
        let mut config = tokio_postgres::Config::new();
        config
            .host("127.0.0.1")
            .port(1)
            .user("postgres")
            .connect_timeout(std::time::Duration::from_secs(2));

        let err = PgError::from(config.connect(tokio_postgres::NoTls).await.err().unwrap());
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_config_error_is_query() {
        let err: DatabaseError = PgError::config("bad").into();
        assert!(!err.is_connection());
        assert!(err.message().contains("bad"));
    }
}
