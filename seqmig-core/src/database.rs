//! Database collaborator traits.
//!
//! The engine talks to the database only through [`Database`] and
//! [`Transaction`]. Driver crates implement both; the engine never sees the
//! underlying connection type.

use std::fmt;

use async_trait::async_trait;

use crate::error::DatabaseError;

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// 64-bit integer.
    Int(i64),
    /// Text.
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// SQL dialect spoken by a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// SQLite uses ?, ?, etc.
    #[default]
    Sqlite,
    /// PostgreSQL uses $1, $2, etc.
    Postgres,
    /// MySQL uses ?, ?, etc. and backtick identifiers.
    MySql,
}

impl Dialect {
    /// Get the parameter placeholder for a 1-based parameter index.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${}", index),
            Self::Sqlite | Self::MySql => "?".to_string(),
        }
    }

    /// Quote a single identifier segment.
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", name.replace('`', "``")),
            Self::Sqlite | Self::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Postgres => write!(f, "postgres"),
            Self::MySql => write!(f, "mysql"),
        }
    }
}

/// A database handle the migrator can run statements against.
///
/// Implementations must be cheap to share by reference; the engine holds
/// `&self` for the whole run and opens at most one transaction at a time.
/// Cancellation is whatever the implementation does when its futures are
/// dropped.
#[async_trait]
pub trait Database: Send + Sync {
    /// Transaction type returned by [`Database::begin`].
    type Transaction: Transaction;

    /// The SQL dialect used for bookkeeping statements.
    fn dialect(&self) -> Dialect;

    /// Execute a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError>;

    /// Execute one or more statements without parameters.
    async fn execute_batch(&self, sql: &str) -> Result<(), DatabaseError>;

    /// Run a query returning a single integer in the first column of the first row.
    async fn query_count(&self, sql: &str) -> Result<i64, DatabaseError>;

    /// Begin a transaction.
    async fn begin(&self) -> Result<Self::Transaction, DatabaseError>;
}

/// An open transaction.
///
/// The engine always finishes a transaction with [`commit`](Transaction::commit)
/// or [`rollback`](Transaction::rollback). Implementations should roll back
/// when dropped unfinished.
#[async_trait]
pub trait Transaction: Send {
    /// Execute a statement inside the transaction.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError>;

    /// Execute one or more statements inside the transaction.
    async fn execute_batch(&mut self, sql: &str) -> Result<(), DatabaseError>;

    /// Commit the transaction.
    async fn commit(self) -> Result<(), DatabaseError>;

    /// Roll back the transaction.
    async fn rollback(self) -> Result<(), DatabaseError>;
}
