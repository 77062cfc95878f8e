//! [`Database`] implementation over a single `tokio-rusqlite` connection.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::types::Value;
use seqmig_core::{Database, DatabaseError, Dialect, SqlValue, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};

/// A SQLite database handle.
///
/// Wraps one connection. A [`SqliteTransaction`] holds the connection
/// exclusively until it commits, rolls back or is dropped, so statements
/// issued through the database handle while a transaction is open wait for
/// it to finish.
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    /// Open a database and apply the configured pragmas.
    pub async fn open(config: &SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await?,
            DatabasePath::File(path) => Connection::open(path).await?,
        };

        let init_sql = config.init_sql();
        conn.call(move |conn| {
            conn.execute_batch(&init_sql)?;
            Ok(())
        })
        .await?;

        info!(path = %config.path, "SQLite database opened");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database with default settings.
    pub async fn open_in_memory() -> SqliteResult<Self> {
        Self::open(&SqliteConfig::memory()).await
    }

    /// Open a database from a URL such as `sqlite://app.db`.
    pub async fn connect(url: &str) -> SqliteResult<Self> {
        Self::open(&SqliteConfig::from_url(url)?).await
    }

    /// Wrap an already opened connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a closure against the raw connection.
    ///
    /// Waits for any open transaction to finish first.
    pub async fn call<R, F>(&self, f: F) -> SqliteResult<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, rusqlite::Error> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.lock().await;
        run(&conn, f).await
    }
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase").finish_non_exhaustive()
    }
}

async fn run<R, F>(conn: &Connection, f: F) -> SqliteResult<R>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, rusqlite::Error> + Send + 'static,
    R: Send + 'static,
{
    conn.call(move |conn| Ok(f(conn)?))
        .await
        .map_err(SqliteError::from)
}

fn to_values(params: &[SqlValue]) -> Vec<Value> {
    params
        .iter()
        .map(|p| match p {
            SqlValue::Int(v) => Value::Integer(*v),
            SqlValue::Text(v) => Value::Text(v.clone()),
        })
        .collect()
}

async fn execute(conn: &Connection, sql: &str, params: &[SqlValue]) -> SqliteResult<u64> {
    let sql = sql.to_string();
    let params = to_values(params);
    debug!(sql = %sql, "Executing statement");

    let affected = run(conn, move |conn| {
        conn.execute(&sql, rusqlite::params_from_iter(params.iter()))
    })
    .await?;
    Ok(affected as u64)
}

async fn execute_batch(conn: &Connection, sql: &str) -> SqliteResult<()> {
    let sql = sql.to_string();
    debug!(sql = %sql, "Executing batch");

    run(conn, move |conn| conn.execute_batch(&sql)).await
}

#[async_trait]
impl Database for SqliteDatabase {
    type Transaction = SqliteTransaction;

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError> {
        let conn = self.conn.lock().await;
        Ok(execute(&conn, sql, params).await?)
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().await;
        Ok(execute_batch(&conn, sql).await?)
    }

    async fn query_count(&self, sql: &str) -> Result<i64, DatabaseError> {
        let sql = sql.to_string();
        debug!(sql = %sql, "Executing count");

        Ok(self
            .call(move |conn| conn.query_row(&sql, [], |row| row.get::<_, i64>(0)))
            .await?)
    }

    async fn begin(&self) -> Result<SqliteTransaction, DatabaseError> {
        let conn = Arc::clone(&self.conn).lock_owned().await;
        execute_batch(&conn, "BEGIN IMMEDIATE").await?;

        Ok(SqliteTransaction { conn: Some(conn) })
    }
}

/// An open SQLite transaction.
///
/// Dropping it without calling [`commit`](Transaction::commit) or
/// [`rollback`](Transaction::rollback) schedules a rollback on the current
/// Tokio runtime. The connection stays locked until that rollback ran.
pub struct SqliteTransaction {
    conn: Option<OwnedMutexGuard<Connection>>,
}

impl SqliteTransaction {
    fn conn(&self) -> Result<&Connection, DatabaseError> {
        self.conn
            .as_deref()
            .ok_or_else(|| DatabaseError::connection("transaction already finished"))
    }

    async fn finish(mut self, statement: &'static str) -> Result<(), DatabaseError> {
        execute_batch(self.conn()?, statement).await?;
        self.conn = None;
        Ok(())
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError> {
        Ok(execute(self.conn()?, sql, params).await?)
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), DatabaseError> {
        Ok(execute_batch(self.conn()?, sql).await?)
    }

    async fn commit(self) -> Result<(), DatabaseError> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> Result<(), DatabaseError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Rolling back abandoned transaction");
                handle.spawn(async move {
                    if let Err(e) = execute_batch(&conn, "ROLLBACK").await {
                        warn!(error = %e, "Rollback of abandoned transaction failed");
                    }
                });
            }
            Err(_) => {
                warn!("Transaction dropped outside a Tokio runtime; connection left mid-transaction");
            }
        }
    }
}
