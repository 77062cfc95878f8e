//! [`Database`] implementation over a `deadpool-postgres` pool.

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use seqmig_core::{Database, DatabaseError, Dialect, SqlValue, Transaction};
use tokio_postgres::NoTls;
use tokio_postgres::types::{ToSql, Type};
use tracing::{debug, info, warn};

use crate::config::PgConfig;
use crate::error::{PgError, PgResult};

/// A PostgreSQL database handle.
///
/// Statements issued through the handle run on any pooled connection in
/// autocommit mode. A [`PgTransaction`] checks out one connection and keeps
/// it until it commits, rolls back or is dropped.
#[derive(Clone)]
pub struct PgDatabase {
    pool: Pool,
}

impl PgDatabase {
    /// Create a pool and check that the server is reachable.
    pub async fn connect(config: &PgConfig) -> PgResult<Self> {
        let mgr = Manager::from_config(
            config.to_pg_config(),
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let pool = Pool::builder(mgr)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| PgError::config(format!("failed to create pool: {}", e)))?;

        // fail fast on bad credentials or an unreachable host
        drop(pool.get().await?);

        info!(
            host = %config.host,
            port = %config.port,
            database = %config.database,
            pool_size = config.pool_size,
            "PostgreSQL connection pool created"
        );

        Ok(Self::from_pool(pool))
    }

    /// Connect using a `postgres://` URL.
    pub async fn connect_url(url: &str) -> PgResult<Self> {
        Self::connect(&PgConfig::from_url(url)?).await
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn client(&self) -> PgResult<Object> {
        debug!("Acquiring connection from pool");
        Ok(self.pool.get().await?)
    }
}

impl std::fmt::Debug for PgDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDatabase")
            .field("status", &self.pool.status())
            .finish()
    }
}

type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// Bind values against the parameter types the server inferred.
///
/// Integers are narrowed to the column width; a value that does not fit is
/// an error rather than a silent truncation.
fn bind(params: &[SqlValue], types: &[Type]) -> PgResult<Vec<BoxedParam>> {
    params
        .iter()
        .enumerate()
        .map(|(index, param)| -> PgResult<BoxedParam> {
            let ty = types.get(index);
            let bound: BoxedParam = match param {
                SqlValue::Int(v) if ty == Some(&Type::INT2) => Box::new(
                    i16::try_from(*v).map_err(|_| PgError::out_of_range(index, *v, "smallint"))?,
                ),
                SqlValue::Int(v) if ty == Some(&Type::INT4) => Box::new(
                    i32::try_from(*v).map_err(|_| PgError::out_of_range(index, *v, "integer"))?,
                ),
                SqlValue::Int(v) => Box::new(*v),
                SqlValue::Text(v) => Box::new(v.clone()),
            };
            Ok(bound)
        })
        .collect()
}

async fn execute(client: &Object, sql: &str, params: &[SqlValue]) -> PgResult<u64> {
    debug!(sql = %sql, "Executing statement");
    let stmt = client.prepare_cached(sql).await?;
    let values = bind(params, stmt.params())?;
    let refs: Vec<&(dyn ToSql + Sync)> = values
        .iter()
        .map(|v| &**v as &(dyn ToSql + Sync))
        .collect();
    Ok(client.execute(&stmt, &refs).await?)
}

async fn execute_batch(client: &Object, sql: &str) -> PgResult<()> {
    debug!(sql = %sql, "Executing batch");
    Ok(client.batch_execute(sql).await?)
}

#[async_trait]
impl Database for PgDatabase {
    type Transaction = PgTransaction;

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError> {
        let client = self.client().await?;
        Ok(execute(&client, sql, params).await?)
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), DatabaseError> {
        let client = self.client().await?;
        Ok(execute_batch(&client, sql).await?)
    }

    async fn query_count(&self, sql: &str) -> Result<i64, DatabaseError> {
        debug!(sql = %sql, "Executing count");
        let client = self.client().await?;
        let row = client.query_one(sql, &[]).await.map_err(PgError::from)?;
        Ok(row.try_get::<_, i64>(0).map_err(PgError::from)?)
    }

    async fn begin(&self) -> Result<PgTransaction, DatabaseError> {
        let client = self.client().await?;
        execute_batch(&client, "BEGIN").await?;
        Ok(PgTransaction {
            client: Some(client),
        })
    }
}

/// An open PostgreSQL transaction on a pooled connection.
///
/// Dropping it without calling [`commit`](Transaction::commit) or
/// [`rollback`](Transaction::rollback) rolls back on a spawned task before
/// the connection returns to the pool.
pub struct PgTransaction {
    client: Option<Object>,
}

impl PgTransaction {
    fn client(&self) -> Result<&Object, DatabaseError> {
        self.client
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("transaction already finished"))
    }

    async fn finish(mut self, statement: &'static str) -> Result<(), DatabaseError> {
        execute_batch(self.client()?, statement).await?;
        self.client = None;
        Ok(())
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError> {
        Ok(execute(self.client()?, sql, params).await?)
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), DatabaseError> {
        Ok(execute_batch(self.client()?, sql).await?)
    }

    async fn commit(self) -> Result<(), DatabaseError> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> Result<(), DatabaseError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Rolling back abandoned transaction");
                handle.spawn(async move {
                    if let Err(e) = client.batch_execute("ROLLBACK").await {
                        warn!(error = %e, "Rollback of abandoned transaction failed");
                        // never hand a connection stuck mid-transaction back to the pool
                        drop(Object::take(client));
                    }
                });
            }
            Err(_) => {
                warn!("Transaction dropped outside a Tokio runtime; discarding its connection");
                drop(Object::take(client));
            }
        }
    }
}
