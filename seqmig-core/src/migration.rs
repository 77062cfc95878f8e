//! Migration types.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::database::{Database, Transaction};
use crate::error::BoxError;

/// Body of a transactional migration.
pub type TransactionalBody<D> = Arc<
    dyn for<'t> Fn(&'t mut <D as Database>::Transaction) -> BoxFuture<'t, Result<(), BoxError>>
        + Send
        + Sync,
>;

/// Body of a direct migration.
pub type DirectBody<D> =
    Arc<dyn for<'d> Fn(&'d D) -> BoxFuture<'d, Result<(), BoxError>> + Send + Sync>;

/// How a migration is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationMode {
    /// Body and version record commit in one transaction.
    Transactional,
    /// Body runs on the plain handle; the version record is a separate statement.
    Direct,
}

impl MigrationMode {
    /// Short tag used in traces.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Transactional => "tx",
            Self::Direct => "no-tx",
        }
    }
}

impl fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// A single migration step.
///
/// ```rust,ignore
/// use seqmig_core::{Migration, Transaction};
///
/// let create = Migration::transactional("create users", |tx| {
///     Box::pin(async move {
///         tx.execute("CREATE TABLE users (id BIGINT PRIMARY KEY)", &[]).await?;
///         Ok(())
///     })
/// });
/// ```
pub enum Migration<D: Database> {
    /// Runs inside a transaction together with its version record.
    Transactional {
        /// Name, persisted as the version string.
        name: String,
        /// The migration effect.
        body: TransactionalBody<D>,
    },
    /// Runs directly on the database handle.
    Direct {
        /// Name, persisted as the version string.
        name: String,
        /// The migration effect.
        body: DirectBody<D>,
    },
}

impl<D: Database> Migration<D> {
    /// Create a transactional migration.
    ///
    /// The body and its version row are committed together, so a failure at
    /// any point leaves no trace and the migration is retried on the next run.
    pub fn transactional<F>(name: impl Into<String>, body: F) -> Self
    where
        F: for<'t> Fn(&'t mut D::Transaction) -> BoxFuture<'t, Result<(), BoxError>>
            + Send
            + Sync
            + 'static,
    {
        Self::Transactional {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    /// Create a direct (non-transactional) migration.
    ///
    /// Use this only for statements that cannot run inside a transaction.
    /// The version row is inserted after the body succeeds as a separate
    /// statement; if that insert fails the effect is applied but not
    /// recorded, and the next run executes the body again. Bodies should be
    /// written to tolerate being re-run (`IF NOT EXISTS` and the like).
    pub fn direct<F>(name: impl Into<String>, body: F) -> Self
    where
        F: for<'d> Fn(&'d D) -> BoxFuture<'d, Result<(), BoxError>> + Send + Sync + 'static,
    {
        Self::Direct {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    /// Create a transactional migration running a fixed SQL batch.
    pub fn transactional_sql(name: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql: Arc<str> = Arc::from(sql.into());
        Self::transactional(name, move |tx| {
            let sql = Arc::clone(&sql);
            Box::pin(async move {
                tx.execute_batch(&sql).await?;
                Ok(())
            })
        })
    }

    /// Create a direct migration running a fixed SQL batch.
    pub fn direct_sql(name: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql: Arc<str> = Arc::from(sql.into());
        Self::direct(name, move |db| {
            let sql = Arc::clone(&sql);
            Box::pin(async move {
                db.execute_batch(&sql).await?;
                Ok(())
            })
        })
    }

    /// The migration name.
    pub fn name(&self) -> &str {
        match self {
            Self::Transactional { name, .. } | Self::Direct { name, .. } => name,
        }
    }

    /// The execution mode.
    pub fn mode(&self) -> MigrationMode {
        match self {
            Self::Transactional { .. } => MigrationMode::Transactional,
            Self::Direct { .. } => MigrationMode::Direct,
        }
    }

    /// Check if this migration runs inside a transaction.
    pub fn is_transactional(&self) -> bool {
        self.mode() == MigrationMode::Transactional
    }
}

impl<D: Database> Clone for Migration<D> {
    fn clone(&self) -> Self {
        match self {
            Self::Transactional { name, body } => Self::Transactional {
                name: name.clone(),
                body: Arc::clone(body),
            },
            Self::Direct { name, body } => Self::Direct {
                name: name.clone(),
                body: Arc::clone(body),
            },
        }
    }
}

impl<D: Database> fmt::Debug for Migration<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("name", &self.name())
            .field("mode", &self.mode())
            .finish()
    }
}

impl<D: Database> fmt::Display for Migration<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
