//! Execution of a single migration.

use crate::bookkeeping::VersionInsert;
use crate::database::{Database, Transaction};
use crate::error::{ExecutionStage, MigrateResult, MigrationError};
use crate::migration::{DirectBody, TransactionalBody};
use crate::observe::{Logger, TRACING_TARGET};

/// Context shared by both execution modes.
pub(crate) struct Step<'a> {
    pub position: usize,
    pub name: &'a str,
    pub insert: &'a VersionInsert,
    pub logger: &'a dyn Logger,
}

impl Step<'_> {
    fn fail(&self, stage: ExecutionStage, source: impl Into<crate::BoxError>) -> MigrationError {
        MigrationError::execution(self.position, self.name, stage, source)
    }
}

/// Run a migration body and its version insert in one transaction.
pub(crate) async fn run_transactional<D: Database>(
    db: &D,
    step: Step<'_>,
    body: &TransactionalBody<D>,
) -> MigrateResult<()> {
    let mut tx = db
        .begin()
        .await
        .map_err(|e| step.fail(ExecutionStage::Begin, e))?;

    step.logger
        .log(&format!("applying migration named '{}'...", step.name));

    if let Err(e) = body(&mut tx).await {
        return Err(rollback(tx, &step, step.fail(ExecutionStage::Body, e)).await);
    }

    if let Err(e) = tx.execute(&step.insert.sql, &step.insert.params).await {
        return Err(rollback(tx, &step, step.fail(ExecutionStage::RecordVersion, e)).await);
    }

    tx.commit()
        .await
        .map_err(|e| step.fail(ExecutionStage::Commit, e))?;

    step.logger
        .log(&format!("applied migration named '{}'", step.name));
    Ok(())
}

/// Run a migration body on the plain handle, then record it.
///
/// Not atomic: if the insert fails the body's effect stays applied.
pub(crate) async fn run_direct<D: Database>(
    db: &D,
    step: Step<'_>,
    body: &DirectBody<D>,
) -> MigrateResult<()> {
    step.logger
        .log(&format!("applying no tx migration named '{}'...", step.name));

    body(db)
        .await
        .map_err(|e| step.fail(ExecutionStage::Body, e))?;

    if let Err(e) = db.execute(&step.insert.sql, &step.insert.params).await {
        tracing::warn!(
            target: TRACING_TARGET,
            position = step.position,
            migration = step.name,
            error = %e,
            "Direct migration applied but its version was not recorded; it will run again on the next migrate"
        );
        return Err(step.fail(ExecutionStage::RecordVersion, e));
    }

    step.logger
        .log(&format!("applied no tx migration named '{}'", step.name));
    Ok(())
}

async fn rollback<T: Transaction>(tx: T, step: &Step<'_>, cause: MigrationError) -> MigrationError {
    match tx.rollback().await {
        Ok(()) => cause,
        Err(rollback) => {
            tracing::error!(
                target: TRACING_TARGET,
                position = step.position,
                migration = step.name,
                error = %rollback,
                "Rollback failed; database state needs manual inspection"
            );
            MigrationError::Rollback {
                position: step.position,
                name: step.name.to_string(),
                rollback,
                cause: Box::new(cause),
            }
        }
    }
}
