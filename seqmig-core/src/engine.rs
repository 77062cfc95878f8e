//! Migration engine implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::Instrument;

use crate::bookkeeping::{BookkeepingTable, DEFAULT_TABLE_NAME, MAX_VERSION_LEN};
use crate::database::Database;
use crate::error::{BookkeepingOperation, MigrateResult, MigrationError};
use crate::executor::{self, Step};
use crate::migration::Migration;
use crate::observe::{
    Logger, MigrationSpanAttributes, SpanHandle, SpanStatus, TRACING_TARGET, Tracer,
    TracingLogger, TracingTracer,
};
use crate::settings::MigratorSettings;

/// Configuration for the migration engine.
///
/// Every setter can be called in any order; validation happens once in
/// [`Migrator::new`].
pub struct MigratorConfig<D: Database> {
    /// Bookkeeping table name.
    pub table_name: String,
    /// Progress logger.
    pub logger: Arc<dyn Logger>,
    /// Span factory.
    pub tracer: Arc<dyn Tracer>,
    /// The ordered migration sequence.
    pub migrations: Vec<Migration<D>>,
}

impl<D: Database> Default for MigratorConfig<D> {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            logger: Arc::new(TracingLogger),
            tracer: Arc::new(TracingTracer),
            migrations: Vec::new(),
        }
    }
}

impl<D: Database> MigratorConfig<D> {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the bookkeeping table name.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Override the progress logger.
    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Override the tracer.
    pub fn tracer(mut self, tracer: impl Tracer + 'static) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    /// Append one migration.
    pub fn migration(mut self, migration: Migration<D>) -> Self {
        self.migrations.push(migration);
        self
    }

    /// Append migrations in order.
    pub fn migrations(mut self, migrations: impl IntoIterator<Item = Migration<D>>) -> Self {
        self.migrations.extend(migrations);
        self
    }

    /// Apply loaded settings.
    pub fn with_settings(mut self, settings: &MigratorSettings) -> Self {
        self.table_name = settings.table_name.clone();
        self
    }
}

/// Result of a successful migration run.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    /// Applied count read before anything ran.
    pub applied_at_start: usize,
    /// Names of the migrations applied by this run, in order.
    pub applied: Vec<String>,
    /// Number of configured migrations.
    pub total: usize,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Total duration.
    pub duration: Duration,
}

impl MigrationReport {
    /// Number of migrations applied by this run.
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// Check if any migrations were applied.
    pub fn has_changes(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Check if the database was already up to date.
    pub fn is_up_to_date(&self) -> bool {
        self.applied_at_start == self.total
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        if self.applied.is_empty() {
            format!("No migrations applied ({} already applied)", self.applied_at_start)
        } else {
            format!(
                "{} applied ({} -> {}) in {}ms",
                self.applied.len(),
                self.applied_at_start,
                self.applied_at_start + self.applied.len(),
                self.duration.as_millis()
            )
        }
    }
}

/// Migration status information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Number of applied migrations.
    pub applied: usize,
    /// Number of configured migrations.
    pub total: usize,
    /// Names of pending migrations, in order.
    pub pending: Vec<String>,
}

impl MigrationStatus {
    /// Check if nothing is pending.
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The migration engine.
///
/// Applies an immutable, ordered sequence of migrations exactly once each.
/// The bookkeeping table's row count is the cursor: a count of N means the
/// first N configured migrations are applied.
///
/// There is no locking. Two processes migrating the same database at once
/// race on the bookkeeping primary key and the loser fails with a unique
/// violation (see [`MigrationError::is_unique_violation`]). Wrap
/// [`migrate`](Self::migrate) in an advisory lock if that can happen.
pub struct Migrator<D: Database> {
    table: BookkeepingTable,
    logger: Arc<dyn Logger>,
    tracer: Arc<dyn Tracer>,
    migrations: Vec<Migration<D>>,
}

impl<D: Database> Migrator<D> {
    /// Create a new migrator, validating the configuration.
    pub fn new(config: MigratorConfig<D>) -> MigrateResult<Self> {
        if config.migrations.is_empty() {
            return Err(MigrationError::configuration(
                "migrations must be provided",
            ));
        }

        for (position, migration) in config.migrations.iter().enumerate() {
            let name = migration.name();
            if name.is_empty() {
                return Err(MigrationError::configuration(format!(
                    "migration #{} has an empty name",
                    position
                )));
            }
            if name.chars().count() > MAX_VERSION_LEN {
                return Err(MigrationError::configuration(format!(
                    "migration #{} name is longer than {} characters",
                    position, MAX_VERSION_LEN
                )));
            }
        }

        let table = BookkeepingTable::new(config.table_name)?;

        Ok(Self {
            table,
            logger: config.logger,
            tracer: config.tracer,
            migrations: config.migrations,
        })
    }

    /// The configured migrations.
    pub fn migrations(&self) -> &[Migration<D>] {
        &self.migrations
    }

    /// The bookkeeping table.
    pub fn table(&self) -> &BookkeepingTable {
        &self.table
    }

    /// Apply all pending migrations.
    ///
    /// Stops at the first failure; migrations before it stay committed and
    /// the next call resumes at the failed position. Dropping the returned
    /// future abandons the run.
    pub async fn migrate(&self, db: &D) -> MigrateResult<MigrationReport> {
        let run = self.tracer.start_run();
        let span = run.tracing_span();

        let result = self.run(db, run.as_ref()).instrument(span).await;

        match &result {
            Ok(report) => {
                tracing::info!(target: TRACING_TARGET, summary = %report.summary(), "Migration run finished");
                run.finish(SpanStatus::Ok(Some(
                    "migrations applied successfully".to_string(),
                )));
            }
            Err(e) => {
                tracing::error!(target: TRACING_TARGET, error = %e, "Migration run failed");
                run.finish(SpanStatus::error(e));
            }
        }

        result
    }

    async fn run(&self, db: &D, run: &dyn SpanHandle) -> MigrateResult<MigrationReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        self.table
            .ensure(db)
            .await
            .map_err(|e| MigrationError::bookkeeping(BookkeepingOperation::EnsureTable, e))?;

        let applied_at_start = self.count_applied(db).await?;
        run.record_applied(applied_at_start);
        self.check_consistent(applied_at_start)?;

        let total = self.migrations.len();
        tracing::debug!(
            target: TRACING_TARGET,
            applied = applied_at_start,
            total,
            "Computed pending migrations"
        );

        let mut applied = Vec::new();
        for (offset, migration) in self.migrations[applied_at_start..].iter().enumerate() {
            let position = applied_at_start + offset;
            self.apply(db, run, position, migration).await?;
            applied.push(migration.name().to_string());
        }

        Ok(MigrationReport {
            applied_at_start,
            applied,
            total,
            started_at,
            duration: start.elapsed(),
        })
    }

    async fn apply(
        &self,
        db: &D,
        run: &dyn SpanHandle,
        position: usize,
        migration: &Migration<D>,
    ) -> MigrateResult<()> {
        let span = self.tracer.start_migration(
            run,
            MigrationSpanAttributes {
                mode: migration.mode(),
                name: migration.name(),
                position,
            },
        );

        let insert = self
            .table
            .version_insert(db.dialect(), position, migration.name());
        let step = Step {
            position,
            name: migration.name(),
            insert: &insert,
            logger: self.logger.as_ref(),
        };

        let result = match migration {
            Migration::Transactional { body, .. } => {
                executor::run_transactional(db, step, body)
                    .instrument(span.tracing_span())
                    .await
            }
            Migration::Direct { body, .. } => {
                executor::run_direct(db, step, body)
                    .instrument(span.tracing_span())
                    .await
            }
        };

        match &result {
            Ok(()) => span.finish(SpanStatus::ok()),
            Err(e) => span.finish(SpanStatus::error(e)),
        }

        result
    }

    /// Return the migrations not yet applied, without applying anything.
    pub async fn pending(&self, db: &D) -> MigrateResult<&[Migration<D>]> {
        let applied = self.applied_count(db).await?;
        Ok(&self.migrations[applied..])
    }

    /// Report applied and pending migrations.
    pub async fn status(&self, db: &D) -> MigrateResult<MigrationStatus> {
        let pending = self.pending(db).await?;
        Ok(MigrationStatus {
            applied: self.migrations.len() - pending.len(),
            total: self.migrations.len(),
            pending: pending.iter().map(|m| m.name().to_string()).collect(),
        })
    }

    /// Read the applied count and check it against the configured sequence.
    async fn applied_count(&self, db: &D) -> MigrateResult<usize> {
        let applied = self.count_applied(db).await?;
        self.check_consistent(applied)?;
        Ok(applied)
    }

    async fn count_applied(&self, db: &D) -> MigrateResult<usize> {
        self.table
            .count_applied(db)
            .await
            .map_err(|e| MigrationError::bookkeeping(BookkeepingOperation::CountApplied, e))
    }

    /// More rows than migrations means the binary and the database disagree.
    fn check_consistent(&self, applied: usize) -> MigrateResult<()> {
        if applied > self.migrations.len() {
            return Err(MigrationError::InconsistentState {
                applied,
                defined: self.migrations.len(),
            });
        }
        Ok(())
    }
}

impl<D: Database> std::fmt::Debug for Migrator<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("table", &self.table.name())
            .field("migrations", &self.migrations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(applied_at_start: usize, applied: &[&str], total: usize) -> MigrationReport {
        MigrationReport {
            applied_at_start,
            applied: applied.iter().map(|s| s.to_string()).collect(),
            total,
            started_at: Utc::now(),
            duration: Duration::from_millis(150),
        }
    }

    #[test]
    fn test_report_summary() {
        let result = report(1, &["m1", "m2"], 3);
        assert_eq!(result.applied_count(), 2);
        assert!(result.has_changes());
        assert!(!result.is_up_to_date());
        assert_eq!(result.summary(), "2 applied (1 -> 3) in 150ms");
    }

    #[test]
    fn test_report_up_to_date() {
        let result = report(3, &[], 3);
        assert!(!result.has_changes());
        assert!(result.is_up_to_date());
        assert_eq!(result.summary(), "No migrations applied (3 already applied)");
    }

    #[test]
    fn test_status_up_to_date() {
        let status = MigrationStatus {
            applied: 2,
            total: 2,
            pending: Vec::new(),
        };
        assert!(status.is_up_to_date());
    }
}
