//! # seqmig-core
//!
//! Migration engine for seqmig.
//!
//! This crate provides:
//! - An ordered, immutable migration sequence (transactional or direct steps)
//! - A positional bookkeeping table: its row count is the cursor into the sequence
//! - Exactly-once application with halt-on-first-failure and resumable retries
//! - Injected logger and tracer collaborators with `tracing`-backed defaults
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ MigratorCfg  │────▶│   Migrator     │────▶│ Bookkeeping  │
//! └──────────────┘     └────────────────┘     │ (count = N)  │
//!                              │              └──────────────┘
//!                              ▼
//!                      ┌────────────────┐     ┌──────────────┐
//!                      │ migrations[N..]│────▶│  Executor    │
//!                      └────────────────┘     │ tx / direct  │
//!                                             └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use seqmig_core::{Migration, Migrator, MigratorConfig, Transaction};
//! use seqmig_sqlite::SqliteDatabase;
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = SqliteDatabase::open_in_memory().await?;
//!
//!     let migrator = Migrator::new(
//!         MigratorConfig::new()
//!             .migration(Migration::transactional("create foo", |tx| {
//!                 Box::pin(async move {
//!                     tx.execute("CREATE TABLE foo (id INT PRIMARY KEY)", &[]).await?;
//!                     Ok(())
//!                 })
//!             }))
//!             .migration(Migration::direct_sql(
//!                 "index foo",
//!                 "CREATE INDEX IF NOT EXISTS foo_id ON foo (id)",
//!             )),
//!     )?;
//!
//!     let report = migrator.migrate(&db).await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! The first failing migration stops the run. Transactional migrations leave
//! no trace and are retried from the same position. Direct migrations are not
//! atomic with their version record; see [`Migration::direct`].

pub mod bookkeeping;
pub mod database;
pub mod engine;
pub mod error;
mod executor;
pub mod logging;
pub mod migration;
pub mod observe;
pub mod settings;

// Re-exports
pub use bookkeeping::{BookkeepingTable, DEFAULT_TABLE_NAME, VersionInsert};
pub use database::{Database, Dialect, SqlValue, Transaction};
pub use engine::{MigrationReport, MigrationStatus, Migrator, MigratorConfig};
pub use error::{
    BookkeepingOperation, BoxError, DatabaseError, DatabaseErrorKind, ExecutionStage,
    MigrateResult, MigrationError,
};
pub use migration::{DirectBody, Migration, MigrationMode, TransactionalBody};
pub use observe::{
    Logger, MigrationSpanAttributes, SpanHandle, SpanStatus, TRACING_TARGET, Tracer,
    TracingLogger, TracingTracer,
};
pub use settings::MigratorSettings;
