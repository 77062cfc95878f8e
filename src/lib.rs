//! # seqmig
//!
//! Ordered, exactly-once database migrations.
//!
//! seqmig applies a fixed sequence of migrations, in order, exactly once per
//! database. Progress is tracked in a bookkeeping table whose row count is
//! the position of the next migration to run.
//!
//! seqmig provides:
//! - Transactional migrations, committed together with their version record
//! - Direct migrations for statements that cannot run in a transaction
//! - Halt on the first failure, with retries resuming at the failed position
//! - `tracing` spans and events for every run and every migration
//! - SQLite and PostgreSQL backends behind feature flags
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use seqmig::prelude::*;
//! use seqmig::sqlite::SqliteDatabase;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     seqmig::logging::init();
//!
//!     let settings = MigratorSettings::load("seqmig.toml").await?;
//!     let db = SqliteDatabase::connect("sqlite://./app.db").await?;
//!
//!     let migrator = Migrator::new(
//!         MigratorConfig::new()
//!             .with_settings(&settings)
//!             .migration(Migration::transactional_sql(
//!                 "create users",
//!                 "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL)",
//!             ))
//!             .migration(Migration::transactional("seed admin", |tx| {
//!                 Box::pin(async move {
//!                     tx.execute(
//!                         "INSERT INTO users (id, email) VALUES (?1, ?2)",
//!                         &[SqlValue::Int(1), SqlValue::from("admin@example.com")],
//!                     )
//!                     .await?;
//!                     Ok(())
//!                 })
//!             })),
//!     )?;
//!
//!     let report = migrator.migrate(&db).await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use seqmig_core::*;

/// SQLite backend.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use seqmig_sqlite::*;
}

/// PostgreSQL backend.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use seqmig_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use seqmig_core::{
        Database, Migration, MigrationError, MigrationReport, Migrator, MigratorConfig,
        MigratorSettings, SqlValue, Transaction,
    };
}
