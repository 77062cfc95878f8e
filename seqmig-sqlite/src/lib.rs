//! SQLite backend for seqmig.
//!
//! Implements [`seqmig_core::Database`] on top of `tokio-rusqlite`, so
//! migrations run on a dedicated blocking thread without stalling the
//! async runtime.
//!
//! # Example
//!
//! ```rust,ignore
//! use seqmig_core::{Migration, Migrator, MigratorConfig};
//! use seqmig_sqlite::{SqliteConfig, SqliteDatabase};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = SqliteDatabase::open(&SqliteConfig::from_url("sqlite://./app.db")?).await?;
//!
//!     let migrator = Migrator::new(MigratorConfig::new().migration(
//!         Migration::transactional_sql("create foo", "CREATE TABLE foo (id INTEGER PRIMARY KEY)"),
//!     ))?;
//!     migrator.migrate(&db).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod database;
pub mod error;

pub use config::{DatabasePath, JournalMode, SqliteConfig, SynchronousMode};
pub use database::{SqliteDatabase, SqliteTransaction};
pub use error::{SqliteError, SqliteResult};
