//! Settings loaded from a TOML file and the environment.
//!
//! ```toml
//! [migrations]
//! table_name = "schema_migrations"
//! ```
//!
//! `SEQMIG_TABLE` overrides the file. Other top-level tables are ignored so
//! the section can live in an application's own config file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bookkeeping::DEFAULT_TABLE_NAME;
use crate::error::{MigrateResult, MigrationError};

/// Environment variable overriding the bookkeeping table name.
pub const TABLE_ENV_VAR: &str = "SEQMIG_TABLE";

/// Migrator settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigratorSettings {
    /// Bookkeeping table name.
    #[serde(default = "default_table_name")]
    pub table_name: String,
}

impl Default for MigratorSettings {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    migrations: MigratorSettings,
}

impl MigratorSettings {
    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> MigrateResult<Self> {
        let file: SettingsFile = toml::from_str(content)
            .map_err(|e| MigrationError::configuration(format!("invalid settings: {}", e)))?;
        Ok(file.migrations)
    }

    /// Load settings from a TOML file, then apply environment overrides.
    pub async fn load(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            MigrationError::configuration(format!(
                "failed to read settings file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self::from_toml(&content)?.with_env())
    }

    /// Default settings with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply environment overrides.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(table) = lookup(TABLE_ENV_VAR).filter(|v| !v.is_empty()) {
            self.table_name = table;
        }
        self
    }
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}
