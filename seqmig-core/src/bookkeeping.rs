//! Bookkeeping table management.
//!
//! The table holds one `(id, version)` row per applied migration, where `id`
//! is the position of the migration in the configured sequence. The row count
//! is the cursor into that sequence.

use crate::database::{Database, Dialect, SqlValue};
use crate::error::{DatabaseError, MigrateResult, MigrationError};

/// Default bookkeeping table name.
pub const DEFAULT_TABLE_NAME: &str = "migrations";

/// Maximum length of a version string (the `version` column width).
pub const MAX_VERSION_LEN: usize = 255;

/// Maximum length of one identifier segment.
const MAX_IDENTIFIER_LEN: usize = 63;

/// A validated bookkeeping table identifier.
///
/// Accepts `table` or `schema.table` where each segment matches
/// `[A-Za-z_][A-Za-z0-9_]*`. Segments are always quoted in generated SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookkeepingTable {
    name: String,
    segments: Vec<String>,
}

impl BookkeepingTable {
    /// Validate a table name.
    pub fn new(name: impl Into<String>) -> MigrateResult<Self> {
        let name = name.into();
        let segments: Vec<String> = name.split('.').map(String::from).collect();

        if segments.len() > 2 {
            return Err(MigrationError::configuration(format!(
                "invalid table name '{}': expected 'table' or 'schema.table'",
                name
            )));
        }

        for segment in &segments {
            validate_segment(segment).map_err(|reason| {
                MigrationError::configuration(format!("invalid table name '{}': {}", name, reason))
            })?;
        }

        Ok(Self { name, segments })
    }

    /// The table name as configured.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The quoted, possibly schema-qualified identifier.
    pub fn qualified(&self, dialect: Dialect) -> String {
        self.segments
            .iter()
            .map(|s| dialect.quote_identifier(s))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// DDL creating the table if it does not exist.
    pub fn create_sql(&self, dialect: Dialect) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (id BIGINT NOT NULL, version VARCHAR({}) NOT NULL, PRIMARY KEY (id))",
            self.qualified(dialect),
            MAX_VERSION_LEN
        )
    }

    /// Query counting applied migrations.
    pub fn count_sql(&self, dialect: Dialect) -> String {
        format!("SELECT COUNT(*) FROM {}", self.qualified(dialect))
    }

    /// Parameterized insert recording a migration at `position`.
    pub fn version_insert(
        &self,
        dialect: Dialect,
        position: usize,
        version: &str,
    ) -> VersionInsert {
        VersionInsert {
            sql: format!(
                "INSERT INTO {} (id, version) VALUES ({}, {})",
                self.qualified(dialect),
                dialect.placeholder(1),
                dialect.placeholder(2)
            ),
            params: vec![SqlValue::Int(position as i64), SqlValue::from(version)],
        }
    }

    /// Create the table if it does not exist.
    pub async fn ensure<D: Database>(&self, db: &D) -> Result<(), DatabaseError> {
        db.execute(&self.create_sql(db.dialect()), &[]).await?;
        Ok(())
    }

    /// Count applied migrations.
    ///
    /// Always queries the database; the count is the authoritative cursor.
    pub async fn count_applied<D: Database>(&self, db: &D) -> Result<usize, DatabaseError> {
        let count = db.query_count(&self.count_sql(db.dialect())).await?;
        usize::try_from(count).map_err(|_| {
            DatabaseError::query(format!(
                "bookkeeping table '{}' returned a negative count: {}",
                self.name, count
            ))
        })
    }
}

impl Default for BookkeepingTable {
    fn default() -> Self {
        Self {
            name: DEFAULT_TABLE_NAME.to_string(),
            segments: vec![DEFAULT_TABLE_NAME.to_string()],
        }
    }
}

/// A version-insert statement with its bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInsert {
    /// The statement.
    pub sql: String,
    /// `[position, version]`.
    pub params: Vec<SqlValue>,
}

fn validate_segment(segment: &str) -> Result<(), &'static str> {
    let mut chars = segment.chars();
    match chars.next() {
        None => return Err("empty identifier"),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return Err("identifiers must start with a letter or underscore");
        }
        _ => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("identifiers may only contain letters, digits and underscores");
    }
    if segment.len() > MAX_IDENTIFIER_LEN {
        return Err("identifier is longer than 63 characters");
    }
    Ok(())
}
