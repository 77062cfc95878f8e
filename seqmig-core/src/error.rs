//! Error types for the migration engine.

use std::fmt;

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Boxed error returned by migration bodies.
///
/// Bodies can use `?` on any driver or application error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Broad classification of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseErrorKind {
    /// The database could not be reached or the connection was lost.
    Connection,
    /// A primary key or unique constraint rejected a write.
    UniqueViolation,
    /// Any other statement or query failure.
    Query,
}

impl fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection error"),
            Self::UniqueViolation => write!(f, "unique violation"),
            Self::Query => write!(f, "query error"),
        }
    }
}

/// Error reported by a [`Database`](crate::Database) implementation.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct DatabaseError {
    kind: DatabaseErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl DatabaseError {
    /// Create a new database error.
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::Connection, message)
    }

    /// Create a unique violation error.
    pub fn unique_violation(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::UniqueViolation, message)
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::Query, message)
    }

    /// Attach the underlying driver error.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The error classification.
    pub fn kind(&self) -> DatabaseErrorKind {
        self.kind
    }

    /// The driver message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        self.kind == DatabaseErrorKind::Connection
    }

    /// Check if this is a unique violation.
    pub fn is_unique_violation(&self) -> bool {
        self.kind == DatabaseErrorKind::UniqueViolation
    }
}

/// Bookkeeping step that failed before any migration ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookkeepingOperation {
    /// Creating the bookkeeping table.
    EnsureTable,
    /// Counting applied migrations.
    CountApplied,
}

impl fmt::Display for BookkeepingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnsureTable => write!(f, "creating the bookkeeping table"),
            Self::CountApplied => write!(f, "counting applied migrations"),
        }
    }
}

/// Step of a single migration that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStage {
    /// Opening the transaction.
    Begin,
    /// Running the migration body.
    Body,
    /// Inserting the version row.
    RecordVersion,
    /// Committing the transaction.
    Commit,
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => write!(f, "beginning transaction"),
            Self::Body => write!(f, "executing migration"),
            Self::RecordVersion => write!(f, "updating migration versions"),
            Self::Commit => write!(f, "committing transaction"),
        }
    }
}

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Invalid migrator configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The database could not be reached while managing the bookkeeping table.
    #[error("connectivity error while {operation}: {source}")]
    Connectivity {
        /// Bookkeeping step that failed.
        operation: BookkeepingOperation,
        /// Driver error.
        #[source]
        source: DatabaseError,
    },

    /// A bookkeeping statement failed.
    #[error("query error while {operation}: {source}")]
    Query {
        /// Bookkeeping step that failed.
        operation: BookkeepingOperation,
        /// Driver error.
        #[source]
        source: DatabaseError,
    },

    /// The database records more applied migrations than are defined.
    #[error(
        "inconsistent state: {applied} migrations recorded as applied but only {defined} are defined"
    )]
    InconsistentState {
        /// Applied count read from the bookkeeping table.
        applied: usize,
        /// Number of configured migrations.
        defined: usize,
    },

    /// A migration failed.
    #[error("migration #{position} '{name}' failed while {stage}: {source}")]
    Execution {
        /// Position in the configured sequence.
        position: usize,
        /// Migration name.
        name: String,
        /// Step that failed.
        stage: ExecutionStage,
        /// Underlying error.
        #[source]
        source: BoxError,
    },

    /// Rolling back a failed migration failed as well.
    #[error("migration #{position} '{name}': error rolling back: {rollback}; caused by: {cause}")]
    Rollback {
        /// Position in the configured sequence.
        position: usize,
        /// Migration name.
        name: String,
        /// The rollback failure.
        rollback: DatabaseError,
        /// The failure that triggered the rollback.
        #[source]
        cause: Box<MigrationError>,
    },
}

impl MigrationError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Classify a bookkeeping failure as connectivity or query error.
    pub fn bookkeeping(operation: BookkeepingOperation, source: DatabaseError) -> Self {
        if source.is_connection() {
            Self::Connectivity { operation, source }
        } else {
            Self::Query { operation, source }
        }
    }

    /// Create an execution error.
    pub fn execution(
        position: usize,
        name: impl Into<String>,
        stage: ExecutionStage,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Execution {
            position,
            name: name.into(),
            stage,
            source: source.into(),
        }
    }

    /// Position of the failing migration, if any.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Execution { position, .. } | Self::Rollback { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Name of the failing migration, if any.
    pub fn migration_name(&self) -> Option<&str> {
        match self {
            Self::Execution { name, .. } | Self::Rollback { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Stage of the failing migration, if any.
    pub fn stage(&self) -> Option<ExecutionStage> {
        match self {
            Self::Execution { stage, .. } => Some(*stage),
            Self::Rollback { cause, .. } => cause.stage(),
            _ => None,
        }
    }

    /// Check if the same call can be retried once the cause is fixed.
    ///
    /// Configuration, inconsistent state and rollback failures need an operator.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connectivity { .. } | Self::Query { .. } | Self::Execution { .. }
        )
    }

    /// Check if the failure came from a primary key or unique constraint.
    ///
    /// This is how a lost race between two concurrent migrators surfaces.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Execution { source, .. } => source
                .downcast_ref::<DatabaseError>()
                .is_some_and(DatabaseError::is_unique_violation),
            Self::Rollback { cause, .. } => cause.is_unique_violation(),
            _ => false,
        }
    }
}
