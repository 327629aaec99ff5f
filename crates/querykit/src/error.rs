//! Error types for querykit

use thiserror::Error;

/// Result type alias for statement construction.
pub type BuildResult<T> = Result<T, BuildError>;

/// Result type alias for everything that touches a connection or the filesystem.
pub type DbResult<T> = Result<T, DbError>;

/// Errors raised while assembling a statement.
///
/// These are caller-configuration errors. They are detected before any SQL
/// leaves the builder, so no malformed statement is ever produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Malformed predicate value for the chosen operator.
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    /// A join condition or join column was added before any join table.
    #[error("No join table has been added yet")]
    NoJoinTable,

    /// A join (other than CROSS JOIN) has no condition.
    #[error("Join on table '{0}' has no join condition")]
    NoJoinCondition(String),

    /// Terminal render without a primary table.
    #[error("No table has been set on the builder")]
    NoTable,

    /// INSERT/UPDATE without any column data.
    #[error("No data for {0} statement")]
    NoData(&'static str),
}

impl BuildError {
    /// Create an invalid predicate error
    pub fn invalid_predicate(message: impl Into<String>) -> Self {
        Self::InvalidPredicate(message.into())
    }
}

/// Error types for execution, result access, migrations and config.
#[derive(Debug, Error)]
pub enum DbError {
    /// Statement construction error
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// `last_error` was asked for, but the last statement succeeded
    #[error("No error was recorded for the last statement")]
    NoError,

    /// Result cursor does not point at a row
    #[error("Result row not found at index {0}")]
    RowNotFound(usize),

    /// Requested column is not part of the result set
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Migration repository unusable (missing, unwritable, corrupted)
    #[error("{0}")]
    MigrationRepository(String),

    /// Migration with the same name already exists
    #[error("Migration '{0}' already exists")]
    MigrationExists(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a migration error
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    /// Create a migration repository error
    pub fn repository(message: impl Into<String>) -> Self {
        Self::MigrationRepository(message.into())
    }

    /// Check if this error came from statement construction
    pub fn is_build_error(&self) -> bool {
        matches!(self, Self::Build(_))
    }

    /// Check if this is a duplicate-migration error
    pub fn is_migration_exists(&self) -> bool {
        matches!(self, Self::MigrationExists(_))
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
