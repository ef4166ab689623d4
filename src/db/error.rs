use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the run database and the generic table store.
///
/// Precondition violations are raised before any statement reaches the
/// engine; engine-level failures (constraint violations, lock timeouts)
/// pass through unmodified as [`DbError::Sqlx`].
#[derive(Error, Debug)]
pub enum DbError {
    #[error("database {0:?} has not been created yet")]
    DatabaseMissing(PathBuf),

    #[error("table {0} does not exist")]
    MissingTable(String),

    #[error("{table} exists and its columns {existing:?} != {declared:?}")]
    SchemaMismatch {
        table: String,
        existing: Vec<String>,
        declared: Vec<String>,
    },

    #[error("wrong keys for {table}: expected {expected:?}, got {received:?}")]
    WrongKeys {
        table: String,
        expected: Vec<String>,
        received: Vec<String>,
    },

    #[error("run creation failed")]
    RunCreationFailed,

    #[error("column name `{0}` is reserved")]
    ReservedColumn(String),

    #[error("`{0}` is not a valid table or column name")]
    InvalidIdentifier(String),

    #[error("the table has been initialized already")]
    AlreadyInitialized,

    #[error("the table has not been initialized yet, call create first")]
    NotInitialized,

    #[error("at least one column is required")]
    NoColumns,

    #[error("`{column}` is not a column of {table}")]
    UnknownColumn { column: String, table: String },

    #[error("unsupported column type `{0}`")]
    UnsupportedType(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result of [`create_db`](crate::db::create_db). An existing file without
/// `force` is reported, not treated as an error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SchemaOutcome {
    Created,
    AlreadyExists,
}
