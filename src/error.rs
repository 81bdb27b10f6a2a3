use std::path::PathBuf;

use thiserror::Error;

pub type QueryResult<T> = Result<T, QueryError>;

/// Errors surfaced by `QueryExecutor::execute`. An empty table is never an error.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("scope configuration error: {0}")]
    ScopeConfiguration(#[from] ScopeConfigError),

    #[error("upstream data fault: {0}")]
    Upstream(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeConfigError {
    #[error("scope '{scope_id}' has no scope values")]
    EmptyValues { scope_id: String },

    #[error("unknown scope kind '{0}' (expected grade, class or region)")]
    UnknownKind(String),

    /// A GRADE scope carries a value that is not an integer.
    #[error("grade scope value '{0}' is not an integer")]
    NonNumericScopeValue(String),

    /// A grade column holds a value that cannot be compared as an integer.
    #[error("grade column holds non-integer value '{0}'")]
    NonNumericColumnValue(String),
}

/// Faults raised while producing a table from the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("data source not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read data source {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data in {origin}: {reason}")]
    Malformed { origin: String, reason: String },

    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("row {row} has {got} values but the table has {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
}
