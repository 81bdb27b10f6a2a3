pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod intent;
pub mod models;
pub mod report;
pub mod roles;
pub mod scope;
pub mod store;
pub mod table;
pub mod window;

pub use error::{QueryError, QueryResult, ScopeConfigError, StoreError, TableError};
pub use executor::{output_columns, QueryExecutor};
pub use intent::{FilterValue, Intent, IntentCategory};
pub use scope::{apply_scope, validate_access, AccessScope, ScopeKind};
pub use store::{JsonRecordStore, RecordFilters, RecordStore, Snapshot};
pub use table::{Table, Value};
