//! Error types.

use thiserror::Error;

use crate::query::QueryShape;

/// Errors raised while compiling, executing or materializing an update.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The engine cannot attach a row-returning clause to UPDATE.
    #[error("engine `{dialect}` does not support UPDATE ... RETURNING")]
    UnsupportedEngine {
        /// Dialect name reported by the driver.
        dialect: &'static str,
    },

    /// The query shape has no row-returning counterpart.
    #[error("query shape `{shape:?}` has no row-returning counterpart")]
    UnsupportedProjection {
        /// Shape the query had when the operation started.
        shape: QueryShape,
    },

    /// Managed/unmanaged transaction nesting is inconsistent.
    #[error("transaction state error: {0}")]
    TransactionState(String),

    /// A raw row does not have the column count the projector was built for.
    #[error("row has {actual} columns, projector expects {expected}")]
    RowShapeMismatch {
        /// Column count the projector was built against.
        expected: usize,
        /// Column count delivered by the engine.
        actual: usize,
    },

    /// UPDATE compiled without any assignment.
    #[error("update has no column assignments")]
    EmptyUpdate,

    /// Field name is not part of the entity catalog.
    #[error("unknown field `{field}` on `{table}`")]
    UnknownField {
        /// Table of the entity.
        table: String,
        /// Offending field name.
        field: String,
    },

    /// Name rejected by identifier validation.
    #[error("invalid SQL {context} name `{name}`")]
    InvalidIdentifier {
        /// What the name was used for (table, column, field).
        context: &'static str,
        /// Offending name.
        name: String,
    },

    /// A value could not be converted to the requested Rust type.
    #[error("cannot decode {found} value as {expected}")]
    Decode {
        /// Requested type.
        expected: &'static str,
        /// Type of the value actually present.
        found: &'static str,
    },

    /// Lookup by primary key returned no row.
    #[error("no `{table}` row with primary key {pk}")]
    NotFound {
        /// Table that was queried.
        table: String,
        /// Rendered primary key value.
        pk: String,
    },

    /// Parameter value the driver cannot bind.
    #[error("unsupported parameter value: {0}")]
    UnsupportedValue(String),

    /// Error raised by SQLite, passed through untouched.
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Error raised by any other engine driver.
    #[error(transparent)]
    Engine(Box<dyn std::error::Error + Send + Sync>),
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
