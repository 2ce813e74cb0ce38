//! update-returning - update rows and get them back in one round trip.
//!
//! An update-and-fetch appends a `RETURNING` clause to an `UPDATE` so that
//! the modified rows come back from the same statement, materialized in the
//! projection the query was built with:
//!
//! | Query built with | Each result is |
//! |------------------|----------------|
//! | nothing | [`ResultObject::Entity`], a full [`Persisted`] entity |
//! | `only` / `defer` | [`ResultObject::Partial`], a [`Deferred`] entity |
//! | `values` | [`ResultObject::Mapping`] |
//! | `values_list` | [`ResultObject::Tuple`], or [`ResultObject::Scalar`] when flat |
//!
//! The update runs inside [`TransactionGuard`]: if the caller already manages
//! the connection the update joins that transaction, otherwise it is committed
//! before any row is handed out.
//!
//! # Example
//!
//! ```
//! use update_returning::{
//!     Entity, EntityMeta, Operator, QuerySet, Result, RowValues, SqliteConnection, Value,
//! };
//!
//! struct Account {
//!     id: i64,
//!     balance: i64,
//! }
//!
//! impl Entity for Account {
//!     fn meta() -> EntityMeta {
//!         EntityMeta::new("accounts").primary_key("id").field("balance")
//!     }
//!
//!     fn from_values(mut values: RowValues) -> Result<Self> {
//!         Ok(Self {
//!             id: values.next_value()?,
//!             balance: values.next_value()?,
//!         })
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let mut conn = SqliteConnection::open_in_memory()?;
//! conn.execute_batch(
//!     "CREATE TABLE accounts (id INTEGER PRIMARY KEY, balance INTEGER NOT NULL);
//!      INSERT INTO accounts VALUES (1, 0), (2, 0);",
//! )?;
//!
//! let mut ids: Vec<Value> = QuerySet::<Account>::new()
//!     .filter("id", Operator::Eq, 2)
//!     .values_list(&["id"], true)
//!     .update_returning(&mut conn, [("balance", 10)])?
//!     .map(|row| row.map(|r| r.into_scalar().unwrap_or(Value::Null)))
//!     .collect::<Result<_>>()?;
//! assert_eq!(ids.pop(), Some(Value::Int(2)));
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`query`]: query description and the shape registry
//! - [`compiler`]: SELECT, UPDATE and UPDATE ... RETURNING compilers
//! - [`transaction`]: transaction scoping
//! - [`projector`]: raw rows to typed results
//! - [`operation`]: the update-and-fetch state machine
//! - [`queryset`]: caller-facing [`QuerySet`] and [`Manager`]
//! - `sqlite`: bundled `SQLite` driver (feature `sqlite`, on by default)

pub mod compiler;
pub mod config;
pub mod connection;
pub mod constants;
pub mod dialect;
mod error;
pub mod filter;
pub mod model;
pub mod operation;
pub mod projector;
pub mod query;
pub mod queryset;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod transaction;
mod validate;
mod value;

pub use compiler::{ReturningUpdateCompiler, SelectCompiler, Statement, UpdateCompiler};
pub use config::Settings;
pub use connection::{Connection, RawRow, RowCursor, TransactionContext};
pub use dialect::{Dialect, Mysql, Postgres, Sqlite};
pub use error::{Error, Result};
pub use filter::{CompoundFilter, Filter, FilterExpr, LogicalOp, Operator, and, not, or, simple};
pub use model::{Entity, EntityMeta, FieldDef};
pub use operation::{OperationState, Outcome, ReturningRows, UpdateReturning};
pub use projector::{Deferred, Mapping, ModelState, Persisted, ResultObject, ResultProjector};
pub use query::{ProjectionMode, Query, QueryShape, QueryShapeRegistry, SortDir, SortField};
pub use queryset::{Manager, QuerySet};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConnection;
pub use transaction::TransactionGuard;
pub use validate::{check_sql_identifier, is_valid_sql_identifier};
pub use value::{FromValue, RowValues, Value};
