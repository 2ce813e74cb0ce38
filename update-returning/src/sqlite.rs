//! `SQLite` driver over `rusqlite`.
//!
//! Managed mode is emulated on top of autocommit: the first statement run
//! while managed opens a transaction with `BEGIN`, [`commit`] ends it, and
//! leaving the outermost managed scope with the transaction still open rolls
//! it back. Entering managed mode while a transaction opened by hand (a raw
//! `BEGIN`) is pending is refused, so that work is never committed here.
//!
//! `SQLite` finishes an `UPDATE ... RETURNING` only once every row has been
//! stepped, so multi-row results are read to the end before the cursor is
//! handed out.
//!
//! [`commit`]: TransactionContext::commit

use std::path::Path;

use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::compiler::Statement;
use crate::config::Settings;
use crate::connection::{Connection, RawRow, RowCursor, TransactionContext};
use crate::dialect::Sqlite;
use crate::error::{Error, Result};
use crate::value::Value;

/// A `SQLite` database connection.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    alias: String,
    chunk_size: usize,
    depth: usize,
}

impl SqliteConnection {
    /// Open a database file with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(rusqlite::Connection::open(path)?, &Settings::default()))
    }

    /// Open a private in-memory database with default settings.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(rusqlite::Connection::open_in_memory()?, &Settings::default()))
    }

    /// Wrap an existing `rusqlite` connection.
    pub fn new(conn: rusqlite::Connection, settings: &Settings) -> Self {
        Self {
            conn,
            alias: settings.alias.clone(),
            chunk_size: settings.chunk_size.max(1),
            depth: 0,
        }
    }

    /// Apply `settings` to this connection.
    #[must_use]
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.alias.clone_from(&settings.alias);
        self.chunk_size = settings.chunk_size.max(1);
        self
    }

    /// Run one or more `;`-separated statements without parameters, e.g.
    /// schema setup.
    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.begin_if_managed()?;
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// The underlying `rusqlite` connection.
    pub const fn raw(&self) -> &rusqlite::Connection {
        &self.conn
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn begin_if_managed(&mut self) -> Result<()> {
        if self.depth > 0 && self.conn.is_autocommit() {
            tracing::trace!(alias = %self.alias, "BEGIN");
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }
}

impl TransactionContext for SqliteConnection {
    fn is_managed(&self) -> bool {
        self.depth > 0
    }

    fn enter_managed(&mut self) -> Result<()> {
        if self.depth == 0 && self.in_transaction() {
            return Err(Error::TransactionState(
                "a transaction opened outside managed mode is still pending".into(),
            ));
        }
        self.depth += 1;
        tracing::trace!(alias = %self.alias, depth = self.depth, "entered managed mode");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction() {
            tracing::trace!(alias = %self.alias, "COMMIT");
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn commit_if_unmanaged(&mut self) -> Result<()> {
        if self.is_managed() { Ok(()) } else { self.commit() }
    }

    fn leave_managed(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::TransactionState(
                "leave_managed called without a matching enter_managed".into(),
            ));
        }
        self.depth -= 1;
        tracing::trace!(alias = %self.alias, depth = self.depth, "left managed mode");
        if self.depth == 0 && self.in_transaction() {
            tracing::trace!(alias = %self.alias, "ROLLBACK");
            self.conn.execute_batch("ROLLBACK")?;
            return Err(Error::TransactionState(
                "left managed mode with uncommitted changes; rolled back".into(),
            ));
        }
        Ok(())
    }
}

impl Connection for SqliteConnection {
    type Dialect = Sqlite;

    fn dialect(&self) -> Sqlite {
        Sqlite
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn execute(&mut self, stmt: &Statement) -> Result<usize> {
        let params = to_sql_params(&stmt.params)?;
        self.begin_if_managed()?;
        let mut prepared = self.conn.prepare_cached(&stmt.sql)?;
        Ok(prepared.execute(rusqlite::params_from_iter(params))?)
    }

    fn execute_multi(&mut self, stmt: &Statement) -> Result<RowCursor> {
        let params = to_sql_params(&stmt.params)?;
        self.begin_if_managed()?;
        let mut prepared = self.conn.prepare_cached(&stmt.sql)?;
        let width = prepared.column_count();
        let mut rows = prepared.query(rusqlite::params_from_iter(params))?;

        let mut fetched = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..width)
                .map(|idx| -> Result<Value> { Ok(from_sql_value(row.get_ref(idx)?)) })
                .collect::<Result<Vec<_>>>()?;
            fetched.push(RawRow::new(values));
        }
        tracing::trace!(alias = %self.alias, rows = fetched.len(), "fetched rows");
        Ok(RowCursor::from_rows(fetched, self.chunk_size))
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("alias", &self.alias)
            .field("chunk_size", &self.chunk_size)
            .field("depth", &self.depth)
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}

fn to_sql_params(params: &[Value]) -> Result<Vec<SqlValue>> {
    params.iter().map(to_sql_value).collect()
}

fn to_sql_value(value: &Value) -> Result<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(n) => SqlValue::Integer(*n),
        Value::Float(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::Array(values) => {
            return Err(Error::UnsupportedValue(format!(
                "sqlite cannot bind an array of {} values",
                values.len()
            )));
        },
    })
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::String(text.to_owned()),
            // Kept byte for byte; the column holds text that is not UTF-8.
            Err(_) => Value::Bytes(bytes.to_vec()),
        },
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}
