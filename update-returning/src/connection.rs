//! Driver seam: transaction control, statement execution and row cursors.

use std::fmt;

use crate::compiler::Statement;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::value::Value;

/// One result row as delivered by the driver, in selected-column order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow(Vec<Value>);

impl RawRow {
    /// Wrap decoded column values.
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Column count.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Column values.
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Take ownership of the column values.
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for RawRow {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

type ChunkSource = Box<dyn Iterator<Item = Result<Vec<RawRow>>>>;

/// Lazy, chunked sequence of raw rows produced by a multi-row execution.
///
/// Rows are pulled one chunk at a time. A chunk error is yielded once and
/// ends the cursor.
pub struct RowCursor {
    chunks: ChunkSource,
    current: std::vec::IntoIter<RawRow>,
    done: bool,
}

impl RowCursor {
    /// Cursor over chunks produced by `source`.
    pub fn new<I>(source: I) -> Self
    where
        I: Iterator<Item = Result<Vec<RawRow>>> + 'static,
    {
        Self {
            chunks: Box::new(source),
            current: Vec::new().into_iter(),
            done: false,
        }
    }

    /// Cursor over already-fetched rows, split into chunks of `chunk_size`.
    pub fn from_rows(rows: Vec<RawRow>, chunk_size: usize) -> Self {
        let size = chunk_size.max(1);
        let mut chunks = Vec::with_capacity(rows.len().div_ceil(size));
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            chunks.push(Ok(rows.by_ref().take(size).collect()));
        }
        Self::new(chunks.into_iter())
    }

    /// Cursor that yields nothing.
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl Iterator for RowCursor {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.current.next() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            match self.chunks.next() {
                Some(Ok(chunk)) => self.current = chunk.into_iter(),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                },
                None => {
                    self.done = true;
                    return None;
                },
            }
        }
    }
}

impl std::iter::FusedIterator for RowCursor {}

impl fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCursor")
            .field("buffered", &self.current.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Transaction controls for one database connection.
///
/// A connection is either in autocommit mode or in managed mode, where
/// nothing is committed until someone calls [`commit`](Self::commit). Managed
/// scopes nest; each `enter_managed` is paired with one `leave_managed`.
pub trait TransactionContext {
    /// Whether a caller has put the connection into managed mode.
    fn is_managed(&self) -> bool;

    /// Enter managed mode.
    fn enter_managed(&mut self) -> Result<()>;

    /// Commit the pending transaction, if any.
    fn commit(&mut self) -> Result<()>;

    /// Commit only when nobody manages the connection.
    fn commit_if_unmanaged(&mut self) -> Result<()>;

    /// Leave the innermost managed scope.
    ///
    /// Leaving with uncommitted work rolls it back and reports
    /// [`Error::TransactionState`](crate::Error::TransactionState).
    fn leave_managed(&mut self) -> Result<()>;
}

/// An open database connection.
pub trait Connection: TransactionContext {
    /// SQL dialect of the engine.
    type Dialect: Dialect;

    /// Dialect used to compile statements for this connection.
    fn dialect(&self) -> Self::Dialect;

    /// Connection alias stamped onto materialized entities.
    fn alias(&self) -> &str;

    /// Run a statement that returns no rows; yields the affected row count.
    fn execute(&mut self, stmt: &Statement) -> Result<usize>;

    /// Run a statement that returns rows.
    ///
    /// Rows must not depend on the connection staying borrowed: a driver that
    /// has to finish reading before COMMIT buffers them into the cursor.
    fn execute_multi(&mut self, stmt: &Statement) -> Result<RowCursor>;
}
