//! The update-and-fetch operation and the row stream it hands back.

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;

use crate::compiler::{ReturningUpdateCompiler, UpdateCompiler};
use crate::connection::{Connection, RowCursor};
use crate::error::{Error, Result};
use crate::model::Entity;
use crate::projector::{ResultObject, ResultProjector};
use crate::query::{Query, QueryShape, QueryShapeRegistry};
use crate::transaction::TransactionGuard;
use crate::value::Value;

/// How a finished operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The update committed (or joined the caller's transaction) and every
    /// row was delivered.
    Committed,
    /// Compilation, execution, commit or projection failed.
    Failed,
}

/// Lifecycle of an update-and-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Nothing sent yet.
    Unstarted,
    /// Transaction scope entered.
    TransactionOpen,
    /// Statement sent.
    Executing,
    /// Rows are being handed out.
    Streaming,
    /// Done.
    Closed(Outcome),
}

/// One UPDATE ... RETURNING against a query, executed at most once.
pub struct UpdateReturning<E> {
    query: Query<E>,
    registry: QueryShapeRegistry,
    strict: bool,
    state: OperationState,
}

impl<E: Entity> UpdateReturning<E> {
    /// Operation over `query` using the built-in shape table, in strict mode.
    pub fn new(query: Query<E>) -> Self {
        Self {
            query,
            registry: QueryShapeRegistry::new(),
            strict: true,
            state: OperationState::Unstarted,
        }
    }

    /// Use a different shape table.
    #[must_use]
    pub const fn registry(mut self, registry: QueryShapeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// In strict mode a shape without returning counterpart is an error;
    /// otherwise the update runs without returning rows.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Lifecycle state as of the end of [`execute`](Self::execute).
    ///
    /// A successful call leaves this at [`OperationState::Streaming`]; from
    /// then on the returned [`ReturningRows::state`] tracks the stream until
    /// it closes.
    pub const fn state(&self) -> OperationState {
        self.state
    }

    /// Apply `assignments` to every row matching the query and stream the
    /// updated rows back in the query's projection.
    ///
    /// The transaction is settled before this returns; the stream only reads
    /// rows that are already fetched.
    pub fn execute<'c, C, I, K, V>(
        &mut self,
        conn: &'c mut C,
        assignments: I,
    ) -> Result<ReturningRows<'c, E>>
    where
        C: Connection,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        if self.state != OperationState::Unstarted {
            return Err(Error::TransactionState(format!(
                "update already executed (state {:?})",
                self.state
            )));
        }
        let result = self.run(conn, assignments);
        self.state = match &result {
            Ok(rows) => rows.state(),
            Err(e) => {
                tracing::debug!(
                    table = self.query.meta().table(),
                    error = %e,
                    "update returning failed"
                );
                OperationState::Closed(Outcome::Failed)
            },
        };
        result
    }

    fn run<'c, C, I, K, V>(
        &mut self,
        conn: &'c mut C,
        assignments: I,
    ) -> Result<ReturningRows<'c, E>>
    where
        C: Connection,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let shape = self.query.shape();
        let resolved = self.registry.resolve(shape);
        if !resolved.is_returning() {
            if self.strict {
                return Err(Error::UnsupportedProjection { shape });
            }
            return self.run_plain(conn, assignments);
        }

        let mut query = self.query.clone_with_shape(resolved);
        query.add_update_values(assignments)?;
        let projector =
            ResultProjector::build(query.projection(), query.shared_meta(), conn.alias())?;
        let compiler = ReturningUpdateCompiler::new(&query, conn.dialect())?;

        let state = &mut self.state;
        *state = OperationState::TransactionOpen;
        let cursor = TransactionGuard::run(conn, |conn| {
            *state = OperationState::Executing;
            compiler.execute(conn)
        })?;

        tracing::debug!(
            table = query.meta().table(),
            shape = ?resolved,
            width = projector.width(),
            "streaming returned rows"
        );
        Ok(ReturningRows::streaming(cursor, projector))
    }

    fn run_plain<'c, C, I, K, V>(
        &mut self,
        conn: &'c mut C,
        assignments: I,
    ) -> Result<ReturningRows<'c, E>>
    where
        C: Connection,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let shape = self.query.shape();
        if shape == QueryShape::Empty {
            tracing::trace!(table = self.query.meta().table(), "empty query, nothing to update");
            return Ok(ReturningRows::closed());
        }

        let mut query = self.query.clone();
        query.add_update_values(assignments)?;
        let compiler = UpdateCompiler::new(&query, conn.dialect());

        let state = &mut self.state;
        *state = OperationState::TransactionOpen;
        let updated = TransactionGuard::run(conn, |conn| {
            *state = OperationState::Executing;
            compiler.execute(conn)
        })?;
        tracing::debug!(
            table = query.meta().table(),
            shape = ?shape,
            updated,
            "shape has no returning form, ran plain update"
        );
        Ok(ReturningRows::closed())
    }
}

impl<E> fmt::Debug for UpdateReturning<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateReturning")
            .field("query", &self.query)
            .field("strict", &self.strict)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Forward-only stream of rows modified by an update-and-fetch.
///
/// Borrows the connection for as long as it lives. Rows arrive in engine
/// order, which is unspecified. Dropping the stream early discards the
/// unread rows; the update itself is already settled.
pub struct ReturningRows<'c, E> {
    cursor: RowCursor,
    projector: Option<ResultProjector<E>>,
    state: OperationState,
    yielded: usize,
    _conn: PhantomData<&'c mut ()>,
}

impl<E> ReturningRows<'_, E> {
    fn streaming(cursor: RowCursor, projector: ResultProjector<E>) -> Self {
        Self {
            cursor,
            projector: Some(projector),
            state: OperationState::Streaming,
            yielded: 0,
            _conn: PhantomData,
        }
    }

    fn closed() -> Self {
        Self {
            cursor: RowCursor::empty(),
            projector: None,
            state: OperationState::Closed(Outcome::Committed),
            yielded: 0,
            _conn: PhantomData,
        }
    }

    /// Current lifecycle state of the stream.
    pub const fn state(&self) -> OperationState {
        self.state
    }

    /// Rows handed out so far.
    pub const fn yielded(&self) -> usize {
        self.yielded
    }

    fn close(&mut self, outcome: Outcome) {
        self.state = OperationState::Closed(outcome);
        self.projector = None;
        tracing::trace!(rows = self.yielded, ?outcome, "returned row stream closed");
    }
}

impl<E: Entity> ReturningRows<'_, E> {
    /// Drain the stream, stopping at the first error.
    pub fn into_vec(self) -> Result<Vec<ResultObject<E>>> {
        self.collect()
    }
}

impl<E: Entity> Iterator for ReturningRows<'_, E> {
    type Item = Result<ResultObject<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        let projector = self.projector.as_ref()?;
        let projected = match self.cursor.next() {
            Some(Ok(row)) => projector.project(row),
            Some(Err(e)) => Err(e),
            None => {
                self.close(Outcome::Committed);
                return None;
            },
        };
        match projected {
            Ok(object) => {
                self.yielded += 1;
                Some(Ok(object))
            },
            Err(e) => {
                self.close(Outcome::Failed);
                Some(Err(e))
            },
        }
    }
}

impl<E: Entity> FusedIterator for ReturningRows<'_, E> {}

impl<E> fmt::Debug for ReturningRows<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturningRows")
            .field("state", &self.state)
            .field("yielded", &self.yielded)
            .finish_non_exhaustive()
    }
}
