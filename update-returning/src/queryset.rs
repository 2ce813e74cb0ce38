//! Caller-facing query sets and the per-entity manager.

use std::fmt;

use crate::compiler::SelectCompiler;
use crate::config::Settings;
use crate::connection::Connection;
use crate::error::Result;
use crate::filter::{FilterExpr, Operator};
use crate::model::Entity;
use crate::operation::{ReturningRows, UpdateReturning};
use crate::projector::{ResultObject, ResultProjector};
use crate::query::{Query, QueryShape, QueryShapeRegistry, SortDir};
use crate::value::Value;

/// A lazily evaluated query over `E` with a cached result.
///
/// Builder methods return a new query set with an empty cache. Updates
/// through [`update_returning`](Self::update_returning) clear the cache of
/// the query set they run on.
pub struct QuerySet<E> {
    query: Query<E>,
    settings: Settings,
    registry: QueryShapeRegistry,
    result_cache: Option<Vec<ResultObject<E>>>,
}

impl<E: Entity> QuerySet<E> {
    /// Every row of `E`, with default settings.
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// Every row of `E`.
    pub fn with_settings(settings: Settings) -> Self {
        Self::from_query(Query::new(), settings)
    }

    /// Wrap an existing query.
    pub const fn from_query(query: Query<E>, settings: Settings) -> Self {
        Self {
            query,
            settings,
            registry: QueryShapeRegistry::new(),
            result_cache: None,
        }
    }

    /// Use a different shape table for updates.
    #[must_use]
    pub const fn registry(mut self, registry: QueryShapeRegistry) -> Self {
        self.registry = registry;
        self
    }

    fn chain(self, f: impl FnOnce(Query<E>) -> Query<E>) -> Self {
        Self {
            query: f(self.query),
            settings: self.settings,
            registry: self.registry,
            result_cache: None,
        }
    }

    /// See [`Query::filter`].
    #[must_use]
    pub fn filter(self, field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        self.chain(|q| q.filter(field, op, value))
    }

    /// See [`Query::filter_expr`].
    #[must_use]
    pub fn filter_expr(self, expr: FilterExpr) -> Self {
        self.chain(|q| q.filter_expr(expr))
    }

    /// See [`Query::order_by`].
    #[must_use]
    pub fn order_by(self, field: impl Into<String>, dir: SortDir) -> Self {
        self.chain(|q| q.order_by(field, dir))
    }

    /// See [`Query::only`].
    #[must_use]
    pub fn only(self, fields: &[&str]) -> Self {
        self.chain(|q| q.only(fields))
    }

    /// See [`Query::defer`].
    #[must_use]
    pub fn defer(self, fields: &[&str]) -> Self {
        self.chain(|q| q.defer(fields))
    }

    /// See [`Query::values`].
    #[must_use]
    pub fn values(self, fields: &[&str]) -> Self {
        self.chain(|q| q.values(fields))
    }

    /// See [`Query::values_list`].
    #[must_use]
    pub fn values_list(self, fields: &[&str], flat: bool) -> Self {
        self.chain(|q| q.values_list(fields, flat))
    }

    /// See [`Query::none`].
    #[must_use]
    pub fn none(self) -> Self {
        self.chain(Query::none)
    }

    /// The underlying query.
    pub const fn query(&self) -> &Query<E> {
        &self.query
    }

    /// Settings in effect.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Whether results are cached.
    pub const fn is_cached(&self) -> bool {
        self.result_cache.is_some()
    }

    /// Read matching rows, caching them until the next update.
    pub fn fetch<C: Connection>(&mut self, conn: &mut C) -> Result<&[ResultObject<E>]> {
        if self.result_cache.is_none() {
            let results = self.read(conn)?;
            self.result_cache = Some(results);
        }
        Ok(self.result_cache.as_deref().unwrap_or_default())
    }

    fn read<C: Connection>(&self, conn: &mut C) -> Result<Vec<ResultObject<E>>> {
        if self.query.shape() == QueryShape::Empty {
            return Ok(Vec::new());
        }
        let projector = ResultProjector::build(
            self.query.projection(),
            self.query.shared_meta(),
            conn.alias(),
        )?;
        let stmt = SelectCompiler::new(&self.query, conn.dialect()).compile()?;
        tracing::debug!(table = self.query.meta().table(), sql = %stmt.sql, "reading rows");
        conn.execute_multi(&stmt)?
            .map(|row| projector.project(row?))
            .collect()
    }

    /// Apply `assignments` to every matching row and stream the updated rows
    /// back in this query set's projection.
    ///
    /// Clears the result cache. In non-strict mode a shape without returning
    /// form runs a plain update and yields nothing.
    pub fn update_returning<'c, C, I, K, V>(
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
        self.result_cache = None;
        UpdateReturning::new(self.query.clone())
            .registry(self.registry)
            .strict(self.settings.strict_returning)
            .execute(conn, assignments)
    }

    /// [`update_returning`](Self::update_returning), collected.
    pub fn update_returning_list<C, I, K, V>(
        &mut self,
        conn: &mut C,
        assignments: I,
    ) -> Result<Vec<ResultObject<E>>>
    where
        C: Connection,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.update_returning(conn, assignments)?.into_vec()
    }
}

impl<E: Entity> Default for QuerySet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for QuerySet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySet")
            .field("query", &self.query)
            .field("cached", &self.result_cache.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

/// Entry point for query sets over `E`.
pub struct Manager<E> {
    settings: Settings,
    _entity: std::marker::PhantomData<fn() -> E>,
}

impl<E: Entity> Manager<E> {
    /// Manager with default settings.
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// Manager whose query sets use `settings`.
    pub const fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            _entity: std::marker::PhantomData,
        }
    }

    /// Fresh query set over every row.
    pub fn get_queryset(&self) -> QuerySet<E> {
        QuerySet::with_settings(self.settings.clone())
    }

    /// Query set filtered on one field.
    pub fn filter(
        &self,
        field: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> QuerySet<E> {
        self.get_queryset().filter(field, op, value)
    }

    /// Update every row and stream the updated rows as full entities.
    pub fn update_returning<'c, C, I, K, V>(
        &self,
        conn: &'c mut C,
        assignments: I,
    ) -> Result<ReturningRows<'c, E>>
    where
        C: Connection,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.get_queryset().update_returning(conn, assignments)
    }
}

impl<E: Entity> Default for Manager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Manager<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
