//! Query description: target entity, predicate, projection and assignments.
//!
//! A [`Query`] is inert data. Compilers read it; the operation clones it into
//! its returning shape and merges assignments into the clone.

mod registry;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::filter::{FilterExpr, Operator, simple};
use crate::model::{Entity, EntityMeta};
use crate::value::Value;

pub use registry::QueryShapeRegistry;

/// What each result row materializes into, and therefore which columns are
/// requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionMode {
    /// Every field, built into the entity type.
    FullEntity,
    /// Only `included` fields are loaded; the rest load on demand by key.
    PartialEntity {
        /// Loaded fields in catalog order. Always contains the primary key.
        included: Vec<String>,
    },
    /// Field name to value mapping.
    Mapping {
        /// Keys in output order.
        field_names: Vec<String>,
    },
    /// Ordered tuple, or a bare value for one flat field.
    TupleOrScalar {
        /// Fields in output order.
        fields: Vec<String>,
        /// Return a bare value when exactly one field is selected.
        flat: bool,
    },
}

/// A query's projection configuration, independent of its predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryShape {
    /// Full or partial entities.
    Entity,
    /// Name to value mappings.
    Values,
    /// Tuples or scalars.
    ValuesList,
    /// A query known to match nothing.
    Empty,
    /// [`QueryShape::Entity`] with a row-returning UPDATE.
    ReturningEntity,
    /// [`QueryShape::Values`] with a row-returning UPDATE.
    ReturningValues,
    /// [`QueryShape::ValuesList`] with a row-returning UPDATE.
    ReturningValuesList,
}

impl QueryShape {
    /// Whether this shape compiles UPDATE with a row-returning clause.
    pub const fn is_returning(self) -> bool {
        matches!(
            self,
            Self::ReturningEntity | Self::ReturningValues | Self::ReturningValuesList
        )
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// Sort key for the read path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    /// Entity field name.
    pub field: String,
    /// Direction.
    pub dir: SortDir,
}

/// Description of a read or update against entity `E`.
pub struct Query<E> {
    meta: Arc<EntityMeta>,
    filters: Vec<FilterExpr>,
    order_by: Vec<SortField>,
    projection: ProjectionMode,
    shape: QueryShape,
    assignments: Vec<(String, Value)>,
    unresolved: Vec<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Query<E> {
    /// Query over every row of `E`'s table, projecting full entities.
    pub fn new() -> Self {
        Self::with_meta(Arc::new(E::meta()))
    }
}

impl<E: Entity> Default for Query<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Query<E> {
    pub(crate) fn with_meta(meta: Arc<EntityMeta>) -> Self {
        Self {
            meta,
            filters: Vec::new(),
            order_by: Vec::new(),
            projection: ProjectionMode::FullEntity,
            shape: QueryShape::Entity,
            assignments: Vec::new(),
            unresolved: Vec::new(),
            _entity: PhantomData,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // PREDICATE
    // ═══════════════════════════════════════════════════════════════════

    /// Add a field comparison, AND-ed with existing filters.
    #[must_use]
    pub fn filter(
        mut self,
        field: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(simple(field, op, value));
        self
    }

    /// Add a compound expression, AND-ed with existing filters.
    #[must_use]
    pub fn filter_expr(mut self, expr: FilterExpr) -> Self {
        self.filters.push(expr);
        self
    }

    /// Add a sort key. Only the read path honours ordering; UPDATE has no
    /// ORDER BY and returned rows arrive in engine order.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, dir: SortDir) -> Self {
        self.order_by.push(SortField {
            field: field.into(),
            dir,
        });
        self
    }

    // ═══════════════════════════════════════════════════════════════════
    // PROJECTION
    // ═══════════════════════════════════════════════════════════════════

    /// Load only `fields` (plus the primary key); other fields are deferred.
    #[must_use]
    pub fn only(mut self, fields: &[&str]) -> Self {
        let pk = self.meta.pk().name.clone();
        let wanted: Vec<&str> = std::iter::once(pk.as_str())
            .chain(fields.iter().copied())
            .collect();
        self.record_unresolved(fields);
        self.set_included(&wanted)
    }

    /// Defer `fields`; everything else stays loaded. The primary key is never
    /// deferred.
    #[must_use]
    pub fn defer(mut self, fields: &[&str]) -> Self {
        self.record_unresolved(fields);
        let pk = self.meta.pk().name.clone();
        let current: Vec<String> = match &self.projection {
            ProjectionMode::PartialEntity { included } => included.clone(),
            _ => self.meta.field_names().into_iter().map(String::from).collect(),
        };
        let kept: Vec<&str> = current
            .iter()
            .map(String::as_str)
            .filter(|name| *name == pk || !fields.contains(name))
            .collect();
        self.set_included(&kept)
    }

    /// Project name to value mappings. No fields means every field.
    #[must_use]
    pub fn values(mut self, fields: &[&str]) -> Self {
        self.projection = ProjectionMode::Mapping {
            field_names: self.expand_fields(fields),
        };
        self.shape = QueryShape::Values;
        self
    }

    /// Project tuples; with `flat` and a single field, bare values. No fields
    /// means every field.
    #[must_use]
    pub fn values_list(mut self, fields: &[&str], flat: bool) -> Self {
        self.projection = ProjectionMode::TupleOrScalar {
            fields: self.expand_fields(fields),
            flat,
        };
        self.shape = QueryShape::ValuesList;
        self
    }

    /// Mark the query as matching nothing.
    #[must_use]
    pub fn none(mut self) -> Self {
        self.shape = QueryShape::Empty;
        self
    }

    fn expand_fields(&self, fields: &[&str]) -> Vec<String> {
        if fields.is_empty() {
            return self.meta.field_names().into_iter().map(String::from).collect();
        }
        let mut names: Vec<String> = Vec::with_capacity(fields.len());
        for field in fields {
            if !names.iter().any(|n| n == field) {
                names.push((*field).to_string());
            }
        }
        names
    }

    fn record_unresolved(&mut self, fields: &[&str]) {
        for field in fields {
            if self.meta.index_of(field).is_none() && !self.unresolved.iter().any(|u| u == field)
            {
                self.unresolved.push((*field).to_string());
            }
        }
    }

    fn set_included(mut self, wanted: &[&str]) -> Self {
        let included: Vec<String> = self
            .meta
            .fields()
            .iter()
            .filter(|f| wanted.contains(&f.name.as_str()))
            .map(|f| f.name.clone())
            .collect();
        self.projection = if included.len() == self.meta.fields().len() {
            ProjectionMode::FullEntity
        } else {
            ProjectionMode::PartialEntity { included }
        };
        self.shape = QueryShape::Entity;
        self
    }

    // ═══════════════════════════════════════════════════════════════════
    // UPDATE
    // ═══════════════════════════════════════════════════════════════════

    /// Merge column assignments. A field assigned twice keeps its first SET
    /// position and takes the last value.
    pub fn add_update_values<I, K, V>(&mut self, assignments: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (field, value) in assignments {
            let field = field.into();
            self.meta.resolve(&field)?;
            let value = value.into();
            match self.assignments.iter_mut().find(|(f, _)| *f == field) {
                Some(slot) => slot.1 = value,
                None => self.assignments.push((field, value)),
            }
        }
        Ok(())
    }

    /// Copy of this query with a different shape. Projection, predicate and
    /// assignments carry over unchanged.
    #[must_use]
    pub fn clone_with_shape(&self, shape: QueryShape) -> Self {
        let mut query = self.clone();
        query.shape = shape;
        query
    }

    // ═══════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════

    /// Entity catalog.
    pub fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    pub(crate) fn shared_meta(&self) -> Arc<EntityMeta> {
        Arc::clone(&self.meta)
    }

    /// Current shape.
    pub const fn shape(&self) -> QueryShape {
        self.shape
    }

    /// Current projection.
    pub const fn projection(&self) -> &ProjectionMode {
        &self.projection
    }

    /// Predicate expressions, AND-ed together.
    pub fn filters(&self) -> &[FilterExpr] {
        &self.filters
    }

    /// Read path sort keys.
    pub fn ordering(&self) -> &[SortField] {
        &self.order_by
    }

    /// Merged assignments as `(field, value)` in SET order.
    pub fn assignments(&self) -> &[(String, Value)] {
        &self.assignments
    }

    /// Catalog positions of the fields this query selects, in column order.
    ///
    /// This is the one column-selection rule: SELECT lists, RETURNING lists and
    /// the projector all derive from it.
    pub fn selected_fields(&self) -> Result<Vec<usize>> {
        if let Some(field) = self.unresolved.first() {
            return Err(Error::UnknownField {
                table: self.meta.table().to_string(),
                field: field.clone(),
            });
        }
        projected_fields(&self.projection, &self.meta)
    }

    /// Column names this query selects, in order.
    pub fn selected_columns(&self) -> Result<Vec<&str>> {
        Ok(self
            .selected_fields()?
            .into_iter()
            .filter_map(|idx| self.meta.field_at(idx))
            .map(|f| f.column.as_str())
            .collect())
    }
}

/// Resolve the catalog positions a projection reads, in column order.
pub(crate) fn projected_fields(mode: &ProjectionMode, meta: &EntityMeta) -> Result<Vec<usize>> {
    let resolve_all =
        |names: &[String]| names.iter().map(|name| meta.resolve(name)).collect::<Result<Vec<_>>>();
    match mode {
        ProjectionMode::FullEntity => Ok((0..meta.fields().len()).collect()),
        ProjectionMode::PartialEntity { included } => resolve_all(included),
        ProjectionMode::Mapping { field_names } => resolve_all(field_names),
        ProjectionMode::TupleOrScalar { fields, .. } => resolve_all(fields),
    }
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            meta: Arc::clone(&self.meta),
            filters: self.filters.clone(),
            order_by: self.order_by.clone(),
            projection: self.projection.clone(),
            shape: self.shape,
            assignments: self.assignments.clone(),
            unresolved: self.unresolved.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.meta.table())
            .field("shape", &self.shape)
            .field("projection", &self.projection)
            .field("filters", &self.filters)
            .field("assignments", &self.assignments)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RowValues;

    struct Account;

    impl Entity for Account {
        fn meta() -> EntityMeta {
            EntityMeta::new("accounts")
                .primary_key("id")
                .field("owner")
                .field_with_column("balance", "balance_cents")
        }

        fn from_values(_values: RowValues) -> Result<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn test_default_is_full_entity() {
        let query = Query::<Account>::new();
        assert_eq!(query.shape(), QueryShape::Entity);
        assert_eq!(query.projection(), &ProjectionMode::FullEntity);
        assert_eq!(
            query.selected_columns().unwrap(),
            vec!["id", "owner", "balance_cents"]
        );
    }

    #[test]
    fn test_only_adds_primary_key_in_catalog_order() {
        let query = Query::<Account>::new().only(&["balance"]);
        assert_eq!(
            query.projection(),
            &ProjectionMode::PartialEntity {
                included: vec!["id".into(), "balance".into()]
            }
        );
        assert_eq!(query.selected_columns().unwrap(), vec!["id", "balance_cents"]);
    }

    #[test]
    fn test_defer_never_drops_primary_key() {
        let query = Query::<Account>::new().defer(&["id", "owner"]);
        assert_eq!(query.selected_columns().unwrap(), vec!["id", "balance_cents"]);
    }

    #[test]
    fn test_only_everything_collapses_to_full() {
        let query = Query::<Account>::new().only(&["owner", "balance"]);
        assert_eq!(query.projection(), &ProjectionMode::FullEntity);
    }

    #[test]
    fn test_defer_unknown_field_fails_at_selection() {
        let query = Query::<Account>::new().defer(&["nickname"]);
        assert!(matches!(
            query.selected_fields(),
            Err(Error::UnknownField { ref field, .. }) if field == "nickname"
        ));
    }

    #[test]
    fn test_values_dedupes_and_expands() {
        let query = Query::<Account>::new().values(&["balance", "id", "balance"]);
        assert_eq!(query.shape(), QueryShape::Values);
        assert_eq!(query.selected_columns().unwrap(), vec!["balance_cents", "id"]);

        let all = Query::<Account>::new().values(&[]);
        assert_eq!(all.selected_fields().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_values_list_keeps_flat_flag() {
        let query = Query::<Account>::new().values_list(&["id"], true);
        assert_eq!(query.shape(), QueryShape::ValuesList);
        assert!(matches!(
            query.projection(),
            ProjectionMode::TupleOrScalar { flat: true, .. }
        ));
    }

    #[test]
    fn test_assignments_last_write_wins() {
        let mut query = Query::<Account>::new();
        query
            .add_update_values([("balance", Value::Int(1)), ("owner", "a".into())])
            .unwrap();
        query.add_update_values([("balance", 5)]).unwrap();
        assert_eq!(
            query.assignments(),
            &[
                ("balance".to_string(), Value::Int(5)),
                ("owner".to_string(), Value::String("a".into()))
            ]
        );
    }

    #[test]
    fn test_assignment_to_unknown_field_fails() {
        let mut query = Query::<Account>::new();
        assert!(query.add_update_values([("nope", 1)]).is_err());
        assert!(query.assignments().is_empty());
    }

    #[test]
    fn test_clone_with_shape_preserves_projection() {
        let query = Query::<Account>::new().values_list(&["id"], true);
        let returning = query.clone_with_shape(QueryShape::ReturningValuesList);
        assert_eq!(returning.projection(), query.projection());
        assert!(returning.shape().is_returning());
        assert!(!query.shape().is_returning());
    }

    #[test]
    fn test_none_is_empty_shape() {
        assert_eq!(Query::<Account>::new().none().shape(), QueryShape::Empty);
    }
}
