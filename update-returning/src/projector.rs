//! Raw rows to typed results.
//!
//! A [`ResultProjector`] is built once per operation from the query's final
//! [`ProjectionMode`]. It resolves every field up front, so projecting a row
//! is a length check plus a move of the row's values.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use miniserde::json;

use crate::compiler::SelectCompiler;
use crate::connection::{Connection, RawRow};
use crate::error::{Error, Result};
use crate::filter::Operator;
use crate::model::{Entity, EntityMeta};
use crate::query::{ProjectionMode, Query, projected_fields};
use crate::value::{RowValues, Value, json_object};

/// Persistence bookkeeping carried by materialized entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelState {
    db: String,
    adding: bool,
}

impl ModelState {
    /// State of a row read back from the database on connection `db`.
    pub fn loaded(db: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            adding: false,
        }
    }

    /// Connection alias the row was read from.
    pub fn db(&self) -> &str {
        &self.db
    }

    /// Whether the entity is new and not yet stored. Always false for
    /// projected rows.
    pub const fn adding(&self) -> bool {
        self.adding
    }
}

/// A fully loaded entity that is known to exist in the database.
#[derive(Debug, Clone, PartialEq)]
pub struct Persisted<E> {
    entity: E,
    state: ModelState,
}

impl<E> Persisted<E> {
    /// Persistence state.
    pub const fn state(&self) -> &ModelState {
        &self.state
    }

    /// Drop the state and keep the entity.
    pub fn into_inner(self) -> E {
        self.entity
    }
}

impl<E> Deref for Persisted<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.entity
    }
}

/// A partially loaded entity.
///
/// The primary key and the included fields are present; the rest are
/// loaded from the database by primary key on request.
pub struct Deferred<E> {
    meta: Arc<EntityMeta>,
    slots: Vec<Option<Value>>,
    state: ModelState,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Deferred<E> {
    /// Value of a loaded field; `None` when deferred or unknown.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.meta
            .index_of(field)
            .and_then(|idx| self.slots.get(idx))
            .and_then(Option::as_ref)
    }

    /// Whether `field` is loaded.
    pub fn is_loaded(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Names of loaded fields, in catalog order.
    pub fn loaded_fields(&self) -> Vec<&str> {
        self.fields_where(true)
    }

    /// Names of fields still to be loaded, in catalog order.
    pub fn deferred_fields(&self) -> Vec<&str> {
        self.fields_where(false)
    }

    fn fields_where(&self, loaded: bool) -> Vec<&str> {
        self.meta
            .fields()
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.is_some() == loaded)
            .map(|(f, _)| f.name.as_str())
            .collect()
    }

    /// Primary key value.
    pub fn pk(&self) -> &Value {
        self.slots
            .get(self.meta.pk_index())
            .and_then(Option::as_ref)
            .unwrap_or(&Value::Null)
    }

    /// Persistence state.
    pub const fn state(&self) -> &ModelState {
        &self.state
    }

    /// Value of `field`, loading it by primary key if it is deferred.
    pub fn fetch<C: Connection>(&mut self, conn: &mut C, field: &str) -> Result<&Value> {
        let idx = self.meta.resolve(field)?;
        if self.slots.get(idx).is_some_and(Option::is_none) {
            self.load(conn, &[idx])?;
        }
        Ok(self
            .slots
            .get(idx)
            .and_then(Option::as_ref)
            .unwrap_or(&Value::Null))
    }

    /// Load every deferred field in one query.
    pub fn load_deferred<C: Connection>(&mut self, conn: &mut C) -> Result<()> {
        let missing: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(idx, _)| idx)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        self.load(conn, &missing)
    }

    fn load<C: Connection>(&mut self, conn: &mut C, indices: &[usize]) -> Result<()> {
        let names: Vec<&str> = indices
            .iter()
            .filter_map(|idx| self.meta.field_at(*idx))
            .map(|f| f.name.as_str())
            .collect();
        let query = Query::<E>::with_meta(Arc::clone(&self.meta))
            .values(&names)
            .filter(self.meta.pk().name.clone(), Operator::Eq, self.pk().clone());
        let stmt = SelectCompiler::new(&query, conn.dialect()).compile()?;
        tracing::debug!(
            table = self.meta.table(),
            fields = names.len(),
            "loading deferred fields"
        );

        let row = conn
            .execute_multi(&stmt)?
            .next()
            .transpose()?
            .ok_or_else(|| Error::NotFound {
                table: self.meta.table().to_string(),
                pk: self.pk().to_string(),
            })?;
        if row.len() != indices.len() {
            return Err(Error::RowShapeMismatch {
                expected: indices.len(),
                actual: row.len(),
            });
        }
        for (idx, value) in indices.iter().zip(row.into_values()) {
            if let Some(slot) = self.slots.get_mut(*idx) {
                *slot = Some(value);
            }
        }
        Ok(())
    }
}

impl<E: Entity> Deferred<E> {
    /// Load anything still deferred and build the full entity.
    pub fn into_entity<C: Connection>(mut self, conn: &mut C) -> Result<Persisted<E>> {
        self.load_deferred(conn)?;
        let values = self
            .slots
            .into_iter()
            .map(|slot| slot.unwrap_or(Value::Null))
            .collect();
        Ok(Persisted {
            entity: E::from_values(RowValues::new(values))?,
            state: self.state,
        })
    }
}

impl<E> fmt::Debug for Deferred<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("table", &self.meta.table())
            .field("pk", self.pk())
            .field("loaded", &self.loaded_fields())
            .field("deferred", &self.deferred_fields())
            .finish()
    }
}

/// Ordered field name to value pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    entries: Vec<(String, Value)>,
}

impl Mapping {
    /// Value for `field`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Pairs in selection order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Keys in selection order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object of the pairs.
    pub fn to_json(&self) -> json::Value {
        json_object(self.iter())
    }

    /// Take the pairs.
    pub fn into_entries(self) -> Vec<(String, Value)> {
        self.entries
    }
}

/// One projected result row.
#[derive(Debug)]
pub enum ResultObject<E> {
    /// Fully loaded entity.
    Entity(Persisted<E>),
    /// Partially loaded entity.
    Partial(Deferred<E>),
    /// Field name to value mapping.
    Mapping(Mapping),
    /// Values in selection order.
    Tuple(Vec<Value>),
    /// Bare value of a single flat field.
    Scalar(Value),
}

impl<E> ResultObject<E> {
    /// The full entity, if this is one.
    pub const fn as_entity(&self) -> Option<&Persisted<E>> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// The partial entity, if this is one.
    pub const fn as_partial(&self) -> Option<&Deferred<E>> {
        match self {
            Self::Partial(partial) => Some(partial),
            _ => None,
        }
    }

    /// The mapping, if this is one.
    pub const fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    /// The tuple values, if this is a tuple.
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Self::Tuple(values) => Some(values),
            _ => None,
        }
    }

    /// The bare value, if this is a scalar.
    pub const fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Take the full entity.
    pub fn into_entity(self) -> Option<Persisted<E>> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Take the partial entity.
    pub fn into_partial(self) -> Option<Deferred<E>> {
        match self {
            Self::Partial(partial) => Some(partial),
            _ => None,
        }
    }

    /// Take the bare value.
    pub fn into_scalar(self) -> Option<Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Shape {
    Full,
    Partial { slots: Vec<usize> },
    Mapping { keys: Vec<String> },
    Tuple { scalar: bool },
}

/// Materializes raw rows in the shape a [`ProjectionMode`] asks for.
pub struct ResultProjector<E> {
    shape: Shape,
    meta: Arc<EntityMeta>,
    db: String,
    width: usize,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> ResultProjector<E> {
    /// Resolve `mode` against `meta` once. `db` is the alias stamped onto
    /// entity results.
    pub fn build(
        mode: &ProjectionMode,
        meta: Arc<EntityMeta>,
        db: impl Into<String>,
    ) -> Result<Self> {
        let indices = projected_fields(mode, &meta)?;
        let width = indices.len();
        let shape = match mode {
            ProjectionMode::FullEntity => Shape::Full,
            ProjectionMode::PartialEntity { .. } => Shape::Partial { slots: indices },
            ProjectionMode::Mapping { field_names } => Shape::Mapping {
                keys: field_names.clone(),
            },
            ProjectionMode::TupleOrScalar { flat, .. } => Shape::Tuple {
                scalar: *flat && width == 1,
            },
        };
        Ok(Self {
            shape,
            meta,
            db: db.into(),
            width,
            _entity: PhantomData,
        })
    }

    /// Column count every row must have.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Materialize one row.
    pub fn project(&self, row: RawRow) -> Result<ResultObject<E>> {
        if row.len() != self.width {
            return Err(Error::RowShapeMismatch {
                expected: self.width,
                actual: row.len(),
            });
        }
        let values = row.into_values();
        Ok(match &self.shape {
            Shape::Full => ResultObject::Entity(Persisted {
                entity: E::from_values(RowValues::new(values))?,
                state: ModelState::loaded(self.db.as_str()),
            }),
            Shape::Partial { slots } => {
                let mut filled = vec![None; self.meta.fields().len()];
                for (idx, value) in slots.iter().zip(values) {
                    if let Some(slot) = filled.get_mut(*idx) {
                        *slot = Some(value);
                    }
                }
                ResultObject::Partial(Deferred {
                    meta: Arc::clone(&self.meta),
                    slots: filled,
                    state: ModelState::loaded(self.db.as_str()),
                    _entity: PhantomData,
                })
            },
            Shape::Mapping { keys } => ResultObject::Mapping(Mapping {
                entries: keys.iter().cloned().zip(values).collect(),
            }),
            Shape::Tuple { scalar: true } => {
                ResultObject::Scalar(values.into_iter().next().unwrap_or(Value::Null))
            },
            Shape::Tuple { scalar: false } => ResultObject::Tuple(values),
        })
    }
}

impl<E> fmt::Debug for ResultProjector<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultProjector")
            .field("table", &self.meta.table())
            .field("shape", &self.shape)
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}
