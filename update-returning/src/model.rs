//! Entity metadata: the ordered field catalog the compilers and the
//! projector agree on.

use crate::error::{Error, Result};
use crate::validate::{assert_valid_sql_identifier, check_sql_identifier};
use crate::value::RowValues;

/// One field of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Name used in filters, assignments and mapping keys.
    pub name: String,
    /// Column the field is stored in.
    pub column: String,
    /// Whether this field identifies the row.
    pub primary_key: bool,
}

/// Ordered field catalog of a table.
///
/// Field order is significant: full entities are built positionally in this
/// order, and partial selections keep it.
///
/// ```
/// use update_returning::EntityMeta;
///
/// let meta = EntityMeta::new("accounts")
///     .primary_key("id")
///     .field("owner")
///     .field_with_column("balance", "balance_cents");
///
/// assert_eq!(meta.columns(), vec!["id", "owner", "balance_cents"]);
/// assert_eq!(meta.pk().name, "id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    table: String,
    fields: Vec<FieldDef>,
}

impl EntityMeta {
    /// Start a catalog for `table`.
    ///
    /// # Panics
    ///
    /// Panics if the table name is not a valid SQL identifier.
    pub fn new(table: impl Into<String>) -> Self {
        let table = table.into();
        assert_valid_sql_identifier(&table, "table");
        Self {
            table,
            fields: Vec::new(),
        }
    }

    /// Add the primary key field, stored in a column of the same name.
    pub fn primary_key(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.push(name.clone(), name, true)
    }

    /// Add a field stored in a column of the same name.
    pub fn field(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.push(name.clone(), name, false)
    }

    /// Add a field whose column name differs from the field name.
    pub fn field_with_column(self, name: impl Into<String>, column: impl Into<String>) -> Self {
        self.push(name.into(), column.into(), false)
    }

    fn push(mut self, name: String, column: String, primary_key: bool) -> Self {
        assert_valid_sql_identifier(&name, "field");
        assert_valid_sql_identifier(&column, "column");
        assert!(
            self.index_of(&name).is_none(),
            "Duplicate field '{name}' on '{}'",
            self.table
        );
        self.fields.push(FieldDef {
            name,
            column,
            primary_key,
        });
        self
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fields in catalog order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Column names in catalog order.
    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.column.as_str()).collect()
    }

    /// Field names in catalog order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Position of a field in the catalog.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Position of a field.
    ///
    /// Names that could never be an identifier fail with
    /// [`Error::InvalidIdentifier`]; well-formed names missing from the
    /// catalog fail with [`Error::UnknownField`].
    pub fn resolve(&self, name: &str) -> Result<usize> {
        check_sql_identifier(name, "field")?;
        self.index_of(name).ok_or_else(|| Error::UnknownField {
            table: self.table.clone(),
            field: name.to_string(),
        })
    }

    /// Field at a catalog position.
    pub fn field_at(&self, idx: usize) -> Option<&FieldDef> {
        self.fields.get(idx)
    }

    /// Catalog position of the primary key.
    ///
    /// The first field flagged as primary key; if none is flagged, the
    /// first field.
    pub fn pk_index(&self) -> usize {
        self.fields
            .iter()
            .position(|f| f.primary_key)
            .unwrap_or_default()
    }

    /// The primary key field.
    ///
    /// # Panics
    ///
    /// Panics if the catalog has no fields at all.
    pub fn pk(&self) -> &FieldDef {
        let idx = self.pk_index();
        self.fields
            .get(idx)
            .unwrap_or_else(|| panic!("Entity '{}' declares no fields", self.table))
    }
}

/// A Rust type materialized from a full row of its table.
///
/// `from_values` receives every field in [`EntityMeta`] catalog order.
///
/// ```
/// use update_returning::{Entity, EntityMeta, Result, RowValues};
///
/// struct Account {
///     id: i64,
///     balance: i64,
/// }
///
/// impl Entity for Account {
///     fn meta() -> EntityMeta {
///         EntityMeta::new("accounts").primary_key("id").field("balance")
///     }
///
///     fn from_values(mut values: RowValues) -> Result<Self> {
///         Ok(Self {
///             id: values.next_value()?,
///             balance: values.next_value()?,
///         })
///     }
/// }
/// ```
pub trait Entity: Sized {
    /// Field catalog of the entity's table.
    fn meta() -> EntityMeta;

    /// Build an instance from a full row in catalog order.
    fn from_values(values: RowValues) -> Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> EntityMeta {
        EntityMeta::new("accounts")
            .primary_key("id")
            .field("owner")
            .field_with_column("balance", "balance_cents")
    }

    #[test]
    fn test_catalog_order() {
        let meta = accounts();
        assert_eq!(meta.field_names(), vec!["id", "owner", "balance"]);
        assert_eq!(meta.columns(), vec!["id", "owner", "balance_cents"]);
    }

    #[test]
    fn test_resolve_unknown_field() {
        let err = accounts().resolve("missing").unwrap_err();
        assert!(matches!(err, Error::UnknownField { ref field, .. } if field == "missing"));
    }

    #[test]
    fn test_resolve_rejects_malformed_name() {
        let err = accounts().resolve("balance; DROP TABLE accounts").unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier { context: "field", .. }));
    }

    #[test]
    fn test_pk_defaults_to_first_field() {
        let meta = EntityMeta::new("tags").field("slug").field("label");
        assert_eq!(meta.pk().name, "slug");
    }

    #[test]
    fn test_pk_flagged_field() {
        let meta = EntityMeta::new("tags").field("label").primary_key("slug");
        assert_eq!(meta.pk_index(), 1);
    }

    #[test]
    #[should_panic(expected = "Duplicate field")]
    fn test_duplicate_field_panics() {
        let _ = EntityMeta::new("t").field("a").field("a");
    }

    #[test]
    #[should_panic(expected = "Invalid SQL column name")]
    fn test_bad_column_panics() {
        let _ = EntityMeta::new("t").field_with_column("a", "a b");
    }
}
