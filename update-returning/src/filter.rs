//! Predicate model and its SQL rendering.
//!
//! Filters name entity *fields*; the column each field maps to is looked up
//! in the [`EntityMeta`] when the predicate is rendered, so read and update
//! statements built from the same query agree on the WHERE clause.

use crate::dialect::Dialect;
use crate::error::Result;
use crate::model::EntityMeta;
use crate::value::Value;

/// SQL comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal: `=` (or `IS NULL` against `Value::Null`)
    Eq,
    /// Not equal: `!=` (or `IS NOT NULL` against `Value::Null`)
    Ne,
    /// Greater than: `>`
    Gt,
    /// Greater than or equal: `>=`
    Gte,
    /// Less than: `<`
    Lt,
    /// Less than or equal: `<=`
    Lte,
    /// In list: `IN` or `= ANY`
    In,
    /// Not in list: `NOT IN` or `!= ALL`
    NotIn,
    /// Pattern match: `LIKE`
    Like,
    /// Between two values: `BETWEEN $1 AND $2`
    Between,
}

impl Operator {
    const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Between => "BETWEEN",
        }
    }
}

/// Logical operators for compound filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// All conditions must match: `AND`
    And,
    /// At least one condition must match: `OR`
    Or,
    /// Negate the condition: `NOT`
    Not,
}

/// Single field comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Entity field name.
    pub field: String,
    /// Comparison operator.
    pub op: Operator,
    /// Right-hand operand.
    pub value: Value,
}

impl Filter {
    /// Create a filter.
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

/// A filter expression that can be simple or compound.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// A simple field comparison.
    Simple(Filter),
    /// A compound filter with logical operator.
    Compound(CompoundFilter),
}

/// Multiple expressions combined with a logical operator.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundFilter {
    /// How the children combine.
    pub op: LogicalOp,
    /// Child expressions.
    pub filters: Vec<FilterExpr>,
}

/// Build a simple filter expression.
pub fn simple(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> FilterExpr {
    FilterExpr::Simple(Filter::new(field, op, value))
}

/// Combine expressions with `AND`.
pub fn and(filters: Vec<FilterExpr>) -> FilterExpr {
    FilterExpr::Compound(CompoundFilter {
        op: LogicalOp::And,
        filters,
    })
}

/// Combine expressions with `OR`.
pub fn or(filters: Vec<FilterExpr>) -> FilterExpr {
    FilterExpr::Compound(CompoundFilter {
        op: LogicalOp::Or,
        filters,
    })
}

/// Negate an expression.
pub fn not(filter: FilterExpr) -> FilterExpr {
    FilterExpr::Compound(CompoundFilter {
        op: LogicalOp::Not,
        filters: vec![filter],
    })
}

/// Accumulates bound parameters while a statement is rendered.
///
/// Placeholder numbering follows the number of parameters already bound, so
/// SET values and WHERE operands share one sequence.
#[derive(Debug)]
pub(crate) struct ParamSink<D: Dialect> {
    dialect: D,
    params: Vec<Value>,
}

impl<D: Dialect> ParamSink<D> {
    pub(crate) const fn new(dialect: D) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    /// Bind one value and return its placeholder.
    pub(crate) fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.param(self.params.len())
    }

    fn next_idx(&self) -> usize {
        self.params.len() + 1
    }

    pub(crate) fn into_params(self) -> Vec<Value> {
        self.params
    }
}

/// Render filters joined by `AND`; `None` when there is nothing to render.
pub(crate) fn render_where<D: Dialect>(
    meta: &EntityMeta,
    filters: &[FilterExpr],
    sink: &mut ParamSink<D>,
) -> Result<Option<String>> {
    if filters.is_empty() {
        return Ok(None);
    }
    let conditions = filters
        .iter()
        .map(|expr| render_expr(meta, expr, sink))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(conditions.join(" AND ")))
}

fn render_expr<D: Dialect>(
    meta: &EntityMeta,
    expr: &FilterExpr,
    sink: &mut ParamSink<D>,
) -> Result<String> {
    match expr {
        FilterExpr::Simple(filter) => render_condition(meta, filter, sink),
        FilterExpr::Compound(compound) => {
            let mut conditions = compound
                .filters
                .iter()
                .map(|child| render_expr(meta, child, sink))
                .collect::<Result<Vec<_>>>()?;

            let joiner = match compound.op {
                LogicalOp::And => " AND ",
                LogicalOp::Or => " OR ",
                LogicalOp::Not => {
                    let inner = conditions.pop().unwrap_or_default();
                    return Ok(format!("NOT ({inner})"));
                },
            };
            Ok(match conditions.len() {
                0 => String::new(),
                1 => conditions.remove(0),
                _ => format!("({})", conditions.join(joiner)),
            })
        },
    }
}

fn render_condition<D: Dialect>(
    meta: &EntityMeta,
    filter: &Filter,
    sink: &mut ParamSink<D>,
) -> Result<String> {
    let idx = meta.resolve(&filter.field)?;
    let column = meta
        .field_at(idx)
        .map(|f| f.column.as_str())
        .unwrap_or_default();

    let sql = match (filter.op, &filter.value) {
        (Operator::Eq, Value::Null) => format!("{column} IS NULL"),
        (Operator::Ne, Value::Null) => format!("{column} IS NOT NULL"),

        (Operator::In, Value::Array(values)) => {
            let (sql, params) = sink.dialect.in_clause(column, values, sink.next_idx());
            sink.params.extend(params);
            sql
        },
        (Operator::NotIn, Value::Array(values)) => {
            let (sql, params) = sink.dialect.not_in_clause(column, values, sink.next_idx());
            sink.params.extend(params);
            sql
        },

        (Operator::Between, Value::Array(values)) => match values.as_slice() {
            [low, high] => {
                let low = sink.bind(low.clone());
                let high = sink.bind(high.clone());
                format!("{column} BETWEEN {low} AND {high}")
            },
            // Matches nothing rather than everything
            other => format!("1=0 /* BETWEEN requires 2 values, got {} */", other.len()),
        },

        (op, value) => {
            let placeholder = sink.bind(value.clone());
            format!("{column} {} {placeholder}", op.symbol())
        },
    };
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Postgres, Sqlite};

    fn meta() -> EntityMeta {
        EntityMeta::new("accounts")
            .primary_key("id")
            .field_with_column("balance", "balance_cents")
            .field("owner")
    }

    fn render<D: Dialect>(dialect: D, filters: &[FilterExpr]) -> (Option<String>, Vec<Value>) {
        let mut sink = ParamSink::new(dialect);
        let sql = render_where(&meta(), filters, &mut sink).unwrap();
        (sql, sink.into_params())
    }

    #[test]
    fn test_no_filters_renders_nothing() {
        assert_eq!(render(Postgres, &[]).0, None);
    }

    #[test]
    fn test_field_maps_to_column() {
        let (sql, params) = render(Postgres, &[simple("balance", Operator::Lt, 0)]);
        assert_eq!(sql.as_deref(), Some("balance_cents < $1"));
        assert_eq!(params, vec![Value::Int(0)]);
    }

    #[test]
    fn test_null_comparisons_bind_nothing() {
        let (sql, params) = render(
            Sqlite,
            &[
                simple("owner", Operator::Eq, Value::Null),
                simple("balance", Operator::Ne, Value::Null),
            ],
        );
        assert_eq!(
            sql.as_deref(),
            Some("owner IS NULL AND balance_cents IS NOT NULL")
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_compound_numbering_is_sequential() {
        let expr = or(vec![
            simple("id", Operator::In, Value::Array(vec![1.into(), 2.into()])),
            and(vec![
                simple("owner", Operator::Like, "a%"),
                not(simple("balance", Operator::Gte, 10)),
            ]),
        ]);
        let (sql, params) = render(Sqlite, &[expr]);
        assert_eq!(
            sql.as_deref(),
            Some("(id IN (?1, ?2) OR (owner LIKE ?3 AND NOT (balance_cents >= ?4)))")
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_single_child_compound_has_no_parens() {
        let (sql, _) = render(Postgres, &[and(vec![simple("id", Operator::Eq, 1)])]);
        assert_eq!(sql.as_deref(), Some("id = $1"));
    }

    #[test]
    fn test_between_requires_two_values() {
        let (sql, params) = render(
            Postgres,
            &[simple("balance", Operator::Between, Value::Array(vec![1.into()]))],
        );
        assert!(sql.unwrap().starts_with("1=0"));
        assert!(params.is_empty());

        let (sql, params) = render(
            Postgres,
            &[simple(
                "balance",
                Operator::Between,
                Value::Array(vec![1.into(), 9.into()]),
            )],
        );
        assert_eq!(sql.as_deref(), Some("balance_cents BETWEEN $1 AND $2"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_postgres_in_binds_single_array() {
        let (sql, params) = render(
            Postgres,
            &[simple("id", Operator::NotIn, Value::Array(vec![1.into(), 2.into()]))],
        );
        assert_eq!(sql.as_deref(), Some("id != ALL($1)"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_unknown_field_is_error() {
        let mut sink = ParamSink::new(Postgres);
        let result = render_where(&meta(), &[simple("nope", Operator::Eq, 1)], &mut sink);
        assert!(result.is_err());
    }
}
