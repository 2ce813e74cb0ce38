//! SQL compilation: SELECT for the read path, UPDATE, and UPDATE ... RETURNING.
//!
//! All three derive their column lists from [`Query::selected_fields`], so a
//! returning update yields exactly the columns the equivalent read would.

use crate::connection::{Connection, RowCursor};
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::filter::{ParamSink, render_where};
use crate::query::{Query, SortDir};
use crate::value::Value;

/// Compiled SQL with bound parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "a statement does nothing until it is executed"]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Positional parameters.
    pub params: Vec<Value>,
}

impl Statement {
    /// Statement from raw parts.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SELECT
// ═══════════════════════════════════════════════════════════════════════════

/// Compiles the read path of a query.
#[derive(Debug)]
pub struct SelectCompiler<'q, E, D: Dialect> {
    query: &'q Query<E>,
    dialect: D,
}

impl<'q, E, D: Dialect> SelectCompiler<'q, E, D> {
    /// Compiler for `query` in `dialect`.
    pub const fn new(query: &'q Query<E>, dialect: D) -> Self {
        Self { query, dialect }
    }

    /// `SELECT <columns> FROM <table> [WHERE ...] [ORDER BY ...]`
    pub fn compile(&self) -> Result<Statement> {
        let meta = self.query.meta();
        let columns = self.query.selected_columns()?;
        let mut sink = ParamSink::new(self.dialect);

        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), meta.table());
        if let Some(clause) = render_where(meta, self.query.filters(), &mut sink)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }

        let ordering = self.query.ordering();
        if !ordering.is_empty() {
            let parts = ordering
                .iter()
                .map(|sort| -> Result<String> {
                    let idx = meta.resolve(&sort.field)?;
                    let column = meta.field_at(idx).map(|f| f.column.as_str()).unwrap_or_default();
                    let dir = match sort.dir {
                        SortDir::Asc => "ASC",
                        SortDir::Desc => "DESC",
                    };
                    Ok(format!("{column} {dir}"))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }

        Ok(Statement::new(sql, sink.into_params()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// UPDATE
// ═══════════════════════════════════════════════════════════════════════════

/// Compiles a plain UPDATE from a query's predicate and assignments.
#[derive(Debug)]
pub struct UpdateCompiler<'q, E, D: Dialect> {
    query: &'q Query<E>,
    dialect: D,
}

impl<'q, E, D: Dialect> UpdateCompiler<'q, E, D> {
    /// Compiler for `query` in `dialect`.
    pub const fn new(query: &'q Query<E>, dialect: D) -> Self {
        Self { query, dialect }
    }

    /// `UPDATE <table> SET <col> = <p>, ... [WHERE ...]`
    pub fn compile(&self) -> Result<Statement> {
        let (sql, sink) = self.render()?;
        Ok(Statement::new(sql, sink.into_params()))
    }

    fn render(&self) -> Result<(String, ParamSink<D>)> {
        let meta = self.query.meta();
        let assignments = self.query.assignments();
        if assignments.is_empty() {
            return Err(Error::EmptyUpdate);
        }

        let mut sink = ParamSink::new(self.dialect);
        let set_parts = assignments
            .iter()
            .map(|(field, value)| -> Result<String> {
                let idx = meta.resolve(field)?;
                let column = meta.field_at(idx).map(|f| f.column.as_str()).unwrap_or_default();
                Ok(format!("{column} = {}", sink.bind(value.clone())))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut sql = format!("UPDATE {} SET {}", meta.table(), set_parts.join(", "));
        if let Some(clause) = render_where(meta, self.query.filters(), &mut sink)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        Ok((sql, sink))
    }

    /// Compile and run, returning the affected row count.
    pub fn execute<C>(&self, conn: &mut C) -> Result<usize>
    where
        C: Connection<Dialect = D>,
    {
        let stmt = self.compile()?;
        tracing::debug!(sql = %stmt.sql, params = stmt.params.len(), "executing update");
        conn.execute(&stmt)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// UPDATE ... RETURNING
// ═══════════════════════════════════════════════════════════════════════════

/// Compiles an UPDATE whose modified rows come back in the query's projection.
#[derive(Debug)]
pub struct ReturningUpdateCompiler<'q, E, D: Dialect> {
    update: UpdateCompiler<'q, E, D>,
}

impl<'q, E, D: Dialect> ReturningUpdateCompiler<'q, E, D> {
    /// Compiler for `query` in `dialect`.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedEngine`] when the dialect has no row-returning
    /// UPDATE.
    pub fn new(query: &'q Query<E>, dialect: D) -> Result<Self> {
        if !dialect.supports_returning() {
            return Err(Error::UnsupportedEngine {
                dialect: dialect.name(),
            });
        }
        Ok(Self {
            update: UpdateCompiler::new(query, dialect),
        })
    }

    /// The UPDATE text followed by ` RETURNING <columns>`, columns in
    /// projection order. Parameters are exactly those of the plain UPDATE.
    pub fn compile(&self) -> Result<Statement> {
        let columns = self.update.query.selected_columns()?;
        let (mut sql, sink) = self.update.render()?;
        sql.push_str(" RETURNING ");
        sql.push_str(&columns.join(", "));
        Ok(Statement::new(sql, sink.into_params()))
    }

    /// Compile and run in multi-row mode.
    pub fn execute<C>(&self, conn: &mut C) -> Result<RowCursor>
    where
        C: Connection<Dialect = D>,
    {
        let stmt = self.compile()?;
        tracing::debug!(
            dialect = self.update.dialect.name(),
            sql = %stmt.sql,
            params = stmt.params.len(),
            "executing returning update"
        );
        conn.execute_multi(&stmt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Mysql, Postgres, Sqlite};
    use crate::filter::Operator;
    use crate::model::{Entity, EntityMeta};
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

    fn bump(query: Query<Account>) -> Query<Account> {
        let mut query = query;
        query.add_update_values([("balance", 10)]).unwrap();
        query
    }

    #[test]
    fn test_select_full_entity() {
        let query = Query::<Account>::new()
            .filter("owner", Operator::Eq, "ann")
            .order_by("id", SortDir::Desc);
        let stmt = SelectCompiler::new(&query, Sqlite).compile().unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT id, owner, balance_cents FROM accounts WHERE owner = ?1 ORDER BY id DESC"
        );
        assert_eq!(stmt.params, vec![Value::String("ann".into())]);
    }

    #[test]
    fn test_update_numbers_set_before_where() {
        let query = bump(Query::new().filter("id", Operator::Gt, 1));
        let stmt = UpdateCompiler::new(&query, Postgres).compile().unwrap();
        assert_eq!(stmt.sql, "UPDATE accounts SET balance_cents = $1 WHERE id > $2");
        assert_eq!(stmt.params, vec![Value::Int(10), Value::Int(1)]);
    }

    #[test]
    fn test_update_without_assignments_fails() {
        let query = Query::<Account>::new();
        assert!(matches!(
            UpdateCompiler::new(&query, Sqlite).compile(),
            Err(Error::EmptyUpdate)
        ));
    }

    #[test]
    fn test_returning_appends_projection_columns() {
        let query = bump(Query::new().values(&["balance", "id"]));
        let plain = UpdateCompiler::new(&query, Sqlite).compile().unwrap();
        let returning = ReturningUpdateCompiler::new(&query, Sqlite)
            .unwrap()
            .compile()
            .unwrap();
        assert_eq!(
            returning.sql,
            format!("{} RETURNING balance_cents, id", plain.sql)
        );
        assert_eq!(returning.params, plain.params);
    }

    #[test]
    fn test_returning_partial_entity_includes_pk() {
        let query = bump(Query::new().only(&["owner"]));
        let stmt = ReturningUpdateCompiler::new(&query, Postgres)
            .unwrap()
            .compile()
            .unwrap();
        assert!(stmt.sql.ends_with(" RETURNING id, owner"));
    }

    #[test]
    fn test_returning_rejected_without_engine_support() {
        let query = bump(Query::new());
        assert!(matches!(
            ReturningUpdateCompiler::new(&query, Mysql),
            Err(Error::UnsupportedEngine { dialect: "mysql" })
        ));
    }
}
