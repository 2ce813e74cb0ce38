//! SQL dialect implementations for Postgres, `SQLite` and `MySQL`.
//!
//! Each dialect handles placeholder syntax, list expansion for `IN`, and
//! reports whether the engine can attach `RETURNING` to an UPDATE.

use crate::Value;

/// SQL dialect trait for database-specific syntax.
pub trait Dialect: Clone + Copy + std::fmt::Debug {
    /// Short engine name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Format a parameter placeholder (e.g., `$1` for Postgres, `?1` for `SQLite`).
    fn param(&self, idx: usize) -> String;

    /// Format an IN clause with multiple values.
    /// Returns the SQL fragment (e.g., `= ANY($1)` or `IN (?1, ?2)`) and the
    /// parameters it binds.
    fn in_clause(&self, column: &str, values: &[Value], start_idx: usize) -> (String, Vec<Value>);

    /// Format a NOT IN clause.
    fn not_in_clause(
        &self,
        column: &str,
        values: &[Value],
        start_idx: usize,
    ) -> (String, Vec<Value>);

    /// Whether `UPDATE ... RETURNING` is available.
    fn supports_returning(&self) -> bool;
}

/// Expand a list into one placeholder per value.
fn expanded_list<D: Dialect>(
    dialect: &D,
    column: &str,
    keyword: &str,
    values: &[Value],
    start_idx: usize,
) -> (String, Vec<Value>) {
    let placeholders: Vec<String> = (0..values.len())
        .map(|i| dialect.param(start_idx + i))
        .collect();
    let sql = format!("{column} {keyword} ({})", placeholders.join(", "));
    (sql, values.to_vec())
}

/// Postgres dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    #[inline]
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("${idx}")
    }

    fn in_clause(&self, column: &str, values: &[Value], start_idx: usize) -> (String, Vec<Value>) {
        // Postgres: column = ANY($1) with array parameter
        let sql = format!("{column} = ANY(${start_idx})");
        (sql, vec![Value::Array(values.to_vec())])
    }

    fn not_in_clause(
        &self,
        column: &str,
        values: &[Value],
        start_idx: usize,
    ) -> (String, Vec<Value>) {
        let sql = format!("{column} != ALL(${start_idx})");
        (sql, vec![Value::Array(values.to_vec())])
    }

    #[inline]
    fn supports_returning(&self) -> bool {
        true
    }
}

/// `SQLite` dialect. `RETURNING` needs `SQLite` 3.35 or newer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    #[inline]
    fn name(&self) -> &'static str {
        "sqlite"
    }

    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("?{idx}")
    }

    fn in_clause(&self, column: &str, values: &[Value], start_idx: usize) -> (String, Vec<Value>) {
        expanded_list(self, column, "IN", values, start_idx)
    }

    fn not_in_clause(
        &self,
        column: &str,
        values: &[Value],
        start_idx: usize,
    ) -> (String, Vec<Value>) {
        expanded_list(self, column, "NOT IN", values, start_idx)
    }

    #[inline]
    fn supports_returning(&self) -> bool {
        true
    }
}

/// `MySQL` dialect. Positional `?` placeholders, no `RETURNING` on UPDATE.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mysql;

impl Dialect for Mysql {
    #[inline]
    fn name(&self) -> &'static str {
        "mysql"
    }

    #[inline]
    fn param(&self, _idx: usize) -> String {
        "?".to_string()
    }

    fn in_clause(&self, column: &str, values: &[Value], start_idx: usize) -> (String, Vec<Value>) {
        expanded_list(self, column, "IN", values, start_idx)
    }

    fn not_in_clause(
        &self,
        column: &str,
        values: &[Value],
        start_idx: usize,
    ) -> (String, Vec<Value>) {
        expanded_list(self, column, "NOT IN", values, start_idx)
    }

    #[inline]
    fn supports_returning(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_params() {
        let pg = Postgres;
        assert_eq!(pg.param(1), "$1");
        assert_eq!(pg.param(10), "$10");
    }

    #[test]
    fn test_sqlite_params() {
        let sqlite = Sqlite;
        assert_eq!(sqlite.param(1), "?1");
        assert_eq!(sqlite.param(10), "?10");
    }

    #[test]
    fn test_mysql_params_are_positional() {
        assert_eq!(Mysql.param(1), "?");
        assert_eq!(Mysql.param(7), "?");
    }

    #[test]
    fn test_postgres_in_clause() {
        let values = vec![Value::Int(1), Value::Int(2)];
        let (sql, params) = Postgres.in_clause("id", &values, 1);

        assert_eq!(sql, "id = ANY($1)");
        assert_eq!(params.len(), 1); // Single array param
    }

    #[test]
    fn test_sqlite_in_clause() {
        let values = vec![Value::Int(1), Value::Int(2)];
        let (sql, params) = Sqlite.in_clause("id", &values, 3);

        assert_eq!(sql, "id IN (?3, ?4)");
        assert_eq!(params.len(), 2); // Expanded params
    }

    #[test]
    fn test_returning_capability() {
        assert!(Postgres.supports_returning());
        assert!(Sqlite.supports_returning());
        assert!(!Mysql.supports_returning());
    }
}
