//! Property-based tests using proptest.
//!
//! These generate random identifiers, assignment sequences and projections
//! to find edge cases that manual tests might miss.

mod common;

use std::sync::Arc;

use common::Account;
use proptest::prelude::*;
use update_returning::{
    Entity, ProjectionMode, Query, RawRow, ResultObject, ResultProjector, ReturningUpdateCompiler,
    Sqlite, UpdateCompiler, Value, is_valid_sql_identifier,
};

const FIELDS: [&str; 3] = ["id", "owner", "balance"];

// =============================================================================
// SQL Identifier Property Tests
// =============================================================================

proptest! {
    /// Valid identifiers should always pass validation
    #[test]
    fn valid_identifiers_always_pass(s in "[a-zA-Z_][a-zA-Z0-9_]{0,62}") {
        prop_assert!(is_valid_sql_identifier(&s), "Valid identifier should pass: {}", s);
    }

    /// Identifiers starting with numbers should fail
    #[test]
    fn numeric_start_always_fails(prefix in "[0-9]+", suffix in "[a-zA-Z_][a-zA-Z0-9_]*") {
        let ident = format!("{prefix}{suffix}");
        prop_assert!(!is_valid_sql_identifier(&ident), "Should fail: {}", ident);
    }

    /// Identifiers with special characters should fail
    #[test]
    fn special_chars_fail(
        prefix in "[a-zA-Z][a-zA-Z0-9_]{0,10}",
        special in r"[!@#$%^&*()\-+=\[\]{};:,.<>/?\\|`~ ]",
        suffix in "[a-zA-Z0-9_]{0,10}"
    ) {
        let ident = format!("{prefix}{special}{suffix}");
        prop_assert!(!is_valid_sql_identifier(&ident), "Should fail: {}", ident);
    }

    /// Very long identifiers should fail (>63 chars)
    #[test]
    fn long_identifiers_fail(s in "[a-zA-Z][a-zA-Z0-9_]{63,100}") {
        prop_assert!(!is_valid_sql_identifier(&s));
    }
}

// =============================================================================
// Assignment Merge Properties
// =============================================================================

proptest! {
    /// Each field keeps its first SET position and its last value
    #[test]
    fn last_write_wins_first_position_kept(
        writes in prop::collection::vec((0usize..3, any::<i64>()), 1..20)
    ) {
        let mut query = Query::<Account>::new();
        for (field, value) in &writes {
            query.add_update_values([(FIELDS[*field], *value)]).unwrap();
        }

        let mut expected: Vec<(String, Value)> = Vec::new();
        for (field, value) in &writes {
            let name = FIELDS[*field];
            match expected.iter_mut().find(|(f, _)| f == name) {
                Some(slot) => slot.1 = Value::Int(*value),
                None => expected.push((name.to_string(), Value::Int(*value))),
            }
        }
        prop_assert_eq!(query.assignments(), expected.as_slice());
    }

    /// The returning statement is the plain UPDATE plus a column list
    #[test]
    fn returning_extends_plain_update(
        picks in prop::collection::vec(0usize..3, 0..5),
        value in any::<i64>()
    ) {
        let fields: Vec<&str> = picks.iter().map(|i| FIELDS[*i]).collect();
        let mut query = Query::<Account>::new().values(&fields);
        query.add_update_values([("balance", value)]).unwrap();

        let plain = UpdateCompiler::new(&query, Sqlite).compile().unwrap();
        let returning = ReturningUpdateCompiler::new(&query, Sqlite).unwrap().compile().unwrap();
        let columns = query.selected_columns().unwrap().join(", ");

        prop_assert_eq!(returning.sql, format!("{} RETURNING {columns}", plain.sql));
        prop_assert_eq!(returning.params, plain.params);
    }
}

// =============================================================================
// Projection Properties
// =============================================================================

proptest! {
    /// Only a single flat field collapses to a bare value
    #[test]
    fn scalar_iff_single_flat_field(
        picks in prop::collection::vec(0usize..3, 1..4),
        flat in any::<bool>(),
        seed in any::<i64>()
    ) {
        let fields: Vec<String> = picks.iter().map(|i| FIELDS[*i].to_string()).collect();
        let width = fields.len();
        let mode = ProjectionMode::TupleOrScalar { fields, flat };
        let projector =
            ResultProjector::<Account>::build(&mode, Arc::new(Account::meta()), "default").unwrap();

        let row: Vec<Value> = (0..width).map(|i| Value::Int(seed.wrapping_add(i as i64))).collect();
        match projector.project(RawRow::new(row.clone())).unwrap() {
            ResultObject::Scalar(value) => {
                prop_assert!(flat && width == 1);
                prop_assert_eq!(value, Value::Int(seed));
            },
            ResultObject::Tuple(values) => {
                prop_assert!(!(flat && width == 1));
                prop_assert_eq!(values, row);
            },
            other => prop_assert!(false, "unexpected result {:?}", other),
        }
    }

    /// Rows of any other length are rejected, never padded or truncated
    #[test]
    fn wrong_width_rows_rejected(len in 0usize..8) {
        prop_assume!(len != 3);
        let projector = ResultProjector::<Account>::build(
            &ProjectionMode::FullEntity,
            Arc::new(Account::meta()),
            "default",
        ).unwrap();
        let row = RawRow::new(vec![Value::Null; len]);
        prop_assert!(projector.project(row).is_err());
    }
}
