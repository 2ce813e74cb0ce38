//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use update_returning::{Entity, EntityMeta, Result, RowValues, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub balance: i64,
}

impl Entity for Account {
    fn meta() -> EntityMeta {
        EntityMeta::new("accounts")
            .primary_key("id")
            .field("owner")
            .field_with_column("balance", "balance_cents")
    }

    fn from_values(mut values: RowValues) -> Result<Self> {
        Ok(Self {
            id: values.next_value()?,
            owner: values.next_value()?,
            balance: values.next_value()?,
        })
    }
}

pub const SCHEMA: &str = "
    CREATE TABLE accounts (
        id INTEGER PRIMARY KEY,
        owner TEXT NOT NULL,
        balance_cents INTEGER NOT NULL
    );
";

/// Route `tracing` output through the test harness. Honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory database with `accounts` rows `(1, ann, -5)`, `(2, bob, -10)`,
/// `(3, cy, -1)` and `(4, dee, 7)`.
pub fn accounts_db() -> SqliteConnection {
    init_tracing();
    let mut conn = SqliteConnection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn.execute_batch(
        "INSERT INTO accounts (id, owner, balance_cents) VALUES
            (1, 'ann', -5), (2, 'bob', -10), (3, 'cy', -1), (4, 'dee', 7);",
    )
    .unwrap();
    conn
}

/// Balance of account `id`, read straight from the table.
pub fn balance_of(conn: &SqliteConnection, id: i64) -> i64 {
    conn.raw()
        .query_row(
            "SELECT balance_cents FROM accounts WHERE id = ?1",
            [id],
            |row| row.get(0),
        )
        .unwrap()
}

/// Sorted ids from a list of integer values.
pub fn sorted_ids(values: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = values.into_iter().collect();
    ids.sort_unstable();
    ids
}
