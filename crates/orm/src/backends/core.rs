//! Core Database Backend Traits
//!
//! The migration engine only needs a handful of operations from the database,
//! so the abstraction is deliberately narrow: pool-level execute and query,
//! and a transaction handle that is exclusively owned by whoever began it.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreResult;
use crate::migrations::definitions::MigrationRecord;

/// SQL dialect, used to pick DDL and placeholder syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    SQLite,
}

impl SqlDialect {
    /// Positional placeholder for the n-th bound parameter (1-based)
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index),
            SqlDialect::SQLite => format!("?{}", index),
        }
    }
}

/// Pool-level handle to the target database
#[async_trait]
pub trait MigrationStore: Send + Sync {
    fn dialect(&self) -> SqlDialect;

    /// Execute a statement outside any explicit transaction
    async fn execute(&self, sql: &str) -> StoreResult<()>;

    /// Run a query whose first two columns are `name` and `applied_at`
    async fn fetch_records(&self, sql: &str) -> StoreResult<Vec<MigrationRecord>>;

    /// Begin a transaction. Dropping the handle without `commit` rolls it back.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Round-trip a trivial query, returning how long it took
    async fn ping(&self) -> StoreResult<Duration>;

    /// Close the pool
    async fn close(&self);
}

/// An open transaction
#[async_trait]
pub trait StoreTransaction: Send {
    /// Execute raw statement text verbatim; it may contain several statements
    async fn execute_batch(&mut self, sql: &str) -> StoreResult<()>;

    /// Execute a single statement with positional text parameters
    async fn execute_with(&mut self, sql: &str, params: &[&str]) -> StoreResult<u64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
