//! Migration Ledger - the table that records applied scripts
//!
//! One row per applied script, keyed by a unique `name`. The engine only ever
//! creates the table and appends to it; rows are never updated or deleted.

use glimpse_core::config::{ConfigValidator, IdentifierValidator};
use std::collections::HashSet;

use super::definitions::MigrationRecord;
use crate::backends::{MigrationStore, SqlDialect, StoreTransaction};
use crate::error::{LedgerOperation, MigrationError, MigrationResult, StoreError, StoreResult};

/// SQL and operations for the ledger table
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    /// The table name is interpolated into SQL, so it must be a plain identifier
    pub fn new(table: impl Into<String>) -> MigrationResult<Self> {
        let table = table.into();
        IdentifierValidator {
            field: "migrations table",
        }
        .validate(table.as_str())
        .map_err(|e| MigrationError::Configuration(e.to_string()))?;
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger if it does not exist. Safe to call on every run.
    pub async fn ensure(&self, store: &dyn MigrationStore) -> MigrationResult<()> {
        store
            .execute(&self.create_table_sql(store.dialect()))
            .await
            .map_err(|source| MigrationError::Store {
                operation: LedgerOperation::Create,
                source,
            })?;
        tracing::debug!(table = %self.table, "Migrations ledger ready");
        Ok(())
    }

    /// All ledger rows in insertion order
    pub async fn records(&self, store: &dyn MigrationStore) -> MigrationResult<Vec<MigrationRecord>> {
        store
            .fetch_records(&self.select_records_sql())
            .await
            .map_err(|source| MigrationError::Store {
                operation: LedgerOperation::Query,
                source,
            })
    }

    /// Names of every applied script
    pub async fn applied_names(&self, store: &dyn MigrationStore) -> MigrationResult<HashSet<String>> {
        let records = self.records(store).await?;
        Ok(records.into_iter().map(|record| record.name).collect())
    }

    /// Append a row for `name` inside the script's own transaction
    pub async fn record(
        &self,
        tx: &mut dyn StoreTransaction,
        dialect: SqlDialect,
        name: &str,
    ) -> StoreResult<()> {
        let inserted = tx.execute_with(&self.insert_record_sql(dialect), &[name]).await?;
        if inserted != 1 {
            return Err(StoreError::Backend(format!(
                "Expected to insert 1 ledger row for {}, inserted {}",
                name, inserted
            )));
        }
        Ok(())
    }

    /// SQL to create the migrations tracking table
    pub fn create_table_sql(&self, dialect: SqlDialect) -> String {
        match dialect {
            SqlDialect::PostgreSQL => format!(
                "CREATE TABLE IF NOT EXISTS {} (\n    \
                    id SERIAL PRIMARY KEY,\n    \
                    name VARCHAR(255) NOT NULL UNIQUE,\n    \
                    applied_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()\n\
                )",
                self.table
            ),
            SqlDialect::SQLite => format!(
                "CREATE TABLE IF NOT EXISTS {} (\n    \
                    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
                    name TEXT NOT NULL UNIQUE,\n    \
                    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP\n\
                )",
                self.table
            ),
        }
    }

    /// SQL to get applied migrations
    pub fn select_records_sql(&self) -> String {
        format!("SELECT name, applied_at FROM {} ORDER BY id", self.table)
    }

    /// SQL to record a migration as applied
    pub fn insert_record_sql(&self, dialect: SqlDialect) -> String {
        format!(
            "INSERT INTO {} (name) VALUES ({})",
            self.table,
            dialect.placeholder(1)
        )
    }
}
