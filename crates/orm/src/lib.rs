//! # glimpse-orm: Database Layer for Glimpse
//!
//! Connection pooling for PostgreSQL and SQLite, and a forward-only schema
//! migration engine that records applied scripts in a ledger table.

pub mod backends;
pub mod database;
pub mod error;
pub mod migrations;

// Re-export core traits and types
pub use backends::{DatabaseBackendType, MigrationStore, SqlDialect, StoreTransaction};
pub use database::{connect, connect_postgres, connect_sqlite, PoolConfig};
pub use error::*;
pub use migrations::{
    run_migrations, MigrationConfig, MigrationManager, MigrationRecord, MigrationRunResult,
    MigrationRunner, MigrationScript, MigrationStatus, MigrationStatusEntry,
};
