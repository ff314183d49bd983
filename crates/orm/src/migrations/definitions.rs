//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the types shared by the discoverer, the ledger and the runner.

use chrono::{DateTime, Utc};
use glimpse_core::MigrationsConfig;
use std::path::PathBuf;
use std::time::Duration;

/// A schema script read from the migrations directory.
///
/// Built fresh on every run and never persisted; the ledger stores only its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    /// File name, e.g. `0001_create_users.sql`. Uniqueness and sort key.
    pub name: String,
    /// Statement text, executed verbatim
    pub body: String,
}

/// One row of the ledger table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub name: String,
    /// Assigned by the store at insert time
    pub applied_at: DateTime<Utc>,
}

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Table name for tracking migrations
    pub migrations_table: String,
    /// File extension that marks a migration script, without the dot
    pub extension: String,
    /// Deadline for a whole run
    pub timeout: Option<Duration>,
}

impl MigrationConfig {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            migrations_table: "migrations".to_string(),
            extension: "sql".to_string(),
            timeout: None,
        }
    }
}

impl From<&MigrationsConfig> for MigrationConfig {
    fn from(config: &MigrationsConfig) -> Self {
        Self {
            migrations_dir: config.dir.clone(),
            migrations_table: config.table.clone(),
            extension: config.extension.clone(),
            timeout: config.timeout(),
        }
    }
}

/// Result of running migrations
#[derive(Debug, Default)]
pub struct MigrationRunResult {
    /// Names of migrations applied by this run, in order
    pub applied_migrations: Vec<String>,
    /// Names of discovered migrations already in the ledger
    pub skipped_migrations: Vec<String>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied_migrations.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped_migrations.len()
    }
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied {
        /// When it was applied
        applied_at: DateTime<Utc>,
    },
    /// Recorded in the ledger but no longer present on disk
    Orphaned {
        applied_at: DateTime<Utc>,
    },
}

/// Status line for one migration, as reported by `MigrationRunner::status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatusEntry {
    pub name: String,
    pub status: MigrationStatus,
}
