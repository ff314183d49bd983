//! Migration System
//!
//! Discovers `.sql` scripts in a directory, compares them with the ledger
//! table, and applies the pending ones in name order, one transaction each.

pub mod cancel;
pub mod definitions;
pub mod ledger;
pub mod manager;
pub mod runner;

use std::path::PathBuf;
use std::sync::Arc;

pub use cancel::RunGuard;
pub use definitions::*;
pub use ledger::Ledger;
pub use manager::{discover_scripts, MigrationManager};
pub use runner::MigrationRunner;

use crate::backends::MigrationStore;
use crate::error::MigrationResult;

/// Apply every pending script in `dir` using the default ledger table
pub async fn run_migrations(
    store: Arc<dyn MigrationStore>,
    dir: impl Into<PathBuf>,
) -> MigrationResult<MigrationRunResult> {
    MigrationRunner::new(store, MigrationConfig::new(dir))?
        .run_migrations()
        .await
}
