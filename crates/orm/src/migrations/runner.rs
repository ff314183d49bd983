//! Migration Runner - Executes migrations against the database
//!
//! Each pending script runs in its own transaction together with its ledger
//! insert, so a script is either fully applied and recorded or not at all.
//! The first failure stops the run; later scripts are left untouched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cancel::RunGuard;
use super::definitions::{
    MigrationConfig, MigrationRunResult, MigrationScript, MigrationStatus, MigrationStatusEntry,
};
use super::ledger::Ledger;
use super::manager::MigrationManager;
use crate::backends::{MigrationStore, StoreTransaction};
use crate::error::{MigrationError, MigrationPhase, MigrationResult, StoreError};

/// Migration runner that executes migrations against a database
pub struct MigrationRunner {
    store: Arc<dyn MigrationStore>,
    manager: MigrationManager,
    ledger: Ledger,
}

impl MigrationRunner {
    /// Create a new migration runner
    pub fn new(store: Arc<dyn MigrationStore>, config: MigrationConfig) -> MigrationResult<Self> {
        let ledger = Ledger::new(config.migrations_table.clone())?;
        Ok(Self {
            store,
            manager: MigrationManager::with_config(config),
            ledger,
        })
    }

    /// Get the store migrations run against
    pub fn store(&self) -> &Arc<dyn MigrationStore> {
        &self.store
    }

    /// Get the migration manager
    pub fn manager(&self) -> &MigrationManager {
        &self.manager
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Run all pending migrations
    pub async fn run_migrations(&self) -> MigrationResult<MigrationRunResult> {
        self.run_until_cancelled(CancellationToken::new()).await
    }

    /// Run all pending migrations, stopping early if `cancel` fires or the
    /// configured timeout passes. An interrupted script is rolled back.
    pub async fn run_until_cancelled(
        &self,
        cancel: CancellationToken,
    ) -> MigrationResult<MigrationRunResult> {
        let start_time = Instant::now();
        let guard = RunGuard::new(cancel, self.manager.config().timeout);
        let store = self.store.as_ref();

        info!(
            dir = %self.manager.config().migrations_dir.display(),
            table = %self.ledger.table(),
            "Running database migrations"
        );

        guard.run(None, self.ledger.ensure(store)).await??;
        let applied = guard.run(None, self.ledger.applied_names(store)).await??;
        let scripts = self.manager.discover_scripts()?;

        let mut result = self.apply(&scripts, &applied, &guard).await?;
        result.execution_time_ms = start_time.elapsed().as_millis();

        info!(
            applied = result.applied_count(),
            skipped = result.skipped_count(),
            elapsed_ms = result.execution_time_ms as u64,
            "All migrations applied successfully"
        );
        Ok(result)
    }

    /// Apply `scripts` in the given order, skipping names in `applied`
    async fn apply(
        &self,
        scripts: &[MigrationScript],
        applied: &HashSet<String>,
        guard: &RunGuard,
    ) -> MigrationResult<MigrationRunResult> {
        let mut result = MigrationRunResult::default();

        for script in scripts {
            if applied.contains(&script.name) {
                debug!("Migration {} already applied, skipping", script.name);
                result.skipped_migrations.push(script.name.clone());
                continue;
            }

            guard.check(Some(&script.name))?;

            info!("Applying migration: {}", script.name);
            let started = Instant::now();
            self.apply_script(script, guard).await?;
            info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Successfully applied migration: {}", script.name
            );

            result.applied_migrations.push(script.name.clone());
        }

        Ok(result)
    }

    /// Execute one script and record it, in a single transaction
    async fn apply_script(&self, script: &MigrationScript, guard: &RunGuard) -> MigrationResult<()> {
        let name = script.name.as_str();

        let mut tx = guard
            .run(Some(name), self.store.begin())
            .await?
            .map_err(|source| execution_error(name, MigrationPhase::Begin, source))?;

        if let Err(err) = self.execute_and_record(&mut *tx, script, guard).await {
            rollback(tx, name).await;
            return Err(err);
        }

        // Not raced against cancellation: once the commit is sent its outcome
        // belongs to the store, and dropping it midway would only hide that outcome.
        tx.commit()
            .await
            .map_err(|source| execution_error(name, MigrationPhase::Commit, source))
    }

    async fn execute_and_record(
        &self,
        tx: &mut dyn StoreTransaction,
        script: &MigrationScript,
        guard: &RunGuard,
    ) -> MigrationResult<()> {
        let name = script.name.as_str();

        if script.body.trim().is_empty() {
            debug!("Migration {} has no statements", name);
        } else {
            guard
                .run(Some(name), tx.execute_batch(&script.body))
                .await?
                .map_err(|source| execution_error(name, MigrationPhase::Execute, source))?;
        }

        guard
            .run(
                Some(name),
                self.ledger.record(tx, self.store.dialect(), name),
            )
            .await?
            .map_err(|source| execution_error(name, MigrationPhase::Record, source))
    }

    /// Status of every discovered script, followed by ledger entries whose file
    /// is gone. Creates the ledger table if it does not exist yet.
    pub async fn status(&self) -> MigrationResult<Vec<MigrationStatusEntry>> {
        let store = self.store.as_ref();
        self.ledger.ensure(store).await?;
        let records = self.ledger.records(store).await?;
        let scripts = self.manager.discover_scripts()?;

        let mut applied_at: HashMap<&str, _> = records
            .iter()
            .map(|record| (record.name.as_str(), record.applied_at))
            .collect();

        let mut entries: Vec<MigrationStatusEntry> = scripts
            .iter()
            .map(|script| MigrationStatusEntry {
                name: script.name.clone(),
                status: match applied_at.remove(script.name.as_str()) {
                    Some(applied_at) => MigrationStatus::Applied { applied_at },
                    None => MigrationStatus::Pending,
                },
            })
            .collect();

        for record in &records {
            if applied_at.contains_key(record.name.as_str()) {
                warn!("Migration {} is recorded as applied but its file is missing", record.name);
                entries.push(MigrationStatusEntry {
                    name: record.name.clone(),
                    status: MigrationStatus::Orphaned {
                        applied_at: record.applied_at,
                    },
                });
            }
        }

        Ok(entries)
    }
}

fn execution_error(name: &str, phase: MigrationPhase, source: StoreError) -> MigrationError {
    MigrationError::Execution {
        name: name.to_string(),
        phase,
        source,
    }
}

/// Best-effort rollback; the caller's error is the one worth reporting
async fn rollback(tx: Box<dyn StoreTransaction>, name: &str) {
    match tx.rollback().await {
        Ok(()) => debug!("Rolled back migration {}", name),
        Err(e) => warn!("Failed to roll back migration {}: {}", name, e),
    }
}
