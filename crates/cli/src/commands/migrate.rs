use anyhow::Context;
use glimpse_core::AppConfig;
use glimpse_orm::{connect, MigrationConfig, MigrationManager, MigrationRunner, MigrationStatus};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub async fn run(config: &AppConfig, dir: Option<PathBuf>, timeout: Option<u64>) -> anyhow::Result<()> {
    let migration_config = migration_config(config, dir, timeout);

    let store = connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    let runner = MigrationRunner::new(store.clone(), migration_config)?;

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let result = runner.run_until_cancelled(cancel).await;
    interrupt.abort();
    store.close().await;

    let result = result?;
    if result.applied_migrations.is_empty() {
        println!("Nothing to migrate");
    } else {
        for name in &result.applied_migrations {
            println!("Migrated: {}", name);
        }
    }
    println!(
        "{} applied, {} already up to date ({} ms)",
        result.applied_count(),
        result.skipped_count(),
        result.execution_time_ms
    );
    Ok(())
}

pub async fn status(config: &AppConfig, dir: Option<PathBuf>) -> anyhow::Result<()> {
    let migration_config = migration_config(config, dir, None);

    let store = connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    let runner = MigrationRunner::new(store.clone(), migration_config)?;
    let entries = runner.status().await;
    store.close().await;
    let entries = entries?;

    println!("Migration Status:");
    println!("================");

    if entries.is_empty() {
        println!("No migrations found");
        return Ok(());
    }

    let mut pending = 0;
    for entry in &entries {
        match &entry.status {
            MigrationStatus::Applied { applied_at } => {
                println!("  [applied  {}] {}", applied_at.format("%Y-%m-%d %H:%M:%S"), entry.name);
            }
            MigrationStatus::Pending => {
                pending += 1;
                println!("  [pending{:>21}] {}", "", entry.name);
            }
            MigrationStatus::Orphaned { applied_at } => {
                println!(
                    "  [orphaned {}] {} (file missing)",
                    applied_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.name
                );
            }
        }
    }
    println!("\n{} pending", pending);

    Ok(())
}

pub fn create(config: &AppConfig, name: &str, dir: Option<PathBuf>) -> anyhow::Result<()> {
    let manager = MigrationManager::with_config(migration_config(config, dir, None));
    let path = manager.create_migration(name)?;

    println!("Created migration: {}", path.display());
    Ok(())
}

/// Command-line flags win over the config file
fn migration_config(config: &AppConfig, dir: Option<PathBuf>, timeout: Option<u64>) -> MigrationConfig {
    let mut migration_config = MigrationConfig::from(&config.migrations);
    if let Some(dir) = dir {
        migration_config.migrations_dir = dir;
    }
    if let Some(secs) = timeout {
        migration_config.timeout = Some(Duration::from_secs(secs));
    }
    migration_config
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Interrupt received, rolling back the migration in progress");
        cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config_file() {
        let mut config = AppConfig::default();
        config.migrations.dir = PathBuf::from("migrations");
        config.migrations.timeout_secs = Some(600);

        let merged = migration_config(&config, Some(PathBuf::from("db/schema")), Some(5));
        assert_eq!(merged.migrations_dir, PathBuf::from("db/schema"));
        assert_eq!(merged.timeout, Some(Duration::from_secs(5)));

        let untouched = migration_config(&config, None, None);
        assert_eq!(untouched.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(untouched.timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_create_writes_into_configured_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.migrations.dir = temp_dir.path().join("migrations");

        create(&config, "create comments", None).unwrap();

        let files: Vec<_> = std::fs::read_dir(temp_dir.path().join("migrations"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("_create_comments.sql"));
    }
}
