mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glimpse_core::config::DEFAULT_CONFIG_PATH;
use glimpse_core::{init_logging, AppConfig, LoggingConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use commands::migrate;

#[derive(Parser)]
#[command(name = "glimpse")]
#[command(about = "Glimpse database tooling")]
#[command(version)]
struct Cli {
    /// Path to the YAML config file (default: configs/config.yaml if present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration management
    Migrate {
        #[command(subcommand)]
        migrate_command: Option<MigrateCommands>,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run pending migrations
    Run {
        /// Migrations directory, overriding the config file
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Abort the run after this many seconds
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
    },

    /// Show migration status
    Status {
        /// Migrations directory, overriding the config file
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Create a new migration
    Create {
        /// Migration name
        name: String,

        /// Migrations directory, overriding the config file
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let logging_ready = match init_logging(LoggingConfig::from_settings(&config.logging)) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            false
        }
    };

    for (setting, source) in config.config_sources() {
        tracing::debug!(setting, source = %source, "Configuration source");
    }

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(message) = report_failure(&e, logging_ready) {
                eprintln!("Error: {}", message);
            }
            ExitCode::FAILURE
        }
    }
}

/// Log a fatal error, or hand it back for stderr when no subscriber is installed
fn report_failure(err: &anyhow::Error, logging_ready: bool) -> Option<String> {
    let message = format!("{:#}", err);
    if logging_ready {
        tracing::error!("{}", message);
        None
    } else {
        Some(message)
    }
}

async fn run(command: Commands, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::Migrate { migrate_command } => {
            match migrate_command.unwrap_or(MigrateCommands::Run { dir: None, timeout: None }) {
                MigrateCommands::Run { dir, timeout } => {
                    migrate::run(config, dir, timeout).await?;
                }
                MigrateCommands::Status { dir } => {
                    migrate::status(config, dir).await?;
                }
                MigrateCommands::Create { name, dir } => {
                    migrate::create(config, &name, dir)?;
                }
            }
        }
    }
    Ok(())
}

/// Explicit path, else the default file if it exists, else defaults plus environment
fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => AppConfig::load(DEFAULT_CONFIG_PATH)?,
        None => AppConfig::from_env().context("Invalid configuration from environment")?,
    };
    Ok(config)
}
