//! # glimpse-core
//!
//! Configuration loading and logging bootstrap shared by the Glimpse crates.
//! Nothing in here talks to the database; see `glimpse-orm` for that.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, ConfigError, ConfigSource, DatabaseConfig, EnvOverride, LoggingSettings,
    MigrationsConfig,
};
pub use logging::{init_logging, LogFormat, LoggingConfig};

