//! Database Integration - connection pool bootstrap
//!
//! Builds a sqlx pool from `DatabaseConfig`, bounded by the configured connect
//! timeout, and pings it before handing it out. A pool that cannot answer a
//! ping is reported as a connection error rather than returned half-usable.

use glimpse_core::DatabaseConfig;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::backends::{DatabaseBackendType, MigrationStore, PostgresStore, SqliteStore};
use crate::error::{StoreError, StoreResult};

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
            test_before_acquire: true,
        }
    }
}

impl From<&DatabaseConfig> for PoolConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.effective_max_connections(),
            acquire_timeout: config.connect_timeout(),
            ..Self::default()
        }
    }
}

/// Connect to whichever backend `config` points at and verify it answers
pub async fn connect(config: &DatabaseConfig) -> StoreResult<Arc<dyn MigrationStore>> {
    let backend = match &config.url {
        Some(url) => DatabaseBackendType::from_url(url).map_err(StoreError::Connection)?,
        None => DatabaseBackendType::PostgreSQL,
    };

    let store: Arc<dyn MigrationStore> = match backend {
        DatabaseBackendType::PostgreSQL => Arc::new(connect_postgres(config).await?),
        DatabaseBackendType::SQLite => {
            let url = config.url.as_deref().unwrap_or_default();
            let pool_config = PoolConfig::from(config);
            Arc::new(connect_sqlite(url, &pool_config, config.connect_timeout()).await?)
        }
    };

    let latency = store.ping().await.map_err(|e| {
        tracing::error!("Database ping failed: {}", e);
        StoreError::Connection(format!("Unable to ping database: {}", e))
    })?;

    tracing::info!(
        backend = %backend,
        target = %config.redacted_target(),
        ping_ms = latency.as_millis() as u64,
        "Successfully connected to database"
    );
    Ok(store)
}

/// Create a PostgreSQL pool from discrete fields or `config.url`
pub async fn connect_postgres(config: &DatabaseConfig) -> StoreResult<PostgresStore> {
    let options = postgres_options(config)?;
    let pool_config = PoolConfig::from(config);

    tracing::debug!(
        "Creating database pool with config: max={}, min={}, timeout={:?}, idle_timeout={:?}, max_lifetime={:?}",
        pool_config.max_connections,
        pool_config.min_connections,
        pool_config.acquire_timeout,
        pool_config.idle_timeout,
        pool_config.max_lifetime
    );

    let pool = with_connect_timeout(
        config.connect_timeout(),
        pg_pool_options(&pool_config).connect_with(options),
    )
    .await?;

    Ok(PostgresStore::new(pool))
}

/// Create a SQLite pool. The database file is created if it does not exist.
pub async fn connect_sqlite(
    url: &str,
    pool_config: &PoolConfig,
    timeout: Duration,
) -> StoreResult<SqliteStore> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| StoreError::Connection(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true);

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(pool_config.max_connections.max(1))
        .min_connections(pool_config.min_connections)
        .acquire_timeout(pool_config.acquire_timeout)
        .test_before_acquire(pool_config.test_before_acquire);
    if let Some(idle_timeout) = pool_config.idle_timeout {
        pool_options = pool_options.idle_timeout(idle_timeout);
    }
    if let Some(max_lifetime) = pool_config.max_lifetime {
        pool_options = pool_options.max_lifetime(max_lifetime);
    }

    let pool = with_connect_timeout(timeout, pool_options.connect_with(options)).await?;
    Ok(SqliteStore::new(pool))
}

fn postgres_options(config: &DatabaseConfig) -> StoreResult<PgConnectOptions> {
    if let Some(url) = &config.url {
        return PgConnectOptions::from_str(url)
            .map_err(|e| StoreError::Connection(format!("Unable to parse connection string: {}", e)));
    }

    let ssl_mode = PgSslMode::from_str(&config.sslmode)
        .map_err(|e| StoreError::Connection(format!("Invalid sslmode '{}': {}", config.sslmode, e)))?;

    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .database(&config.dbname)
        .ssl_mode(ssl_mode);
    if !config.password.is_empty() {
        options = options.password(&config.password);
    }
    Ok(options)
}

fn pg_pool_options(config: &PoolConfig) -> PgPoolOptions {
    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .test_before_acquire(config.test_before_acquire);

    if let Some(idle_timeout) = config.idle_timeout {
        options = options.idle_timeout(idle_timeout);
    }
    if let Some(max_lifetime) = config.max_lifetime {
        options = options.max_lifetime(max_lifetime);
    }
    options
}

async fn with_connect_timeout<T, F>(timeout: Duration, connect: F) -> StoreResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(pool)) => Ok(pool),
        Ok(Err(e)) => {
            tracing::error!("Failed to create database pool: {}", e);
            Err(StoreError::Connection(format!("Unable to create connection pool: {}", e)))
        }
        Err(_) => Err(StoreError::Connection(format!(
            "Timed out after {:?} creating connection pool",
            timeout
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_from_database_config() {
        let config = DatabaseConfig {
            max_connections: 0,
            connect_timeout_secs: 3,
            ..Default::default()
        };

        let pool_config = PoolConfig::from(&config);
        assert_eq!(pool_config.max_connections, 1);
        assert_eq!(pool_config.acquire_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_postgres_options_reject_unknown_sslmode() {
        let config = DatabaseConfig {
            sslmode: "sometimes".to_string(),
            ..Default::default()
        };
        assert!(matches!(postgres_options(&config), Err(StoreError::Connection(_))));
    }

    #[tokio::test]
    async fn test_connect_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: Some(format!("sqlite://{}", dir.path().join("glimpse.db").display())),
            ..Default::default()
        };

        let store = connect(&config).await.unwrap();
        assert_eq!(store.dialect(), crate::backends::SqlDialect::SQLite);
        store.close().await;
    }

    #[tokio::test]
    async fn test_connect_unsupported_scheme() {
        let config = DatabaseConfig {
            url: Some("mysql://localhost/glimpse".to_string()),
            ..Default::default()
        };

        match connect(&config).await {
            Err(StoreError::Connection(msg)) => assert!(msg.contains("Unsupported database backend")),
            Err(other) => panic!("expected connection error, got {:?}", other),
            Ok(_) => panic!("expected connection error"),
        }
    }
}
