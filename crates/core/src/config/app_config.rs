use crate::config::validation::{
    ConfigValidator, IdentifierValidator, PortValidator, RequiredValidator,
};
use crate::config::{ConfigError, ConfigSource, DatabaseConfig, MigrationsConfig, SSL_MODES};
use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default config file location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

/// Environment variables consulted after the file is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvOverride {
    DatabaseUrl,
    PostgresHost,
    PostgresPort,
    PostgresUser,
    PostgresPassword,
    PostgresDb,
    PostgresSslMode,
    MigrationsDir,
    LogLevel,
    LogFormat,
}

impl EnvOverride {
    /// Every override, in the order they are applied
    pub const ALL: [EnvOverride; 10] = [
        EnvOverride::DatabaseUrl,
        EnvOverride::PostgresHost,
        EnvOverride::PostgresPort,
        EnvOverride::PostgresUser,
        EnvOverride::PostgresPassword,
        EnvOverride::PostgresDb,
        EnvOverride::PostgresSslMode,
        EnvOverride::MigrationsDir,
        EnvOverride::LogLevel,
        EnvOverride::LogFormat,
    ];

    /// Environment variable name
    pub fn var(self) -> &'static str {
        match self {
            EnvOverride::DatabaseUrl => "DATABASE_URL",
            EnvOverride::PostgresHost => "POSTGRES_HOST",
            EnvOverride::PostgresPort => "POSTGRES_PORT",
            EnvOverride::PostgresUser => "POSTGRES_USER",
            EnvOverride::PostgresPassword => "POSTGRES_PASSWORD",
            EnvOverride::PostgresDb => "POSTGRES_DB",
            EnvOverride::PostgresSslMode => "POSTGRES_SSLMODE",
            EnvOverride::MigrationsDir => "MIGRATIONS_DIR",
            EnvOverride::LogLevel => "LOG_LEVEL",
            EnvOverride::LogFormat => "LOG_FORMAT",
        }
    }

    /// Dotted path of the config field it overrides
    pub fn field(self) -> &'static str {
        match self {
            EnvOverride::DatabaseUrl => "database.url",
            EnvOverride::PostgresHost => "database.host",
            EnvOverride::PostgresPort => "database.port",
            EnvOverride::PostgresUser => "database.user",
            EnvOverride::PostgresPassword => "database.password",
            EnvOverride::PostgresDb => "database.dbname",
            EnvOverride::PostgresSslMode => "database.sslmode",
            EnvOverride::MigrationsDir => "migrations.dir",
            EnvOverride::LogLevel => "logging.level",
            EnvOverride::LogFormat => "logging.format",
        }
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// `logging` section of the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub migrations: MigrationsConfig,
    pub logging: LoggingSettings,
    #[serde(skip)]
    loaded_from: Option<PathBuf>,
    #[serde(skip)]
    file_keys: Vec<EnvOverride>,
    #[serde(skip)]
    env_applied: Vec<EnvOverride>,
}

impl AppConfig {
    /// Load from a YAML file, apply environment overrides, then validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut config = Self::from_file_content(&content, path)?;
        config.apply_overrides_from(|key| env::var(key).ok())?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Defaults plus environment overrides, for deployments without a config file
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides_from(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Parse file content, remembering which overridable keys the file sets
    fn from_file_content(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let parse_error = |source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        };

        let document: serde_yaml::Value = serde_yaml::from_str(content).map_err(parse_error)?;
        let mut config: Self = if document.is_null() {
            Self::default()
        } else {
            serde_yaml::from_value(document.clone()).map_err(parse_error)?
        };

        config.loaded_from = Some(path.to_path_buf());
        config.file_keys = EnvOverride::ALL
            .into_iter()
            .filter(|key| yaml_has_path(&document, key.field()))
            .collect();
        Ok(config)
    }

    /// Apply overrides through `lookup`; empty values are ignored.
    ///
    /// Unlike a silent fallback, an unparseable number is reported as an error.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in EnvOverride::ALL {
            let Some(value) = lookup(key.var()).filter(|v| !v.is_empty()) else {
                continue;
            };

            match key {
                EnvOverride::DatabaseUrl => self.database.url = Some(value),
                EnvOverride::PostgresHost => self.database.host = value,
                EnvOverride::PostgresPort => {
                    self.database.port = value.parse().map_err(|_| {
                        ConfigError::invalid_value(key.field(), &value, "port number (1-65535)")
                    })?;
                }
                EnvOverride::PostgresUser => self.database.user = value,
                EnvOverride::PostgresPassword => self.database.password = value,
                EnvOverride::PostgresDb => self.database.dbname = value,
                EnvOverride::PostgresSslMode => self.database.sslmode = value,
                EnvOverride::MigrationsDir => self.migrations.dir = PathBuf::from(value),
                EnvOverride::LogLevel => self.logging.level = value.to_lowercase(),
                EnvOverride::LogFormat => {
                    self.logging.format = LogFormat::from_str(&value).map_err(|_| {
                        ConfigError::invalid_value(key.field(), &value, "text or json")
                    })?;
                }
            }
            self.env_applied.push(key);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_none() {
            PortValidator::for_field("database.port").validate(&self.database.port)?;
            RequiredValidator {
                field: "database.host",
                hint: "Set database.host or POSTGRES_HOST",
            }
            .validate(&self.database.host)?;
            RequiredValidator {
                field: "database.dbname",
                hint: "Set database.dbname or POSTGRES_DB",
            }
            .validate(&self.database.dbname)?;

            if !SSL_MODES.contains(&self.database.sslmode.as_str()) {
                return Err(ConfigError::invalid_value(
                    "database.sslmode",
                    &self.database.sslmode,
                    format!("one of: {}", SSL_MODES.join(", ")),
                ));
            }
        } else {
            RequiredValidator {
                field: "database.url",
                hint: "DATABASE_URL must not be blank",
            }
            .validate(self.database.url.as_deref().unwrap_or_default())?;
        }

        IdentifierValidator {
            field: "migrations.table",
        }
        .validate(&self.migrations.table)?;

        RequiredValidator {
            field: "migrations.extension",
            hint: "Scripts are matched by file extension, e.g. sql",
        }
        .validate(&self.migrations.extension)?;

        if self.database.connect_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "database.connect_timeout_secs",
                "0",
                "a positive number of seconds",
            ));
        }

        if self.migrations.timeout_secs == Some(0) {
            return Err(ConfigError::invalid_value(
                "migrations.timeout_secs",
                "0",
                "a positive number of seconds, or unset for no deadline",
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                &self.logging.level,
                format!("one of: {}", VALID_LOG_LEVELS.join(", ")),
            ));
        }

        Ok(())
    }

    /// Origin of every overridable field, in override order
    pub fn config_sources(&self) -> Vec<(&'static str, ConfigSource)> {
        EnvOverride::ALL
            .into_iter()
            .map(|key| {
                let source = match &self.loaded_from {
                    _ if self.env_applied.contains(&key) => ConfigSource::EnvVar(key.var().to_string()),
                    Some(path) if self.file_keys.contains(&key) => {
                        ConfigSource::File(path.display().to_string())
                    }
                    _ => ConfigSource::Default,
                };
                (key.field(), source)
            })
            .collect()
    }
}

/// True if `path` (dot separated) names a non-null value in `document`
fn yaml_has_path(document: &serde_yaml::Value, path: &str) -> bool {
    path.split('.')
        .try_fold(document, |node, key| node.get(key))
        .map_or(false, |value| !value.is_null())
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::invalid_value("logging.format", s, "text or json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
database:
  host: db.internal
  port: 5433
  user: glimpse
  password: secret
  dbname: glimpse_prod
  sslmode: require
  max_connections: 20
migrations:
  dir: ./db/migrations
logging:
  level: debug
  format: json
"#;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn source_of(config: &AppConfig, field: &str) -> ConfigSource {
        config
            .config_sources()
            .into_iter()
            .find(|(name, _)| *name == field)
            .map(|(_, source)| source)
            .unwrap()
    }

    #[test]
    fn test_parse_yaml() {
        let config = AppConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 5433);
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.migrations.dir, PathBuf::from("./db/migrations"));
        assert_eq!(config.migrations.table, "migrations");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let mut config = AppConfig::from_yaml_str(SAMPLE).unwrap();
        config
            .apply_overrides_from(lookup_from(&[
                ("POSTGRES_HOST", "10.0.0.5"),
                ("POSTGRES_PORT", "6432"),
                ("POSTGRES_DB", ""),
            ]))
            .unwrap();

        assert_eq!(config.database.host, "10.0.0.5");
        assert_eq!(config.database.port, 6432);
        // blank values are ignored
        assert_eq!(config.database.dbname, "glimpse_prod");

        assert_eq!(
            source_of(&config, "database.host"),
            ConfigSource::EnvVar("POSTGRES_HOST".to_string())
        );
        assert_eq!(source_of(&config, "database.url"), ConfigSource::Default);
    }

    #[test]
    fn test_invalid_port_override_is_an_error() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides_from(lookup_from(&[("POSTGRES_PORT", "fivefour")]));

        match result {
            Err(ConfigError::InvalidValue { field, value, .. }) => {
                assert_eq!(field, "database.port");
                assert_eq!(value, "fivefour");
            }
            other => panic!("expected invalid port error, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.migrations.table = "migrations; drop".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.database.sslmode = "sometimes".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.migrations.timeout_secs = Some(0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.database.connect_timeout_secs = 0;
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "database.connect_timeout_secs");
            }
            other => panic!("expected invalid connect timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_sources_only_credit_keys_the_file_sets() {
        let path = Path::new("/etc/glimpse/partial.yaml");
        let config = AppConfig::from_file_content("logging:\n  level: warn\n", path).unwrap();

        assert_eq!(config.logging.level, "warn");
        assert_eq!(
            source_of(&config, "logging.level"),
            ConfigSource::File("/etc/glimpse/partial.yaml".to_string())
        );
        assert_eq!(source_of(&config, "logging.format"), ConfigSource::Default);
        assert_eq!(source_of(&config, "database.host"), ConfigSource::Default);
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = AppConfig::from_file_content("", Path::new("empty.yaml")).unwrap();
        assert_eq!(config.database.port, 5432);
        assert!(config
            .config_sources()
            .iter()
            .all(|(_, source)| *source == ConfigSource::Default));
    }

    #[test]
    fn test_every_override_is_applied() {
        let mut config = AppConfig::default();
        let pairs: Vec<(&str, &str)> = EnvOverride::ALL
            .iter()
            .map(|key| {
                let value = match key {
                    EnvOverride::PostgresPort => "6543",
                    EnvOverride::LogLevel => "debug",
                    EnvOverride::LogFormat => "json",
                    other => other.var(),
                };
                (key.var(), value)
            })
            .collect();
        config.apply_overrides_from(lookup_from(&pairs)).unwrap();

        assert_eq!(config.database.url.as_deref(), Some("DATABASE_URL"));
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.migrations.dir, PathBuf::from("MIGRATIONS_DIR"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config
            .config_sources()
            .iter()
            .all(|(_, source)| source.is_env_var()));
    }

    #[test]
    fn test_url_skips_discrete_field_checks() {
        let mut config = AppConfig::default();
        config.database.host = String::new();
        config.database.url = Some("sqlite://glimpse.db".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let result = AppConfig::load("/definitely/not/here.yaml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    #[serial]
    fn test_load_file_with_process_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        env::set_var("POSTGRES_USER", "migrator");
        let config = AppConfig::load(file.path());
        env::remove_var("POSTGRES_USER");

        let config = config.unwrap();
        assert_eq!(config.database.user, "migrator");
        assert!(source_of(&config, "database.password").is_file());
        assert!(source_of(&config, "database.user").is_env_var());
    }
}
