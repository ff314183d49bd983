use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    /// Create a missing required field error
    pub fn missing_required(field: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T: ?Sized> {
    /// Validate a configuration value
    fn validate(&self, value: &T) -> Result<(), ConfigError>;
}

/// Port number validator
pub struct PortValidator {
    pub field: &'static str,
    pub min: u16,
    pub max: u16,
}

impl PortValidator {
    pub fn for_field(field: &'static str) -> Self {
        Self {
            field,
            ..Self::default()
        }
    }
}

impl Default for PortValidator {
    fn default() -> Self {
        Self {
            field: "port",
            min: 1,
            max: 65535,
        }
    }
}

impl ConfigValidator<u16> for PortValidator {
    fn validate(&self, value: &u16) -> Result<(), ConfigError> {
        if *value < self.min || *value > self.max {
            return Err(ConfigError::invalid_value(
                self.field,
                value.to_string(),
                format!("port between {} and {}", self.min, self.max),
            ));
        }
        Ok(())
    }
}

/// Validates names that get interpolated into SQL, such as the ledger table.
///
/// Accepts `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes (the PostgreSQL limit).
pub struct IdentifierValidator {
    pub field: &'static str,
}

impl ConfigValidator<str> for IdentifierValidator {
    fn validate(&self, value: &str) -> Result<(), ConfigError> {
        let mut chars = value.chars();
        let valid_head = chars
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
        let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !valid_head || !valid_tail || value.len() > 63 {
            return Err(ConfigError::invalid_value(
                self.field,
                value,
                "SQL identifier of letters, digits and underscores (max 63 bytes)",
            ));
        }
        Ok(())
    }
}

/// Non-empty string validator
pub struct RequiredValidator {
    pub field: &'static str,
    pub hint: &'static str,
}

impl ConfigValidator<str> for RequiredValidator {
    fn validate(&self, value: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::missing_required(self.field, self.hint));
        }
        Ok(())
    }
}
