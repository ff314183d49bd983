//! Error types for the database layer
//!
//! `StoreError` covers anything the underlying database reports. `MigrationError`
//! is what a migration run returns: it names the script and phase that failed so
//! an operator can act on it without digging through logs.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Errors raised by a database backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// Pool creation, ping or connection timeout
    #[error("Connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Query(#[from] sqlx::Error),

    /// Backend-specific failure that has no sqlx error behind it
    #[error("Store error: {0}")]
    Backend(String),
}

/// Ledger operation that failed before any script ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOperation {
    Create,
    Query,
}

impl fmt::Display for LedgerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerOperation::Create => write!(f, "create"),
            LedgerOperation::Query => write!(f, "query"),
        }
    }
}

/// Step of a single script's transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    Begin,
    Execute,
    Record,
    Commit,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationPhase::Begin => write!(f, "begin transaction"),
            MigrationPhase::Execute => write!(f, "execute"),
            MigrationPhase::Record => write!(f, "record"),
            MigrationPhase::Commit => write!(f, "commit"),
        }
    }
}

/// Why a run stopped early without a script failing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired
    Requested,
    /// The configured run deadline passed
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Requested => write!(f, "cancellation requested"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Error returned by a migration run. Every variant is fatal and never retried.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Ledger bootstrap or applied-set query failed
    #[error("Failed to {operation} migrations ledger: {source}")]
    Store {
        operation: LedgerOperation,
        #[source]
        source: StoreError,
    },

    /// Directory listing or script read failed; nothing was executed
    #[error("Failed to {action} {}: {source}", .path.display())]
    Discovery {
        path: PathBuf,
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A script's statements, its ledger insert, or its commit failed.
    ///
    /// For `MigrationPhase::Commit` the outcome is indeterminate: the store may
    /// have committed before the acknowledgement was lost. The next run reads
    /// the ledger and skips the script if it did.
    #[error("Migration {name} failed during {phase}: {source}")]
    Execution {
        name: String,
        phase: MigrationPhase,
        #[source]
        source: StoreError,
    },

    /// Run interrupted; the in-flight script, if any, was rolled back
    #[error("Migration run cancelled ({reason}){}", in_flight(.name))]
    Cancelled {
        name: Option<String>,
        reason: CancelReason,
    },

    #[error("Invalid migration configuration: {0}")]
    Configuration(String),
}

fn in_flight(name: &Option<String>) -> String {
    match name {
        Some(name) => format!(" while applying {}", name),
        None => String::new(),
    }
}

impl MigrationError {
    /// Name of the script the error is attributed to, if any
    pub fn migration_name(&self) -> Option<&str> {
        match self {
            MigrationError::Execution { name, .. } => Some(name),
            MigrationError::Cancelled { name, .. } => name.as_deref(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, MigrationError::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_names_script_and_phase() {
        let err = MigrationError::Execution {
            name: "0002_create_posts.sql".to_string(),
            phase: MigrationPhase::Execute,
            source: StoreError::Backend("syntax error at or near \"CREAT\"".to_string()),
        };

        let message = err.to_string();
        assert!(message.contains("0002_create_posts.sql"));
        assert!(message.contains("during execute"));
        assert!(message.contains("syntax error"));
        assert_eq!(err.migration_name(), Some("0002_create_posts.sql"));
    }

    #[test]
    fn test_cancelled_message() {
        let err = MigrationError::Cancelled {
            name: Some("0003_create_comments.sql".to_string()),
            reason: CancelReason::DeadlineExceeded,
        };
        assert_eq!(
            err.to_string(),
            "Migration run cancelled (deadline exceeded) while applying 0003_create_comments.sql"
        );
        assert!(err.is_cancelled());

        let err = MigrationError::Cancelled {
            name: None,
            reason: CancelReason::Requested,
        };
        assert_eq!(err.to_string(), "Migration run cancelled (cancellation requested)");
    }

    #[test]
    fn test_discovery_error_includes_path() {
        let err = MigrationError::Discovery {
            path: PathBuf::from("/srv/glimpse/migrations"),
            action: "read migrations directory",
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert!(err
            .to_string()
            .starts_with("Failed to read migrations directory /srv/glimpse/migrations"));
    }
}
