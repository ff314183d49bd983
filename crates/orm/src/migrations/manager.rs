//! Migration Manager - File system operations for migrations
//!
//! Discovers schema scripts and creates new ones. Execution order is the
//! byte-wise order of file names and nothing else: no modification times, no
//! version metadata inside the file. Name scripts with a sortable prefix
//! (`0001_`, `20240101120000_`) so that lexical order is the intended order.

use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::definitions::{MigrationConfig, MigrationScript};
use crate::error::{MigrationError, MigrationResult};

/// Migration manager for discovering and creating migration scripts
#[derive(Debug, Clone)]
pub struct MigrationManager {
    config: MigrationConfig,
}

impl MigrationManager {
    /// Create a new migration manager with custom configuration
    pub fn with_config(config: MigrationConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Read every script in the configured directory, sorted by file name
    pub fn discover_scripts(&self) -> MigrationResult<Vec<MigrationScript>> {
        discover_scripts(&self.config.migrations_dir, &self.config.extension)
    }

    /// Write an empty script named `<UTC timestamp>_<name>.<ext>`.
    ///
    /// The timestamp prefix sorts after existing timestamp-prefixed scripts.
    /// An existing file is never overwritten.
    pub fn create_migration(&self, name: &str) -> MigrationResult<PathBuf> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(MigrationError::Configuration(format!(
                "Migration name '{}' has no usable characters",
                name
            )));
        }

        let dir = &self.config.migrations_dir;
        fs::create_dir_all(dir).map_err(|source| MigrationError::Discovery {
            path: dir.clone(),
            action: "create migrations directory",
            source,
        })?;

        let now = Utc::now();
        let filename = format!(
            "{}_{}.{}",
            now.format("%Y%m%d%H%M%S"),
            slug,
            self.config.extension
        );
        let path = dir.join(&filename);

        let template = format!(
            "-- Migration: {}\n-- Created: {}\n\n",
            name.trim(),
            now.format("%Y-%m-%d %H:%M:%S UTC")
        );

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .and_then(|mut file| file.write_all(template.as_bytes()))
            .map_err(|source| MigrationError::Discovery {
                path: path.clone(),
                action: "create migration file",
                source,
            })?;

        tracing::info!(file = %filename, "Created migration");
        Ok(path)
    }
}

/// List `dir`, keep regular entries whose name ends in `.<extension>`, read them
/// eagerly and return them in ascending byte-wise name order.
///
/// Any listing or read failure aborts discovery, so nothing runs against a
/// partially read directory.
pub fn discover_scripts(dir: &Path, extension: &str) -> MigrationResult<Vec<MigrationScript>> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let discovery_error = |path: &Path, action: &'static str| {
        let path = path.to_path_buf();
        move |source| MigrationError::Discovery {
            path,
            action,
            source,
        }
    };

    let entries = fs::read_dir(dir).map_err(discovery_error(dir, "read migrations directory"))?;

    let mut scripts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(discovery_error(dir, "read migrations directory entry"))?;
        let path = entry.path();

        let file_type = entry
            .file_type()
            .map_err(discovery_error(&path, "inspect migration file"))?;
        if file_type.is_dir() {
            continue;
        }

        let file_name = entry.file_name();
        let name = match file_name.to_str() {
            Some(name) if name.ends_with(&suffix) => name.to_string(),
            Some(_) => continue,
            None if file_name.to_string_lossy().ends_with(&suffix) => {
                return Err(MigrationError::Discovery {
                    path,
                    action: "read migration file name",
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "file name is not valid UTF-8",
                    ),
                });
            }
            None => continue,
        };

        let body =
            fs::read_to_string(&path).map_err(discovery_error(&path, "read migration file"))?;
        scripts.push(MigrationScript { name, body });
    }

    scripts.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

    tracing::debug!(
        dir = %dir.display(),
        count = scripts.len(),
        "Discovered migration scripts"
    );
    Ok(scripts)
}

fn slugify(name: &str) -> String {
    let lowered: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    lowered
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_discovery_orders_by_name_not_creation() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "0003_c.sql", "SELECT 3;");
        write(temp_dir.path(), "0001_a.sql", "SELECT 1;");
        write(temp_dir.path(), "0002_b.sql", "SELECT 2;");

        let scripts = discover_scripts(temp_dir.path(), "sql").unwrap();
        let names: Vec<_> = scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["0001_a.sql", "0002_b.sql", "0003_c.sql"]);
        assert_eq!(scripts[0].body, "SELECT 1;");
    }

    #[test]
    fn test_discovery_is_bytewise() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "10_late.sql", "");
        write(temp_dir.path(), "9_early.sql", "");
        write(temp_dir.path(), "B_upper.sql", "");
        write(temp_dir.path(), "a_lower.sql", "");

        let scripts = discover_scripts(temp_dir.path(), "sql").unwrap();
        let names: Vec<_> = scripts.iter().map(|s| s.name.as_str()).collect();
        // unpadded numbers sort lexically, uppercase before lowercase
        assert_eq!(names, ["10_late.sql", "9_early.sql", "B_upper.sql", "a_lower.sql"]);
    }

    #[test]
    fn test_discovery_filters_entries() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "0001_users.sql", "CREATE TABLE users (id INTEGER);");
        write(temp_dir.path(), "README.md", "docs");
        write(temp_dir.path(), "0002_posts.sql.bak", "old");
        write(temp_dir.path(), "0003_upper.SQL", "case matters");
        fs::create_dir(temp_dir.path().join("0004_archive.sql")).unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        write(&temp_dir.path().join("nested"), "0000_hidden.sql", "SELECT 0;");

        let scripts = discover_scripts(temp_dir.path(), "sql").unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].name, "0001_users.sql");
    }

    #[test]
    fn test_discovery_custom_extension() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "0001_a.pgsql", "SELECT 1;");
        write(temp_dir.path(), "0002_b.sql", "SELECT 2;");

        let scripts = discover_scripts(temp_dir.path(), ".pgsql").unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].name, "0001_a.pgsql");
    }

    #[test]
    fn test_discovery_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(discover_scripts(temp_dir.path(), "sql").unwrap().is_empty());
    }

    #[test]
    fn test_discovery_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        match discover_scripts(&missing, "sql") {
            Err(MigrationError::Discovery { path, action, .. }) => {
                assert_eq!(path, missing);
                assert_eq!(action, "read migrations directory");
            }
            other => panic!("expected discovery error, got {:?}", other),
        }
    }

    #[test]
    fn test_create_migration() {
        let temp_dir = TempDir::new().unwrap();
        let manager = MigrationManager::with_config(MigrationConfig::new(temp_dir.path().join("db")));

        let path = manager.create_migration("Create Users Table").unwrap();
        let filename = path.file_name().unwrap().to_str().unwrap().to_string();

        assert!(filename.ends_with("_create_users_table.sql"));
        assert_eq!(filename.split('_').next().unwrap().len(), 14);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("-- Migration: Create Users Table"));

        let scripts = manager.discover_scripts().unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].name, filename);
    }

    #[test]
    fn test_create_migration_rejects_empty_name() {
        let temp_dir = TempDir::new().unwrap();
        let manager = MigrationManager::with_config(MigrationConfig::new(temp_dir.path()));

        assert!(matches!(
            manager.create_migration(" -- "),
            Err(MigrationError::Configuration(_))
        ));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("add posts.likes_count"), "add_posts_likes_count");
        assert_eq!(slugify("  Comments -> Posts FK "), "comments_posts_fk");
        assert_eq!(slugify("???"), "");
    }
}
