//! Database configuration
//!
//! Loaded from JSON; every field is optional:
//!
//! ```json
//! {
//!   "name": "inventory",
//!   "max_rev_tree_depth": 20,
//!   "store": { "kind": "file", "path": "/var/lib/aerolite/inventory" },
//!   "log_level": "warn"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{DatabaseError, DatabaseResult};
use crate::observability::Severity;
use crate::store::StoreBackend;

/// Default retained generations per branch.
pub const DEFAULT_MAX_REV_TREE_DEPTH: u32 = 20;

const FALLBACK_NAME: &str = "aerolite";

/// Settings for `Database::open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database name (optional, derived from the store path when absent)
    #[serde(default)]
    pub name: Option<String>,

    /// Generations kept per branch by compaction (default 20, must be > 0)
    #[serde(default = "default_max_rev_tree_depth")]
    pub max_rev_tree_depth: u32,

    /// Storage backend (default memory)
    #[serde(default)]
    pub store: StoreBackend,

    /// Minimum log severity (optional)
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_max_rev_tree_depth() -> u32 {
    DEFAULT_MAX_REV_TREE_DEPTH
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: None,
            max_rev_tree_depth: DEFAULT_MAX_REV_TREE_DEPTH,
            store: StoreBackend::Memory,
            log_level: None,
        }
    }
}

impl DatabaseConfig {
    /// In-memory database called `name`.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// File-backed database rooted at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreBackend::File { path: path.into() },
            ..Self::default()
        }
    }

    pub fn with_max_rev_tree_depth(mut self, depth: u32) -> Self {
        self.max_rev_tree_depth = depth;
        self
    }

    /// Load configuration from a JSON file and validate it.
    pub fn load(path: &Path) -> DatabaseResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DatabaseError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: DatabaseConfig = serde_json::from_str(&content)
            .map_err(|e| DatabaseError::InvalidConfig(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DatabaseResult<()> {
        validate_max_rev_tree_depth(self.max_rev_tree_depth)?;

        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(DatabaseError::InvalidConfig("name must not be empty".into()));
            }
        }

        if self.log_level.is_some() && self.min_severity().is_none() {
            return Err(DatabaseError::InvalidConfig(format!(
                "Invalid log_level: '{}'",
                self.log_level.as_deref().unwrap_or_default()
            )));
        }

        Ok(())
    }

    /// Name to use: explicit, else derived from the store path.
    pub fn resolved_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.store {
            StoreBackend::File { path } => database_name_from_path(path),
            StoreBackend::Memory => FALLBACK_NAME.to_string(),
        }
    }

    /// Parsed `log_level`, if set and valid.
    pub fn min_severity(&self) -> Option<Severity> {
        self.log_level.as_deref().and_then(Severity::parse)
    }
}

pub(crate) fn validate_max_rev_tree_depth(depth: u32) -> DatabaseResult<()> {
    if depth == 0 {
        return Err(DatabaseError::InvalidConfig(
            "max_rev_tree_depth must be > 0".into(),
        ));
    }
    Ok(())
}

/// Last path component without its extension: `foo/bar/baz.cblite` → `baz`.
pub fn database_name_from_path(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_NAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_name_from_path() {
        assert_eq!(database_name_from_path("foo/bar/baz.cblite"), "baz");
        assert_eq!(database_name_from_path("plain"), "plain");
        assert_eq!(database_name_from_path("/"), FALLBACK_NAME);
    }

    #[test]
    fn test_defaults() {
        let config: DatabaseConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_rev_tree_depth, DEFAULT_MAX_REV_TREE_DEPTH);
        assert_eq!(config.store, StoreBackend::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = DatabaseConfig::in_memory("db").with_max_rev_tree_depth(0);
        assert!(matches!(config.validate(), Err(DatabaseError::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let config = DatabaseConfig {
            log_level: Some("loud".into()),
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolved_name_from_file_store() {
        let config = DatabaseConfig::file("/data/shop.cblite");
        assert_eq!(config.resolved_name(), "shop");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"name":"x","max_rev_tree_depth":5,"log_level":"warn"}}"#).unwrap();

        let config = DatabaseConfig::load(file.path()).unwrap();
        assert_eq!(config.name.as_deref(), Some("x"));
        assert_eq!(config.max_rev_tree_depth, 5);
        assert_eq!(config.min_severity(), Some(Severity::Warn));
    }

    #[test]
    fn test_load_rejects_zero_depth() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_rev_tree_depth":0}}"#).unwrap();
        assert!(DatabaseConfig::load(file.path()).is_err());
    }
}
