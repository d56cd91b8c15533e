//! Lineage Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.lineage/config.toml`
//! - Local config: `.lineage/config.toml` (in workspace)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::{ConfigError, FileAction};
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest traversal depth any configuration may allow.
pub const DEPTH_CAP: usize = 10;

/// Root configuration, fully merged from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LineageConfig {
    pub storage: StorageConfig,
    pub graph: GraphConfig,
    pub lineage: LineageDefaults,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Where the lineage database lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory; relative paths resolve against the workspace root
    pub data_dir: PathBuf,

    /// Database file name inside `data_dir`
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".lineage"),
            database: "lineage.db".to_string(),
        }
    }
}

/// Graph query bounds.
///
/// # Example TOML
///
/// ```toml
/// [graph]
/// default_depth = 3
/// max_depth = 10
/// default_direction = "both"  # or "up" / "down"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphConfig {
    pub default_depth: usize,
    pub max_depth: usize,
    pub default_direction: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_depth: 3,
            max_depth: DEPTH_CAP,
            default_direction: "both".to_string(),
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::check_depth("graph.max_depth", self.max_depth)?;
        ConfigError::check_depth("graph.default_depth", self.default_depth)?;
        if self.default_depth > self.max_depth {
            return Err(ConfigError::DefaultAboveMax {
                default_depth: self.default_depth,
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }
}

/// Defaults applied to new lineage edges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LineageDefaults {
    /// Relation type stored when a table edge is created without one
    pub default_relation_type: String,
}

impl Default for LineageDefaults {
    fn default() -> Self {
        Self {
            default_relation_type: "TRANSFORMATION".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries kept per kind in the metadata lookup cache
    pub metadata_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            metadata_capacity: 1024,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,

    /// Log file path (optional)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub database: Option<String>,
    pub default_depth: Option<usize>,
    pub max_depth: Option<usize>,
    pub log_level: Option<String>,
}

impl LineageConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref dir) = overrides.data_dir {
            self.storage.data_dir = dir.clone();
        }
        if let Some(ref database) = overrides.database {
            self.storage.database = database.clone();
        }
        if let Some(depth) = overrides.default_depth {
            self.graph.default_depth = depth;
        }
        if let Some(depth) = overrides.max_depth {
            self.graph.max_depth = depth;
        }
        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.graph.validate()?;
        if self.lineage.default_relation_type.trim().is_empty() {
            return Err(ConfigError::EmptyValue("lineage.default_relation_type"));
        }
        if self.storage.database.trim().is_empty() {
            return Err(ConfigError::EmptyValue("storage.database"));
        }
        Ok(())
    }

    /// Effective data directory for a workspace.
    pub fn data_dir(&self, workspace_root: &Path) -> PathBuf {
        if self.storage.data_dir.is_absolute() {
            self.storage.data_dir.clone()
        } else {
            workspace_root.join(&self.storage.data_dir)
        }
    }

    /// Database file path for a workspace.
    pub fn database_path(&self, workspace_root: &Path) -> PathBuf {
        self.data_dir(workspace_root).join(&self.storage.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = LineageConfig::default();
        assert_eq!(config.storage.data_dir, PathBuf::from(".lineage"));
        assert_eq!(config.storage.database, "lineage.db");
        assert_eq!(config.graph.default_depth, 3);
        assert_eq!(config.graph.max_depth, 10);
        assert_eq!(config.graph.default_direction, "both");
        assert_eq!(config.lineage.default_relation_type, "TRANSFORMATION");
        assert_eq!(config.cache.metadata_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = LineageConfig::default();
        let overrides = ConfigOverrides {
            data_dir: Some(PathBuf::from("/custom/lineage")),
            default_depth: Some(5),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.storage.data_dir, PathBuf::from("/custom/lineage"));
        assert_eq!(config.graph.default_depth, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_database_path_resolution() {
        let config = LineageConfig::default();
        let path = config.database_path(Path::new("/home/user/project"));
        assert_eq!(path, PathBuf::from("/home/user/project/.lineage/lineage.db"));

        let mut config = LineageConfig::default();
        config.storage.data_dir = PathBuf::from("/var/lib/lineage");
        assert_eq!(
            config.database_path(Path::new("/project")),
            PathBuf::from("/var/lib/lineage/lineage.db")
        );
    }

    #[test]
    fn test_validate_depth_bounds() {
        let mut config = LineageConfig::default();
        config.graph.max_depth = 11;
        assert!(config.validate().unwrap_err().to_string().contains("max_depth"));

        config.graph.max_depth = 0;
        assert!(config.validate().is_err());

        config.graph.max_depth = 4;
        config.graph.default_depth = 5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DefaultAboveMax { .. }));

        config.graph.default_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_relation_type() {
        let mut config = LineageConfig::default();
        config.lineage.default_relation_type = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: LineageConfig = toml::from_str(
            r#"
[graph]
max_depth = 6

[logging]
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.graph.max_depth, 6);
        assert_eq!(config.graph.default_depth, 3);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.storage, StorageConfig::default());
    }
}
