//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.lineage/config.toml`
//! 2. Local config: `.lineage/config.toml` (in workspace), or an explicit file
//! 3. CLI overrides
//!
//! Later sources override earlier ones.

use crate::error::{ConfigError, FileAction};
use crate::{
    CacheConfig, ConfigOverrides, GraphConfig, LineageConfig, LineageDefaults, LoggingConfig,
    StorageConfig,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const CONFIG_FILE_NAME: &str = "config.toml";

const GLOBAL_CONFIG_DIR: &str = ".lineage";

const LOCAL_CONFIG_DIR: &str = ".lineage";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.lineage`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<LineageConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader rooted at `~/.lineage`.
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR)),
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a workspace with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides, then validates.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<LineageConfig, ConfigError> {
        let local = self.load_local(workspace_root)?;
        self.assemble(local, overrides)
    }

    /// Like [`load`](Self::load), but an explicit file takes the place of the
    /// workspace's local config.
    pub fn load_with_file(
        &mut self,
        config_file: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<LineageConfig, ConfigError> {
        debug!("Loading explicit config from {:?}", config_file);
        let explicit = load_config_file(config_file)?;
        self.assemble(Some(explicit), overrides)
    }

    fn assemble(
        &mut self,
        layer: Option<LineageConfig>,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<LineageConfig, ConfigError> {
        let mut config = LineageConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }
        if let Some(layer) = layer {
            config = merge_configs(config, layer);
        }
        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<LineageConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;
        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a workspace.
    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<LineageConfig>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    pub fn save_local(
        &self,
        workspace_root: &Path,
        config: &LineageConfig,
    ) -> Result<(), ConfigError> {
        save_config_file(&self.local_config_path(workspace_root), config)
    }

    /// Create `<workspace>/.lineage/config.toml` with defaults if it is missing.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        let config_path = self.local_config_path(workspace_root);
        if !config_path.exists() {
            save_config_file(&config_path, &LineageConfig::default())?;
        }
        Ok(config_path)
    }

    /// Create `~/.lineage/config.toml` with defaults if it is missing.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(config_path) = self.global_config_path() else {
            return Err(ConfigError::NoHomeDir);
        };
        if !config_path.exists() {
            save_config_file(&config_path, &LineageConfig::default())?;
        }
        Ok(config_path)
    }

    /// Forces reload on the next `load_global()` call.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

fn load_config_file(path: &Path) -> Result<LineageConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io(FileAction::Read, path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse(path, e))
}

fn save_config_file(path: &Path, config: &LineageConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(FileAction::CreateDir, parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::io(FileAction::Write, path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
///
/// An overlay field equal to its default keeps the base value, so partial
/// files only override what they set.
fn merge_configs(base: LineageConfig, overlay: LineageConfig) -> LineageConfig {
    LineageConfig {
        storage: merge_storage(base.storage, overlay.storage),
        graph: merge_graph(base.graph, overlay.graph),
        lineage: merge_lineage(base.lineage, overlay.lineage),
        cache: merge_cache(base.cache, overlay.cache),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

fn merge_storage(base: StorageConfig, overlay: StorageConfig) -> StorageConfig {
    let default = StorageConfig::default();
    StorageConfig {
        data_dir: pick(base.data_dir, overlay.data_dir, default.data_dir),
        database: pick(base.database, overlay.database, default.database),
    }
}

fn merge_graph(base: GraphConfig, overlay: GraphConfig) -> GraphConfig {
    let default = GraphConfig::default();
    GraphConfig {
        default_depth: pick(base.default_depth, overlay.default_depth, default.default_depth),
        max_depth: pick(base.max_depth, overlay.max_depth, default.max_depth),
        default_direction: pick(
            base.default_direction,
            overlay.default_direction,
            default.default_direction,
        ),
    }
}

fn merge_lineage(base: LineageDefaults, overlay: LineageDefaults) -> LineageDefaults {
    LineageDefaults {
        default_relation_type: pick(
            base.default_relation_type,
            overlay.default_relation_type,
            LineageDefaults::default().default_relation_type,
        ),
    }
}

fn merge_cache(base: CacheConfig, overlay: CacheConfig) -> CacheConfig {
    CacheConfig {
        metadata_capacity: pick(
            base.metadata_capacity,
            overlay.metadata_capacity,
            CacheConfig::default().metadata_capacity,
        ),
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    LoggingConfig {
        level: pick(base.level, overlay.level, "info".to_string()),
        format: pick(base.format, overlay.format, Default::default()),
        file: overlay.file.or(base.file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogFormat;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let config_dir = dir.join(".lineage");
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_default_config() {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();

        let mut loader = ConfigLoader::with_global_dir(home.path().join(".lineage"));
        let config = loader.load(workspace.path(), None).unwrap();

        assert_eq!(config, LineageConfig::default());
    }

    #[test]
    fn test_local_overrides_global() {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();

        write_config(
            home.path(),
            r#"
[graph]
max_depth = 8
default_depth = 2

[lineage]
default_relation_type = "ETL"
"#,
        );
        write_config(
            workspace.path(),
            r#"
[graph]
default_depth = 4

[logging]
format = "json"
"#,
        );

        let mut loader = ConfigLoader::with_global_dir(home.path().join(".lineage"));
        let config = loader.load(workspace.path(), None).unwrap();

        assert_eq!(config.graph.max_depth, 8);
        assert_eq!(config.graph.default_depth, 4);
        assert_eq!(config.lineage.default_relation_type, "ETL");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_overrides_applied_last() {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        write_config(workspace.path(), "[graph]\ndefault_depth = 4\n");

        let mut loader = ConfigLoader::with_global_dir(home.path().join(".lineage"));
        let overrides = ConfigOverrides {
            default_depth: Some(2),
            log_level: Some("warn".to_string()),
            ..Default::default()
        };
        let config = loader.load(workspace.path(), Some(&overrides)).unwrap();

        assert_eq!(config.graph.default_depth, 2);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_invalid_merged_config_rejected() {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        write_config(workspace.path(), "[graph]\nmax_depth = 25\n");

        let mut loader = ConfigLoader::with_global_dir(home.path().join(".lineage"));
        let err = loader.load(workspace.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::DepthOutOfRange { .. }));
        assert_eq!(err.key(), Some("graph.max_depth"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let path = write_config(workspace.path(), "[graph\nmax_depth = ");

        let mut loader = ConfigLoader::with_global_dir(home.path().join(".lineage"));
        let err = loader.load(workspace.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&path.display().to_string()));
    }

    #[test]
    fn test_explicit_file_replaces_local() {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        write_config(workspace.path(), "[cache]\nmetadata_capacity = 16\n");
        let explicit = workspace.path().join("custom.toml");
        std::fs::write(&explicit, "[storage]\ndatabase = \"other.db\"\n").unwrap();

        let mut loader = ConfigLoader::with_global_dir(home.path().join(".lineage"));
        let config = loader.load_with_file(&explicit, None).unwrap();

        assert_eq!(config.storage.database, "other.db");
        assert_eq!(config.cache.metadata_capacity, 1024);
    }

    #[test]
    fn test_init_local_then_load() {
        let home = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(home.path().join(".lineage"));

        let path = loader.init_local(workspace.path()).unwrap();
        assert!(path.exists());
        assert_eq!(path, loader.local_config_path(workspace.path()));

        let loaded = loader.load_local(workspace.path()).unwrap().unwrap();
        assert_eq!(loaded, LineageConfig::default());
    }

    #[test]
    fn test_global_config_cached() {
        let home = TempDir::new().unwrap();
        let global = write_config(home.path(), "[graph]\ndefault_depth = 5\n");

        let mut loader = ConfigLoader::with_global_dir(home.path().join(".lineage"));
        assert_eq!(loader.load_global().unwrap().unwrap().graph.default_depth, 5);

        std::fs::write(&global, "[graph]\ndefault_depth = 6\n").unwrap();
        assert_eq!(loader.load_global().unwrap().unwrap().graph.default_depth, 5);

        loader.clear_cache();
        assert_eq!(loader.load_global().unwrap().unwrap().graph.default_depth, 6);
    }
}
