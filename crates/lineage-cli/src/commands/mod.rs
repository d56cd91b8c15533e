//! CLI command implementations

pub mod column_lineage;
pub mod config;
pub mod graph;
pub mod import;
pub mod init;
pub mod metadata;
pub mod table_lineage;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use lineage_config::{ConfigLoader, LineageConfig};
use lineage_core::{
    CachedMetadataStore, DepthLimits, Details, LineageRepository, LineageService,
    SqliteMetadataStore,
};
use serde::Serialize;

use crate::GlobalOptions;

/// Everything a command needs before touching the database.
pub struct CommandContext {
    pub global: GlobalOptions,
    pub workspace: PathBuf,
    pub config: LineageConfig,
}

/// Open handles onto one workspace database.
pub struct LineageHandles {
    pub metadata: Arc<SqliteMetadataStore>,
    pub cache: Arc<CachedMetadataStore>,
    pub repository: Arc<LineageRepository>,
    pub service: LineageService,
}

impl CommandContext {
    pub fn database_path(&self) -> PathBuf {
        self.config.database_path(&self.workspace)
    }

    /// Open the workspace database; it must already exist.
    pub fn open(&self) -> Result<LineageHandles> {
        let db_path = self.database_path();
        if !db_path.exists() {
            anyhow::bail!(
                "No lineage database at {}. Run `lineage init` first.",
                db_path.display()
            );
        }
        self.open_or_create(&db_path)
    }

    /// Open the database at `db_path`, creating the schema if needed.
    pub fn open_or_create(&self, db_path: &Path) -> Result<LineageHandles> {
        let metadata = Arc::new(
            SqliteMetadataStore::open(db_path)
                .with_context(|| format!("Failed to open metadata store {}", db_path.display()))?,
        );
        let cache = Arc::new(CachedMetadataStore::new(
            metadata.clone(),
            self.config.cache.metadata_capacity,
        ));
        let repository = Arc::new(
            LineageRepository::open(db_path, metadata.clone())
                .with_context(|| format!("Failed to open lineage store {}", db_path.display()))?
                .with_default_relation_type(&self.config.lineage.default_relation_type),
        );
        let limits = DepthLimits::new(self.config.graph.default_depth, self.config.graph.max_depth);
        let service = LineageService::new(repository.clone(), cache.clone()).with_limits(limits);

        Ok(LineageHandles {
            metadata,
            cache,
            repository,
            service,
        })
    }
}

/// Resolve the workspace path from options or current directory.
pub fn resolve_workspace(global: &GlobalOptions) -> Result<PathBuf> {
    if let Some(ref ws) = global.workspace {
        if ws.exists() {
            return ws
                .canonicalize()
                .with_context(|| format!("Failed to resolve workspace {}", ws.display()));
        }
        anyhow::bail!("Workspace '{}' not found", ws.display());
    }

    std::env::current_dir().context("Failed to get current directory")
}

/// Load configuration: global, then local (or `--config`), then CLI overrides.
pub fn load_config(global: &GlobalOptions, workspace: &Path) -> Result<LineageConfig> {
    let mut loader = ConfigLoader::new();
    let overrides = global.to_config_overrides();

    match global.config {
        Some(ref config_path) => {
            if !config_path.exists() {
                anyhow::bail!("Config file not found: {}", config_path.display());
            }
            loader
                .load_with_file(config_path, Some(&overrides))
                .context("Failed to load config file")
        }
        None => loader
            .load(workspace, Some(&overrides))
            .context("Failed to load configuration"),
    }
}

/// Output format for query commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an info message to stderr (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}

/// Parse a `--details` argument; it must be a JSON object.
pub fn parse_details(raw: &str) -> Result<Details, String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err("details must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}
