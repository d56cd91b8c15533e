//! Lineage CLI - declared table and column lineage
//!
//! A command-line front end for registering table metadata, recording
//! table and column lineage edges, and querying bounded lineage graphs.
//!
//! # Usage
//!
//! ```bash
//! # Initialize a workspace database
//! lineage init
//!
//! # Register metadata
//! lineage metadata add-source dwh --type oracle
//! lineage metadata add-table dwh orders
//!
//! # Record and query lineage
//! lineage table-lineage create --source 1 --target 2
//! lineage graph table 2 --depth 3 --direction up
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lineage_config::{ConfigOverrides, LogFormat, LoggingConfig};
use tracing::debug;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

/// Lineage - table and column lineage tracking
#[derive(Parser, Debug)]
#[command(name = "lineage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Workspace directory holding the `.lineage` data directory
    #[arg(long, short = 'w', global = true, env = "LINEAGE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to configuration file (replaces the workspace's local config)
    #[arg(long, short = 'c', global = true, env = "LINEAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true, env = "LINEAGE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

impl GlobalOptions {
    pub fn to_config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            data_dir: self.data_dir.clone(),
            ..Default::default()
        }
    }

    /// Explicit level from `-v`/`-q`, if either was given
    fn log_level(&self) -> Option<&'static str> {
        if self.quiet {
            Some("error")
        } else if self.verbose {
            Some("debug")
        } else {
            None
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a lineage database in the workspace
    Init(commands::init::InitArgs),

    /// Register and remove data sources, tables and columns
    #[command(subcommand)]
    Metadata(commands::metadata::MetadataCommand),

    /// Create, read, update and delete table lineage edges
    #[command(subcommand)]
    TableLineage(commands::table_lineage::TableLineageCommand),

    /// Create, read, update and delete column lineage edges
    #[command(subcommand)]
    ColumnLineage(commands::column_lineage::ColumnLineageCommand),

    /// Bounded lineage graph queries
    #[command(subcommand)]
    Graph(commands::graph::GraphCommand),

    /// Import lineage rows from a JSON file
    Import(commands::import::ImportArgs),

    /// View and initialize configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let workspace = commands::resolve_workspace(&cli.global)?;
    let config = commands::load_config(&cli.global, &workspace)?;
    init_tracing(&cli.global, &config.logging)?;
    debug!(workspace = %workspace.display(), "Resolved workspace");

    let ctx = commands::CommandContext {
        global: cli.global,
        workspace,
        config,
    };

    match cli.command {
        Commands::Init(args) => commands::init::execute(args, &ctx),
        Commands::Metadata(cmd) => commands::metadata::execute(cmd, &ctx),
        Commands::TableLineage(cmd) => commands::table_lineage::execute(cmd, &ctx),
        Commands::ColumnLineage(cmd) => commands::column_lineage::execute(cmd, &ctx),
        Commands::Graph(cmd) => commands::graph::execute(cmd, &ctx),
        Commands::Import(args) => commands::import::execute(args, &ctx),
        Commands::Config(cmd) => commands::config::execute(cmd, &ctx),
    }
}

/// Install the fmt subscriber. `-v`/`-q` win over `RUST_LOG`, which wins
/// over `[logging].level`.
fn init_tracing(global: &GlobalOptions, logging: &LoggingConfig) -> Result<()> {
    let filter = match global.log_level() {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&logging.level)),
    };

    let (writer, ansi) = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            (BoxMakeWriter::new(std::sync::Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(writer).with_ansi(ansi))
            .try_init(),
    }
    .context("Failed to initialize logging")
}
