//! Initialize command - Create the workspace lineage database

use anyhow::{Context, Result};
use clap::Args;
use lineage_config::ConfigLoader;
use serde::Serialize;
use tracing::info;

use super::{print_info, print_json, CommandContext};

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Do not write a local config file
    #[arg(long)]
    no_config: bool,
}

#[derive(Debug, Serialize)]
struct InitSummary {
    workspace: String,
    database: String,
    config: Option<String>,
    already_initialized: bool,
}

/// Execute the init command
pub fn execute(args: InitArgs, ctx: &CommandContext) -> Result<()> {
    let quiet = ctx.global.quiet;
    let db_path = ctx.database_path();
    let already_initialized = db_path.exists();

    if already_initialized {
        print_info(
            &format!("Lineage database already present at {}", db_path.display()),
            quiet,
        );
    } else {
        print_info(
            &format!(
                "Initializing lineage workspace at {}",
                ctx.workspace.display()
            ),
            quiet,
        );
    }

    // Opening creates the data directory and both schemas
    let handles = ctx.open_or_create(&db_path)?;
    let stats = handles.service.stats().context("Failed to read database")?;
    info!(
        database = %db_path.display(),
        table_edges = stats.table_edges,
        "Lineage database ready"
    );

    let config = if args.no_config {
        None
    } else {
        let path = ConfigLoader::new()
            .init_local(&ctx.workspace)
            .context("Failed to write local config")?;
        Some(path.display().to_string())
    };

    print_json(&InitSummary {
        workspace: ctx.workspace.display().to_string(),
        database: db_path.display().to_string(),
        config,
        already_initialized,
    })
}
