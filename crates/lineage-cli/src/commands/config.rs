//! Config command - View and initialize configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use lineage_config::ConfigLoader;
use serde::Serialize;

use super::{print_json, CommandContext};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective (merged) configuration
    Show {
        #[arg(long, value_enum, default_value = "json")]
        format: ConfigFormat,
    },

    /// Write a default config file if none exists
    Init {
        /// Write ~/.lineage/config.toml instead of the workspace config
        #[arg(long)]
        global: bool,
    },

    /// Show configuration file paths
    Path,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Json,
    Toml,
}

#[derive(Debug, Serialize)]
struct ConfigPaths {
    global: Option<PathBuf>,
    local: PathBuf,
    global_exists: bool,
    local_exists: bool,
    database: PathBuf,
}

pub fn execute(cmd: ConfigCommand, ctx: &CommandContext) -> Result<()> {
    let loader = ConfigLoader::new();

    match cmd {
        ConfigCommand::Show { format } => match format {
            ConfigFormat::Json => print_json(&ctx.config),
            ConfigFormat::Toml => {
                let rendered =
                    toml::to_string_pretty(&ctx.config).context("Failed to render config")?;
                print!("{rendered}");
                Ok(())
            }
        },
        ConfigCommand::Init { global } => {
            let path = if global {
                loader.init_global()
            } else {
                loader.init_local(&ctx.workspace)
            }
            .context("Failed to write config file")?;
            print_json(&serde_json::json!({ "config": path }))
        }
        ConfigCommand::Path => {
            let global = loader.global_config_path();
            let local = loader.local_config_path(&ctx.workspace);
            print_json(&ConfigPaths {
                global_exists: global.as_ref().is_some_and(|p| p.exists()),
                local_exists: local.exists(),
                global,
                local,
                database: ctx.database_path(),
            })
        }
    }
}
