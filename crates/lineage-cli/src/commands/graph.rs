//! Graph command - Bounded lineage graph queries

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use lineage_core::{ColumnId, LayerDirection, LayerEntry, TableId};

use super::{print_json, CommandContext, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum GraphCommand {
    /// Table lineage graph around a table
    Table {
        table_id: TableId,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Column lineage graph around a column, with owning tables
    Column {
        column_id: ColumnId,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Tables upstream or downstream of a table, by hop
    Layers {
        table_id: TableId,

        /// Hop limit (defaults to the configured default depth)
        #[arg(long, short = 'd')]
        depth: Option<usize>,

        /// upstream or downstream
        #[arg(long, default_value = "upstream")]
        direction: LayerDirection,

        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Counts of edges and tables in the repository
    Stats,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Hop limit (defaults to the configured default depth)
    #[arg(long, short = 'd')]
    depth: Option<usize>,

    /// up, down or both (upstream/downstream accepted)
    #[arg(long)]
    direction: Option<String>,

    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

pub fn execute(cmd: GraphCommand, ctx: &CommandContext) -> Result<()> {
    let handles = ctx.open()?;
    let service = &handles.service;
    let default_direction = ctx.config.graph.default_direction.as_str();

    match cmd {
        GraphCommand::Table { table_id, query } => {
            let direction = query.direction.as_deref().unwrap_or(default_direction);
            let view = service
                .get_table_lineage_graph(table_id, query.depth, Some(direction))
                .context("Failed to build table lineage graph")?;
            match query.format {
                OutputFormat::Json => print_json(&view),
                OutputFormat::Text => {
                    print!("{}", view.to_text());
                    Ok(())
                }
            }
        }
        GraphCommand::Column { column_id, query } => {
            let direction = query.direction.as_deref().unwrap_or(default_direction);
            let view = service
                .get_column_lineage_graph(column_id, query.depth, Some(direction))
                .context("Failed to build column lineage graph")?;
            match query.format {
                OutputFormat::Json => print_json(&view),
                OutputFormat::Text => {
                    print!("{}", view.to_text());
                    Ok(())
                }
            }
        }
        GraphCommand::Layers {
            table_id,
            depth,
            direction,
            format,
        } => {
            let layers = service
                .get_lineage_layers(table_id, depth, direction)
                .context("Failed to list lineage layers")?;
            match format {
                OutputFormat::Json => print_json(&layers),
                OutputFormat::Text => {
                    print_layers(&layers, direction);
                    Ok(())
                }
            }
        }
        GraphCommand::Stats => print_json(&service.stats()?),
    }
}

fn print_layers(layers: &[LayerEntry], direction: LayerDirection) {
    if layers.is_empty() {
        println!("No {} tables", direction.as_str());
        return;
    }
    let mut current = 0;
    for entry in layers {
        if entry.layer != current {
            current = entry.layer;
            println!("Layer {current}:");
        }
        let source = entry
            .data_source_name
            .as_deref()
            .map(|s| format!(" [{s}]"))
            .unwrap_or_default();
        println!(
            "  {}{}  via edge {} ({})",
            entry.name, source, entry.edge_id, entry.relation_type
        );
    }
}
