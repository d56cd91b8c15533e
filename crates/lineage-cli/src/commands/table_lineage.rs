//! Table lineage command - CRUD over table lineage edges

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use lineage_core::{
    Details, NewTableLineage, TableEdgeFilter, TableEdgeId, TableId, TableLineagePatch,
};

use super::{parse_details, print_json, CommandContext};

#[derive(Subcommand, Debug)]
pub enum TableLineageCommand {
    /// Declare that the source tables produce the target table
    Create(CreateArgs),

    /// Show one table lineage edge
    Get { id: TableEdgeId },

    /// Patch a table lineage edge; unset options are left unchanged
    Update(UpdateArgs),

    /// Delete a table lineage edge and its column lineage
    Delete { id: TableEdgeId },

    /// List table lineage edges
    List(ListArgs),

    /// Edges in which a table is a source or the target
    Touching { table_id: TableId },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Source table ids (repeat or comma-separate)
    #[arg(long = "source", short = 's', required = true, value_delimiter = ',')]
    sources: Vec<TableId>,

    /// Target table id
    #[arg(long, short = 't')]
    target: TableId,

    /// Relation type (defaults to the configured default)
    #[arg(long, short = 'r')]
    relation_type: Option<String>,

    #[arg(long, short = 'd')]
    description: Option<String>,

    /// Relation details as a JSON object
    #[arg(long, value_parser = parse_details)]
    details: Option<Details>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    id: TableEdgeId,

    /// Replace the source tables
    #[arg(long = "source", short = 's', value_delimiter = ',')]
    sources: Vec<TableId>,

    #[arg(long, short = 't')]
    target: Option<TableId>,

    #[arg(long, short = 'r')]
    relation_type: Option<String>,

    #[arg(long, short = 'd')]
    description: Option<String>,

    #[arg(long, value_parser = parse_details)]
    details: Option<Details>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only edges listing this table among their sources
    #[arg(long)]
    source: Option<TableId>,

    /// Only edges producing this table
    #[arg(long)]
    target: Option<TableId>,

    #[arg(long, default_value = "0")]
    skip: usize,

    #[arg(long, short = 'n')]
    limit: Option<usize>,
}

pub fn execute(cmd: TableLineageCommand, ctx: &CommandContext) -> Result<()> {
    let handles = ctx.open()?;
    let service = &handles.service;

    match cmd {
        TableLineageCommand::Create(args) => {
            let request = NewTableLineage {
                source_table_ids: args.sources,
                target_table_id: args.target,
                relation_type: args.relation_type,
                description: args.description,
                relation_details: args.details,
            };
            let edge = service
                .create_table_lineage(request)
                .context("Failed to create table lineage")?;
            print_json(&edge)
        }
        TableLineageCommand::Get { id } => print_json(&service.get_table_lineage(id)?),
        TableLineageCommand::Update(args) => {
            let patch = TableLineagePatch {
                source_table_ids: (!args.sources.is_empty()).then_some(args.sources),
                target_table_id: args.target,
                relation_type: args.relation_type,
                description: args.description,
                relation_details: args.details,
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to update: pass at least one field to change");
            }
            let edge = service
                .update_table_lineage(args.id, patch)
                .context("Failed to update table lineage")?;
            print_json(&edge)
        }
        TableLineageCommand::Delete { id } => {
            let cascaded = service
                .delete_table_lineage(id)
                .context("Failed to delete table lineage")?;
            print_json(&serde_json::json!({
                "deleted": id,
                "column_edges_removed": cascaded,
            }))
        }
        TableLineageCommand::List(args) => {
            let filter = TableEdgeFilter {
                source_table_id: args.source,
                target_table_id: args.target,
                skip: args.skip,
                limit: args.limit,
            };
            print_json(&service.list_table_lineage(&filter)?)
        }
        TableLineageCommand::Touching { table_id } => {
            print_json(&service.edges_touching(table_id)?)
        }
    }
}
