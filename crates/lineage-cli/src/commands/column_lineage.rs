//! Column lineage command - CRUD over column lineage edges

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use lineage_core::{
    ColumnEdgeFilter, ColumnEdgeId, ColumnId, ColumnLineagePatch, Details, NewColumnLineage,
    TableEdgeId,
};

use super::{parse_details, print_json, CommandContext};

#[derive(Subcommand, Debug)]
pub enum ColumnLineageCommand {
    /// Map a source column to a target column under a table lineage edge
    Create(CreateArgs),

    /// Show one column lineage edge
    Get { id: ColumnEdgeId },

    /// Patch a column lineage edge; changed references are re-validated
    Update(UpdateArgs),

    /// Delete a column lineage edge
    Delete { id: ColumnEdgeId },

    /// List column lineage edges
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Owning table lineage edge
    #[arg(long, short = 'l')]
    lineage: TableEdgeId,

    #[arg(long, short = 's')]
    source_column: ColumnId,

    #[arg(long, short = 't')]
    target_column: ColumnId,

    /// Transformation details as a JSON object
    #[arg(long, value_parser = parse_details)]
    details: Option<Details>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    id: ColumnEdgeId,

    #[arg(long, short = 'l')]
    lineage: Option<TableEdgeId>,

    #[arg(long, short = 's')]
    source_column: Option<ColumnId>,

    #[arg(long, short = 't')]
    target_column: Option<ColumnId>,

    #[arg(long, value_parser = parse_details)]
    details: Option<Details>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only edges under this table lineage edge
    #[arg(long, short = 'l')]
    lineage: Option<TableEdgeId>,

    #[arg(long)]
    source_column: Option<ColumnId>,

    #[arg(long)]
    target_column: Option<ColumnId>,

    #[arg(long, default_value = "0")]
    skip: usize,

    #[arg(long, short = 'n')]
    limit: Option<usize>,
}

pub fn execute(cmd: ColumnLineageCommand, ctx: &CommandContext) -> Result<()> {
    let handles = ctx.open()?;
    let service = &handles.service;

    match cmd {
        ColumnLineageCommand::Create(args) => {
            let mut request =
                NewColumnLineage::new(args.lineage, args.source_column, args.target_column);
            if let Some(details) = args.details {
                request = request.with_details(details);
            }
            let edge = service
                .create_column_lineage(request)
                .context("Failed to create column lineage")?;
            print_json(&edge)
        }
        ColumnLineageCommand::Get { id } => print_json(&service.get_column_lineage(id)?),
        ColumnLineageCommand::Update(args) => {
            let patch = ColumnLineagePatch {
                lineage_relation_id: args.lineage,
                source_column_id: args.source_column,
                target_column_id: args.target_column,
                transformation_details: args.details,
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to update: pass at least one field to change");
            }
            let edge = service
                .update_column_lineage(args.id, patch)
                .context("Failed to update column lineage")?;
            print_json(&edge)
        }
        ColumnLineageCommand::Delete { id } => {
            service
                .delete_column_lineage(id)
                .context("Failed to delete column lineage")?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
        ColumnLineageCommand::List(args) => {
            let filter = ColumnEdgeFilter {
                lineage_relation_id: args.lineage,
                source_column_id: args.source_column,
                target_column_id: args.target_column,
                skip: args.skip,
                limit: args.limit,
            };
            print_json(&service.list_column_lineage(&filter)?)
        }
    }
}
