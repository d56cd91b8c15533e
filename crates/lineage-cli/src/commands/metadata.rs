//! Metadata command - Register and remove data sources, tables and columns
//!
//! Removal goes through the lineage repository's reference checks, so a
//! table or column that any lineage edge still uses cannot be deleted.

use anyhow::{Context, Result};
use clap::Subcommand;
use lineage_core::{DataSourceType, MetadataStore, Table, TableId};

use super::{print_json, CommandContext, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum MetadataCommand {
    /// Register a data source
    AddSource {
        /// Unique data source name
        name: String,

        /// Source system type (oracle, elasticsearch, mongodb)
        #[arg(long = "type", short = 't')]
        source_type: DataSourceType,

        #[arg(long, short = 'd')]
        description: Option<String>,
    },

    /// Register a table under a data source
    AddTable {
        /// Data source name
        source: String,

        /// Table name, unique within the data source
        name: String,

        #[arg(long)]
        schema: Option<String>,

        #[arg(long, short = 'd')]
        description: Option<String>,
    },

    /// Register a column under a table
    AddColumn {
        /// Owning table id
        table_id: TableId,

        /// Column name, unique within the table
        name: String,

        #[arg(long, short = 't', default_value = "VARCHAR")]
        data_type: String,

        #[arg(long, short = 'd')]
        description: Option<String>,
    },

    /// List registered data sources
    ListSources,

    /// List tables, optionally for one data source
    ListTables {
        /// Data source name
        #[arg(long, short = 's')]
        source: Option<String>,

        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// List the columns of a table
    ListColumns { table_id: TableId },

    /// Remove a table and its columns (refused while lineage references them)
    RemoveTable { table_id: TableId },

    /// Remove a column (refused while column lineage references it)
    RemoveColumn { column_id: i64 },
}

pub fn execute(cmd: MetadataCommand, ctx: &CommandContext) -> Result<()> {
    let handles = ctx.open()?;
    let metadata = &handles.metadata;

    match cmd {
        MetadataCommand::AddSource {
            name,
            source_type,
            description,
        } => {
            let source = metadata
                .add_data_source(&name, source_type, description.as_deref())
                .context("Failed to add data source")?;
            print_json(&source)
        }
        MetadataCommand::AddTable {
            source,
            name,
            schema,
            description,
        } => {
            let data_source = metadata
                .data_source_by_name(&source)?
                .with_context(|| format!("Data source '{}' not found", source))?;
            let table = metadata
                .add_table(
                    data_source.id,
                    &name,
                    schema.as_deref(),
                    description.as_deref(),
                )
                .context("Failed to add table")?;
            print_json(&table)
        }
        MetadataCommand::AddColumn {
            table_id,
            name,
            data_type,
            description,
        } => {
            let column = metadata
                .add_column(table_id, &name, &data_type, description.as_deref())
                .context("Failed to add column")?;
            print_json(&column)
        }
        MetadataCommand::ListSources => print_json(&metadata.list_data_sources()?),
        MetadataCommand::ListTables { source, format } => {
            let data_source_id = match source {
                Some(name) => Some(
                    metadata
                        .data_source_by_name(&name)?
                        .with_context(|| format!("Data source '{}' not found", name))?
                        .id,
                ),
                None => None,
            };
            let tables = metadata.list_tables(data_source_id)?;
            match format {
                OutputFormat::Json => print_json(&tables),
                OutputFormat::Text => {
                    print_tables(&tables);
                    Ok(())
                }
            }
        }
        MetadataCommand::ListColumns { table_id } => {
            if !metadata.table_exists(table_id)? {
                anyhow::bail!("Table {} not found", table_id);
            }
            print_json(&metadata.columns_of(table_id)?)
        }
        MetadataCommand::RemoveTable { table_id } => {
            metadata
                .remove_table(table_id, handles.repository.as_ref())
                .context("Failed to remove table")?;
            handles.cache.invalidate_table(table_id);
            print_json(&serde_json::json!({ "removed_table": table_id }))
        }
        MetadataCommand::RemoveColumn { column_id } => {
            metadata
                .remove_column(column_id, handles.repository.as_ref())
                .context("Failed to remove column")?;
            handles.cache.invalidate_column(column_id);
            print_json(&serde_json::json!({ "removed_column": column_id }))
        }
    }
}

fn print_tables(tables: &[Table]) {
    if tables.is_empty() {
        println!("No tables registered");
        return;
    }
    for table in tables {
        let schema = table
            .schema_name
            .as_deref()
            .map(|s| format!("{s}."))
            .unwrap_or_default();
        let source = table.data_source_name.as_deref().unwrap_or("?");
        match table.data_source_type {
            Some(kind) => println!("{:>6}  {}{}  [{} / {}]", table.id, schema, table.name, source, kind),
            None => println!("{:>6}  {}{}  [{}]", table.id, schema, table.name, source),
        }
    }
}
