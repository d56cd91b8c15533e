//! Best-effort batch import of declared lineage.
//!
//! Rows name tables by data source and table name. Each row is applied on its
//! own: a row that fails is recorded in the report and the batch moves on,
//! leaving rows already applied untouched.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LineageError, Result};
use crate::metadata::MetadataStore;
use crate::model::{
    Details, NewColumnLineage, NewTableLineage, Table, TableEdgeId, TableLineageEdge,
    TableLineagePatch,
};
use crate::service::LineageService;

/// A table named by its data source and table name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub data_source: String,
    pub table: String,
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.data_source, self.table)
    }
}

/// A column mapping under an imported table edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Name of the source table holding `source_column`; searched in source
    /// order when absent
    #[serde(default)]
    pub source_table: Option<String>,
    pub source_column: String,
    pub target_column: String,
    #[serde(default)]
    pub transformation_details: Option<Details>,
}

/// One declared table lineage, with optional column mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageImportRow {
    pub sources: Vec<TableRef>,
    pub target: TableRef,
    #[serde(default)]
    pub relation_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Stored under the `transformation_logic` key of the relation details
    #[serde(default)]
    pub transformation_logic: Option<String>,
    #[serde(default)]
    pub relation_details: Option<Details>,
    #[serde(default)]
    pub columns: Vec<ColumnMapping>,
}

/// Top-level shape of an import file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportFile {
    #[serde(default)]
    pub lineages: Vec<LineageImportRow>,
}

impl ImportFile {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// A failure tied to one input row (1-based).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub rows: usize,
    pub created: usize,
    pub updated: usize,
    pub columns_created: usize,
    /// Column mappings that were already recorded
    pub columns_existing: usize,
    pub errors: Vec<RowError>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn fail(&mut self, row: usize, message: impl Into<String>) {
        let message = message.into();
        warn!(row, %message, "Import row rejected");
        self.errors.push(RowError { row, message });
    }
}

enum Applied {
    Created(TableLineageEdge),
    Updated(TableLineageEdge),
}

pub struct BatchImporter<'a> {
    service: &'a LineageService,
    metadata: &'a dyn MetadataStore,
}

impl<'a> BatchImporter<'a> {
    pub fn new(service: &'a LineageService, metadata: &'a dyn MetadataStore) -> Self {
        Self { service, metadata }
    }

    /// Apply every row, collecting per-row failures instead of stopping.
    pub fn import(&self, rows: &[LineageImportRow]) -> ImportReport {
        let mut report = ImportReport {
            rows: rows.len(),
            ..Default::default()
        };

        for (i, row) in rows.iter().enumerate() {
            let line = i + 1;
            let (sources, target) = match self.resolve_tables(row) {
                Ok(resolved) => resolved,
                Err(message) => {
                    report.fail(line, message);
                    continue;
                }
            };

            let edge = match self.apply_table_edge(row, &sources, &target) {
                Ok(Applied::Created(edge)) => {
                    report.created += 1;
                    edge
                }
                Ok(Applied::Updated(edge)) => {
                    report.updated += 1;
                    edge
                }
                Err(e) => {
                    report.fail(line, e.to_string());
                    continue;
                }
            };

            for mapping in &row.columns {
                match self.apply_column_mapping(edge.id, mapping, &sources, &target) {
                    Ok(()) => report.columns_created += 1,
                    Err(ColumnOutcome::Existing) => report.columns_existing += 1,
                    Err(ColumnOutcome::Failed(message)) => report.fail(line, message),
                }
            }
        }

        info!(
            rows = report.rows,
            created = report.created,
            updated = report.updated,
            columns = report.columns_created,
            errors = report.errors.len(),
            "Lineage import finished"
        );
        report
    }

    fn resolve_table(&self, table: &TableRef, role: &str) -> std::result::Result<Table, String> {
        let ds = self
            .metadata
            .data_source_by_name(&table.data_source)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("{role} data source '{}' does not exist", table.data_source))?;
        self.metadata
            .table_by_name(ds.id, &table.table)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("{role} table '{table}' does not exist"))
    }

    fn resolve_tables(&self, row: &LineageImportRow) -> std::result::Result<(Vec<Table>, Table), String> {
        if row.sources.is_empty() {
            return Err("row has no source tables".to_string());
        }
        let sources = row
            .sources
            .iter()
            .map(|s| self.resolve_table(s, "source"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let target = self.resolve_table(&row.target, "target")?;
        Ok((sources, target))
    }

    /// Update the edge with exactly this source set and target, or create one.
    fn apply_table_edge(
        &self,
        row: &LineageImportRow,
        sources: &[Table],
        target: &Table,
    ) -> Result<Applied> {
        let source_ids: Vec<i64> = sources.iter().map(|t| t.id).collect();
        let details = merged_details(row);

        let existing = self
            .service
            .list_table_lineage_by_target(target.id, Some(&source_ids))?
            .into_iter()
            .find(|edge| edge.same_sources(&source_ids));

        match existing {
            Some(edge) => {
                let updated = self.service.update_table_lineage(
                    edge.id,
                    TableLineagePatch {
                        relation_type: row.relation_type.clone(),
                        description: row.description.clone(),
                        relation_details: details,
                        ..Default::default()
                    },
                )?;
                Ok(Applied::Updated(updated))
            }
            None => {
                let created = self.service.create_table_lineage(NewTableLineage {
                    source_table_ids: source_ids,
                    target_table_id: target.id,
                    relation_type: row.relation_type.clone(),
                    description: row.description.clone(),
                    relation_details: details,
                })?;
                Ok(Applied::Created(created))
            }
        }
    }

    fn apply_column_mapping(
        &self,
        edge_id: TableEdgeId,
        mapping: &ColumnMapping,
        sources: &[Table],
        target: &Table,
    ) -> std::result::Result<(), ColumnOutcome> {
        let failed = |e: LineageError| ColumnOutcome::Failed(e.to_string());

        let candidates: Vec<&Table> = match &mapping.source_table {
            Some(name) => sources.iter().filter(|t| &t.name == name).collect(),
            None => sources.iter().collect(),
        };
        let mut source_column = None;
        for table in candidates {
            if let Some(column) = self
                .metadata
                .column_by_name(table.id, &mapping.source_column)
                .map_err(failed)?
            {
                source_column = Some(column);
                break;
            }
        }
        let source_column = source_column.ok_or_else(|| {
            ColumnOutcome::Failed(format!(
                "source column '{}' not found in source tables",
                mapping.source_column
            ))
        })?;
        let target_column = self
            .metadata
            .column_by_name(target.id, &mapping.target_column)
            .map_err(failed)?
            .ok_or_else(|| {
                ColumnOutcome::Failed(format!(
                    "target column '{}.{}' not found",
                    target.name, mapping.target_column
                ))
            })?;

        let mut request = NewColumnLineage::new(edge_id, source_column.id, target_column.id);
        request.transformation_details = mapping.transformation_details.clone();
        match self.service.create_column_lineage(request) {
            Ok(_) => Ok(()),
            Err(LineageError::Conflict(_)) => Err(ColumnOutcome::Existing),
            Err(e) => Err(failed(e)),
        }
    }
}

enum ColumnOutcome {
    Existing,
    Failed(String),
}

fn merged_details(row: &LineageImportRow) -> Option<Details> {
    let mut details = row.relation_details.clone();
    if let Some(logic) = row.transformation_logic.as_ref().filter(|l| !l.is_empty()) {
        details.get_or_insert_with(Details::new).insert(
            "transformation_logic".to_string(),
            serde_json::Value::String(logic.clone()),
        );
    }
    details
}
