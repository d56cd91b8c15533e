//! Lineage Data Model
//!
//! Defines the records the lineage engine reads and writes:
//! - Metadata entities (data sources, tables, columns) owned by the Metadata Store
//! - Table lineage edges (many sources feeding one target)
//! - Column lineage edges anchored to a table lineage edge
//! - Create requests and partial-update patches for both edge kinds

use serde::{Deserialize, Serialize};

/// Relation type assigned to a table edge created without one.
pub const DEFAULT_RELATION_TYPE: &str = "TRANSFORMATION";

pub type DataSourceId = i64;
pub type TableId = i64;
pub type ColumnId = i64;
pub type TableEdgeId = i64;
pub type ColumnEdgeId = i64;

/// Opaque key-value payload attached to lineage edges.
pub type Details = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Metadata Entities
// ============================================================================

/// Kind of system a data source connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceType {
    Oracle,
    Elasticsearch,
    Mongodb,
}

impl DataSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceType::Oracle => "oracle",
            DataSourceType::Elasticsearch => "elasticsearch",
            DataSourceType::Mongodb => "mongodb",
        }
    }
}

impl std::fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataSourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "oracle" => Ok(Self::Oracle),
            "elasticsearch" | "es" => Ok(Self::Elasticsearch),
            "mongodb" | "mongo" => Ok(Self::Mongodb),
            other => Err(format!(
                "Unknown data source type: '{}'. Valid values: oracle, elasticsearch, mongodb",
                other
            )),
        }
    }
}

/// A registered source system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: DataSourceId,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: DataSourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A table as seen by the lineage engine.
///
/// The data source name and type are denormalized at read time so graph
/// nodes can be decorated without a second lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    pub name: String,
    pub data_source_id: DataSourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_type: Option<DataSourceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    pub table_id: TableId,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ============================================================================
// Table Lineage
// ============================================================================

/// One declared transformation producing `target_table_id` from one or more sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLineageEdge {
    pub id: TableEdgeId,

    /// Ordered, duplicate-free, never empty
    pub source_table_ids: Vec<TableId>,

    pub target_table_id: TableId,

    /// Free-form classification (e.g. "ETL", "TRANSFORMATION")
    pub relation_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_details: Option<Details>,

    /// Milliseconds since the Unix epoch
    pub created_at: u64,
}

impl TableLineageEdge {
    /// Check whether `table_id` is one of this edge's sources
    pub fn has_source(&self, table_id: TableId) -> bool {
        self.source_table_ids.contains(&table_id)
    }

    /// Check whether the edge's source set contains every id in `sources`
    pub fn has_all_sources(&self, sources: &[TableId]) -> bool {
        sources.iter().all(|id| self.has_source(*id))
    }

    /// Check whether the edge has exactly this source set (order-insensitive)
    pub fn same_sources(&self, sources: &[TableId]) -> bool {
        let normalized = normalize_table_ids(sources);
        normalized.len() == self.source_table_ids.len() && self.has_all_sources(&normalized)
    }
}

/// Request to create a table lineage edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTableLineage {
    pub source_table_ids: Vec<TableId>,
    pub target_table_id: TableId,
    #[serde(default)]
    pub relation_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub relation_details: Option<Details>,
}

impl NewTableLineage {
    pub fn new(source_table_ids: Vec<TableId>, target_table_id: TableId) -> Self {
        Self {
            source_table_ids,
            target_table_id,
            ..Default::default()
        }
    }

    pub fn with_relation_type(mut self, relation_type: impl Into<String>) -> Self {
        self.relation_type = Some(relation_type.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.relation_details = Some(details);
        self
    }
}

/// Partial update of a table lineage edge. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLineagePatch {
    pub source_table_ids: Option<Vec<TableId>>,
    pub target_table_id: Option<TableId>,
    pub relation_type: Option<String>,
    pub description: Option<String>,
    pub relation_details: Option<Details>,
}

impl TableLineagePatch {
    pub fn is_empty(&self) -> bool {
        self.source_table_ids.is_none()
            && self.target_table_id.is_none()
            && self.relation_type.is_none()
            && self.description.is_none()
            && self.relation_details.is_none()
    }

    /// Whether the patch touches any table reference
    pub fn changes_references(&self) -> bool {
        self.source_table_ids.is_some() || self.target_table_id.is_some()
    }
}

// ============================================================================
// Column Lineage
// ============================================================================

/// One field-level transformation, scoped to a table lineage edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLineageEdge {
    pub id: ColumnEdgeId,
    pub lineage_relation_id: TableEdgeId,
    pub source_column_id: ColumnId,
    pub target_column_id: ColumnId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation_details: Option<Details>,
}

impl ColumnLineageEdge {
    /// Same owning edge and column pair, ignoring details
    pub fn same_references(&self, other: &ColumnLineageEdge) -> bool {
        self.lineage_relation_id == other.lineage_relation_id
            && self.source_column_id == other.source_column_id
            && self.target_column_id == other.target_column_id
    }
}

/// Request to create a column lineage edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewColumnLineage {
    pub lineage_relation_id: TableEdgeId,
    pub source_column_id: ColumnId,
    pub target_column_id: ColumnId,
    #[serde(default)]
    pub transformation_details: Option<Details>,
}

impl NewColumnLineage {
    pub fn new(
        lineage_relation_id: TableEdgeId,
        source_column_id: ColumnId,
        target_column_id: ColumnId,
    ) -> Self {
        Self {
            lineage_relation_id,
            source_column_id,
            target_column_id,
            transformation_details: None,
        }
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.transformation_details = Some(details);
        self
    }
}

/// Partial update of a column lineage edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLineagePatch {
    pub lineage_relation_id: Option<TableEdgeId>,
    pub source_column_id: Option<ColumnId>,
    pub target_column_id: Option<ColumnId>,
    pub transformation_details: Option<Details>,
}

impl ColumnLineagePatch {
    pub fn is_empty(&self) -> bool {
        self.lineage_relation_id.is_none()
            && self.source_column_id.is_none()
            && self.target_column_id.is_none()
            && self.transformation_details.is_none()
    }

    pub fn changes_references(&self) -> bool {
        self.lineage_relation_id.is_some()
            || self.source_column_id.is_some()
            || self.target_column_id.is_some()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Remove duplicate ids, keeping the first occurrence of each.
pub fn normalize_table_ids(ids: &[TableId]) -> Vec<TableId> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Current time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
