//! Lineage Service
//!
//! The caller-facing contract: edge creation, update and deletion, edge
//! listings, and bounded graph queries returned in presentation form. Depth is
//! checked here; the engine below accepts any depth.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Entity, LineageError, Result};
use crate::graph::{GraphView, LayerDirection, LayerEntry, LineageEngine, TraversalDirection};
use crate::graph::traversal::TouchingEdges;
use crate::metadata::MetadataStore;
use crate::model::{
    ColumnEdgeId, ColumnId, ColumnLineageEdge, ColumnLineagePatch, NewColumnLineage,
    NewTableLineage, TableEdgeId, TableId, TableLineageEdge, TableLineagePatch,
};
use crate::storage::{ColumnEdgeFilter, LineageRepository, RepositoryStats, TableEdgeFilter};

/// Largest depth any graph query may request
pub const HARD_MAX_DEPTH: usize = 10;

/// Depth used when a query does not specify one
pub const DEFAULT_DEPTH: usize = 3;

/// Admission bounds for graph queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthLimits {
    pub default_depth: usize,
    pub max_depth: usize,
}

impl Default for DepthLimits {
    fn default() -> Self {
        Self {
            default_depth: DEFAULT_DEPTH,
            max_depth: HARD_MAX_DEPTH,
        }
    }
}

impl DepthLimits {
    /// `max_depth` is capped at [`HARD_MAX_DEPTH`]; `default_depth` at `max_depth`.
    pub fn new(default_depth: usize, max_depth: usize) -> Self {
        let max_depth = max_depth.clamp(1, HARD_MAX_DEPTH);
        Self {
            default_depth: default_depth.clamp(1, max_depth),
            max_depth,
        }
    }

    /// Apply the default and reject depths outside `[1, max_depth]`.
    pub fn resolve(&self, depth: Option<usize>) -> Result<usize> {
        let depth = depth.unwrap_or(self.default_depth);
        if depth < 1 || depth > self.max_depth {
            return Err(LineageError::validation(format!(
                "depth must be between 1 and {}, got {depth}",
                self.max_depth
            )));
        }
        Ok(depth)
    }
}

pub struct LineageService {
    repository: Arc<LineageRepository>,
    engine: LineageEngine,
    limits: DepthLimits,
}

impl LineageService {
    /// `metadata` decorates graph nodes; pass a cached view to spare the database.
    pub fn new(repository: Arc<LineageRepository>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            engine: LineageEngine::new(repository.clone(), metadata),
            repository,
            limits: DepthLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: DepthLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> DepthLimits {
        self.limits
    }

    pub fn engine(&self) -> &LineageEngine {
        &self.engine
    }

    pub fn repository(&self) -> &Arc<LineageRepository> {
        &self.repository
    }

    // =========================================================================
    // Table Lineage
    // =========================================================================

    pub fn create_table_lineage(&self, request: NewTableLineage) -> Result<TableLineageEdge> {
        self.repository.create_table_edge(request)
    }

    pub fn get_table_lineage(&self, id: TableEdgeId) -> Result<TableLineageEdge> {
        self.repository
            .table_edge(id)?
            .ok_or_else(|| LineageError::not_found(Entity::TableLineage, id))
    }

    pub fn update_table_lineage(
        &self,
        id: TableEdgeId,
        patch: TableLineagePatch,
    ) -> Result<TableLineageEdge> {
        self.repository.update_table_edge(id, patch)
    }

    /// Returns the number of cascaded column edges.
    pub fn delete_table_lineage(&self, id: TableEdgeId) -> Result<usize> {
        self.repository.delete_table_edge(id)
    }

    pub fn list_table_lineage_by_source(&self, table_id: TableId) -> Result<Vec<TableLineageEdge>> {
        self.repository.edges_by_source(table_id)
    }

    /// Edges producing `table_id`, optionally only those fed by every id in `sources`
    pub fn list_table_lineage_by_target(
        &self,
        table_id: TableId,
        sources: Option<&[TableId]>,
    ) -> Result<Vec<TableLineageEdge>> {
        match sources {
            Some(sources) if !sources.is_empty() => {
                self.repository.edges_by_target_from(table_id, sources)
            }
            _ => self.repository.edges_by_target(table_id),
        }
    }

    pub fn list_table_lineage(&self, filter: &TableEdgeFilter) -> Result<Vec<TableLineageEdge>> {
        self.repository.list_table_edges(filter)
    }

    pub fn edges_touching(&self, table_id: TableId) -> Result<TouchingEdges> {
        self.engine.edges_touching(table_id)
    }

    // =========================================================================
    // Column Lineage
    // =========================================================================

    pub fn create_column_lineage(&self, request: NewColumnLineage) -> Result<ColumnLineageEdge> {
        self.repository.create_column_edge(request)
    }

    pub fn get_column_lineage(&self, id: ColumnEdgeId) -> Result<ColumnLineageEdge> {
        self.repository
            .column_edge(id)?
            .ok_or_else(|| LineageError::not_found(Entity::ColumnLineage, id))
    }

    pub fn update_column_lineage(
        &self,
        id: ColumnEdgeId,
        patch: ColumnLineagePatch,
    ) -> Result<ColumnLineageEdge> {
        self.repository.update_column_edge(id, patch)
    }

    pub fn delete_column_lineage(&self, id: ColumnEdgeId) -> Result<()> {
        self.repository.delete_column_edge(id)
    }

    pub fn list_column_lineage(&self, filter: &ColumnEdgeFilter) -> Result<Vec<ColumnLineageEdge>> {
        self.repository.list_column_edges(filter)
    }

    // =========================================================================
    // Graph Queries
    // =========================================================================

    /// Table lineage graph. `direction` accepts up/down/both and the
    /// upstream/downstream synonyms; anything else means both.
    pub fn get_table_lineage_graph(
        &self,
        table_id: TableId,
        depth: Option<usize>,
        direction: Option<&str>,
    ) -> Result<GraphView> {
        let depth = self.limits.resolve(depth)?;
        let direction = direction.map(TraversalDirection::normalize).unwrap_or_default();
        debug!(table_id, depth, direction = %direction, "Table lineage graph requested");
        let graph = self.engine.table_graph(table_id, depth, direction)?;
        Ok(GraphView::from(&graph))
    }

    pub fn get_column_lineage_graph(
        &self,
        column_id: ColumnId,
        depth: Option<usize>,
        direction: Option<&str>,
    ) -> Result<GraphView> {
        let depth = self.limits.resolve(depth)?;
        let direction = direction.map(TraversalDirection::normalize).unwrap_or_default();
        debug!(column_id, depth, direction = %direction, "Column lineage graph requested");
        let graph = self.engine.column_graph(column_id, depth, direction)?;
        Ok(GraphView::from(&graph))
    }

    pub fn get_lineage_layers(
        &self,
        table_id: TableId,
        depth: Option<usize>,
        direction: LayerDirection,
    ) -> Result<Vec<LayerEntry>> {
        let depth = self.limits.resolve(depth)?;
        self.engine.layers(table_id, depth, direction)
    }

    pub fn stats(&self) -> Result<RepositoryStats> {
        self.repository.stats()
    }
}
