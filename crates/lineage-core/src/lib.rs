//! Lineage Core - table and column lineage graph engine
//!
//! This crate provides the core functionality for declared data lineage:
//! - Data model for many-to-one table lineage and column lineage on top of it
//! - Metadata Store trait with a SQLite implementation and a bounded LRU cache
//! - SQLite-backed Lineage Repository with referential validation
//! - Cycle-safe, depth-bounded graph traversal over petgraph adjacency indexes
//! - Presentation mapping and a best-effort batch importer

pub mod error;
pub mod graph;
pub mod import;
pub mod metadata;
pub mod model;
pub mod service;
pub mod storage;

// Re-exports for convenience
pub use error::{Entity, InvalidReference, LineageError, ReferenceRole, Result};
pub use model::{
    Column, ColumnEdgeId, ColumnId, ColumnLineageEdge, ColumnLineagePatch, DataSource,
    DataSourceId, DataSourceType, Details, NewColumnLineage, NewTableLineage, Table, TableEdgeId,
    TableId, TableLineageEdge, TableLineagePatch, DEFAULT_RELATION_TYPE,
};

// Graph re-exports
pub use graph::traversal::TouchingEdges;
pub use graph::{
    AdjacencyIndex, EdgeKind, GraphView, LayerDirection, LayerEntry, LineageEngine, LineageGraph,
    NodeKind, NodeRef, TraversalDirection, ViewEdge, ViewNode,
};

// Storage and metadata re-exports
pub use metadata::{
    CacheMetrics, CachedMetadataStore, MetadataStore, ReferenceCheck, SqliteMetadataStore,
};
pub use storage::{ColumnEdgeFilter, LineageRepository, RepositoryStats, TableEdgeFilter};

// Service re-exports
pub use import::{
    BatchImporter, ColumnMapping, ImportFile, ImportReport, LineageImportRow, RowError, TableRef,
};
pub use service::{DepthLimits, LineageService, DEFAULT_DEPTH, HARD_MAX_DEPTH};
