//! Common test utilities for integration tests.
//!
//! Builds an on-disk lineage database in a temporary directory with the
//! metadata store, repository and service wired the way the CLI wires them.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use lineage_core::{
    CachedMetadataStore, DataSourceType, GraphView, LineageRepository, LineageService,
    NewTableLineage, SqliteMetadataStore, TableEdgeId, TableId,
};

pub struct TestLineage {
    pub dir: TempDir,
    pub db_path: PathBuf,
    pub metadata: Arc<SqliteMetadataStore>,
    pub cache: Arc<CachedMetadataStore>,
    pub repo: Arc<LineageRepository>,
    pub service: LineageService,
    pub data_source_id: i64,
}

impl TestLineage {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = dir.path().join(".lineage").join("lineage.db");

        let metadata = Arc::new(SqliteMetadataStore::open(&db_path).expect("open metadata"));
        let cache = Arc::new(CachedMetadataStore::new(metadata.clone(), 64));
        let repo =
            Arc::new(LineageRepository::open(&db_path, metadata.clone()).expect("open repository"));
        let service = LineageService::new(repo.clone(), cache.clone());

        let data_source_id = metadata
            .add_data_source("warehouse", DataSourceType::Oracle, None)
            .expect("add data source")
            .id;

        Self {
            dir,
            db_path,
            metadata,
            cache,
            repo,
            service,
            data_source_id,
        }
    }

    pub fn table(&self, name: &str) -> TableId {
        self.metadata
            .add_table(self.data_source_id, name, None, None)
            .expect("add table")
            .id
    }

    pub fn column(&self, table: TableId, name: &str) -> i64 {
        self.metadata
            .add_column(table, name, "NUMBER", None)
            .expect("add column")
            .id
    }

    pub fn link(&self, sources: &[TableId], target: TableId) -> TableEdgeId {
        self.service
            .create_table_lineage(NewTableLineage::new(sources.to_vec(), target))
            .expect("create table lineage")
            .id
    }
}

/// Entity ids of the nodes of one kind ("table" or "column")
pub fn node_ids(view: &GraphView, kind: &str) -> BTreeSet<i64> {
    view.nodes
        .iter()
        .filter(|n| n.kind == kind)
        .map(|n| n.entity_id)
        .collect()
}

/// Edge ids of one kind
pub fn edge_ids(view: &GraphView, kind: &str) -> BTreeSet<String> {
    view.edges
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.id.clone())
        .collect()
}
