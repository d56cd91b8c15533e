//! Repository integration tests against an on-disk database.
//!
//! Covers persistence across reopen, guarded metadata deletes and the batch
//! importer end to end.

mod common;

use std::sync::Arc;

use common::TestLineage;
use lineage_core::{
    BatchImporter, ImportFile, LineageError, LineageRepository, NewColumnLineage,
    NewTableLineage, SqliteMetadataStore, TableEdgeFilter, TableLineagePatch,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_edges_survive_reopen() {
    let env = TestLineage::new();
    let orders = env.table("orders");
    let summary = env.table("order_summary");
    let amount = env.column(orders, "amount");
    let total = env.column(summary, "total");

    let edge = env
        .service
        .create_table_lineage(
            NewTableLineage::new(vec![orders], summary)
                .with_relation_type("AGGREGATION")
                .with_description("daily rollup"),
        )
        .unwrap();
    let column_edge = env
        .service
        .create_column_lineage(NewColumnLineage::new(edge.id, amount, total))
        .unwrap();

    let metadata = Arc::new(SqliteMetadataStore::open(&env.db_path).unwrap());
    let reopened = LineageRepository::open(&env.db_path, metadata).unwrap();

    assert_eq!(reopened.table_edge(edge.id).unwrap(), Some(edge.clone()));
    assert_eq!(reopened.column_edge(column_edge.id).unwrap(), Some(column_edge));
    let stats = reopened.stats().unwrap();
    assert_eq!(stats.table_edges, 1);
    assert_eq!(stats.column_edges, 1);
}

#[test]
fn test_update_then_list_by_filter() {
    let env = TestLineage::new();
    let a = env.table("a");
    let b = env.table("b");
    let c = env.table("c");
    let edge = env.link(&[a], b);

    let updated = env
        .service
        .update_table_lineage(
            edge,
            TableLineagePatch {
                source_table_ids: Some(vec![a, c]),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.source_table_ids, vec![a, c]);

    let by_c = env
        .service
        .list_table_lineage(&TableEdgeFilter {
            source_table_id: Some(c),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_c, vec![updated]);
}

#[test]
fn test_update_rejects_missing_source() {
    let env = TestLineage::new();
    let a = env.table("a");
    let b = env.table("b");
    let edge = env.link(&[a], b);

    let err = env
        .service
        .update_table_lineage(
            edge,
            TableLineagePatch {
                source_table_ids: Some(vec![a, 9999]),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, LineageError::InvalidReference { .. }));
    assert_eq!(env.service.get_table_lineage(edge).unwrap().source_table_ids, vec![a]);
}

// ============================================================================
// Guarded Metadata Deletes
// ============================================================================

#[test]
fn test_referenced_table_cannot_be_removed() {
    let env = TestLineage::new();
    let a = env.table("a");
    let b = env.table("b");
    let edge = env.link(&[a], b);

    let err = env.metadata.remove_table(a, env.repo.as_ref()).unwrap_err();
    assert!(err.is_conflict());

    env.service.delete_table_lineage(edge).unwrap();
    env.metadata.remove_table(a, env.repo.as_ref()).unwrap();
    assert!(env.metadata.list_tables(None).unwrap().iter().all(|t| t.id != a));
}

#[test]
fn test_referenced_column_cannot_be_removed() {
    let env = TestLineage::new();
    let a = env.table("a");
    let b = env.table("b");
    let edge = env.link(&[a], b);
    let x = env.column(a, "x");
    let y = env.column(b, "y");
    let spare = env.column(a, "spare");
    let column_edge = env
        .service
        .create_column_lineage(NewColumnLineage::new(edge, x, y))
        .unwrap();

    assert!(env
        .metadata
        .remove_column(x, env.repo.as_ref())
        .unwrap_err()
        .is_conflict());
    env.metadata.remove_column(spare, env.repo.as_ref()).unwrap();

    env.service.delete_column_lineage(column_edge.id).unwrap();
    env.metadata.remove_column(x, env.repo.as_ref()).unwrap();
}

// ============================================================================
// Import
// ============================================================================

const IMPORT_JSON: &str = r#"{
  "lineages": [
    {
      "sources": [{"data_source": "warehouse", "table": "orders"}],
      "target": {"data_source": "warehouse", "table": "order_summary"},
      "relation_type": "AGGREGATION",
      "transformation_logic": "SUM(amount) GROUP BY day",
      "columns": [
        {"source_column": "amount", "target_column": "total"}
      ]
    },
    {
      "sources": [{"data_source": "warehouse", "table": "ghost"}],
      "target": {"data_source": "warehouse", "table": "order_summary"}
    }
  ]
}"#;

#[test]
fn test_import_file_end_to_end() {
    let env = TestLineage::new();
    let orders = env.table("orders");
    let summary = env.table("order_summary");
    env.column(orders, "amount");
    env.column(summary, "total");

    let file = ImportFile::from_json(IMPORT_JSON).unwrap();
    let importer = BatchImporter::new(&env.service, env.cache.as_ref());

    let report = importer.import(&file.lineages);
    assert_eq!(report.rows, 2);
    assert_eq!(report.created, 1);
    assert_eq!(report.columns_created, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row, 2);
    assert!(!report.is_clean());

    let again = importer.import(&file.lineages);
    assert_eq!(again.created, 0);
    assert_eq!(again.updated, 1);
    assert_eq!(again.columns_existing, 1);

    let edges = env.service.list_table_lineage_by_target(summary, None).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].relation_type, "AGGREGATION");
}
