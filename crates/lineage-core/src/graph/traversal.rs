//! Lineage Graph Engine
//!
//! Bounded-depth traversals over the lineage repository:
//!
//! - [`LineageEngine::table_graph`]: table lineage closure, up, down or both
//! - [`LineageEngine::column_graph`]: column lineage closure plus `contains`
//!   links from each column's table
//! - [`LineageEngine::layers`]: upstream or downstream tables with their hop number
//! - [`LineageEngine::edges_touching`]: edges where a table is source or target
//!
//! Every call reads the full edge set once and builds a fresh
//! [`AdjacencyIndex`]; the engine keeps no state between calls.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::index::{AdjacencyIndex, Neighbor};
use super::{
    EdgeKind, GraphEdge, GraphNode, LayerDirection, LineageGraph, NodeRef, TraversalDirection,
    COLUMN_RELATION_TYPE, CONTAINS_RELATION_TYPE,
};
use crate::error::{Entity, LineageError, Result};
use crate::metadata::MetadataStore;
use crate::model::{Column, ColumnId, Table, TableEdgeId, TableId, TableLineageEdge};
use crate::storage::LineageRepository;

/// One table in a layered upstream/downstream listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerEntry {
    pub table_id: TableId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_name: Option<String>,
    /// Hops from the start table, starting at 1
    pub layer: usize,
    /// Table edge through which the table was first reached
    pub edge_id: TableEdgeId,
    pub relation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation_description: Option<String>,
}

/// Edges in which a table takes part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TouchingEdges {
    /// Edges listing the table among their sources
    pub as_source: Vec<TableLineageEdge>,
    /// Edges producing the table
    pub as_target: Vec<TableLineageEdge>,
}

/// A pending expansion in the table walk. The path set is owned by the frame.
struct TableFrame {
    table: TableId,
    depth: usize,
    path: HashSet<TableId>,
}

/// Lazily resolved metadata for one traversal. Each dangling id is counted once.
struct Resolver<'a> {
    metadata: &'a dyn MetadataStore,
    tables: HashMap<TableId, Option<Table>>,
    columns: HashMap<ColumnId, Option<Column>>,
    dangling_tables: HashSet<TableId>,
    dangling_columns: HashSet<ColumnId>,
}

impl<'a> Resolver<'a> {
    fn new(metadata: &'a dyn MetadataStore) -> Self {
        Self {
            metadata,
            tables: HashMap::new(),
            columns: HashMap::new(),
            dangling_tables: HashSet::new(),
            dangling_columns: HashSet::new(),
        }
    }

    fn table(&mut self, id: TableId) -> Result<Option<Table>> {
        if let Some(cached) = self.tables.get(&id) {
            return Ok(cached.clone());
        }
        let found = self.metadata.table(id)?;
        if found.is_none() {
            self.dangling_tables.insert(id);
        }
        self.tables.insert(id, found.clone());
        Ok(found)
    }

    fn column(&mut self, id: ColumnId) -> Result<Option<Column>> {
        if let Some(cached) = self.columns.get(&id) {
            return Ok(cached.clone());
        }
        let found = self.metadata.column(id)?;
        if found.is_none() {
            self.dangling_columns.insert(id);
        }
        self.columns.insert(id, found.clone());
        Ok(found)
    }

    fn skipped(&self) -> usize {
        self.dangling_tables.len() + self.dangling_columns.len()
    }
}

/// Stateless traversal engine over a lineage repository.
pub struct LineageEngine {
    repository: Arc<LineageRepository>,
    metadata: Arc<dyn MetadataStore>,
}

impl LineageEngine {
    /// `metadata` is used for start-node checks and node decoration; it may
    /// be a cached view of the store the repository validates against.
    pub fn new(repository: Arc<LineageRepository>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            repository,
            metadata,
        }
    }

    pub fn repository(&self) -> &Arc<LineageRepository> {
        &self.repository
    }

    // =========================================================================
    // Table Graph
    // =========================================================================

    /// Table lineage graph around `start` up to `depth` hops.
    ///
    /// Fails with `NotFound` only when `start` is not a known table. Edges
    /// into tables already on the current path are emitted but not expanded,
    /// which keeps cycles finite. Walking down `a -> b -> c -> a` therefore
    /// returns the closing edge `c -> a` too. Tables missing from the metadata
    /// store are left out and counted in `skipped_references`.
    pub fn table_graph(
        &self,
        start: TableId,
        depth: usize,
        direction: TraversalDirection,
    ) -> Result<LineageGraph> {
        let start_table = self
            .metadata
            .table(start)?
            .ok_or_else(|| LineageError::not_found(Entity::Table, start))?;

        let edges = self.repository.all_table_edges()?;
        let relation_types: HashMap<TableEdgeId, &str> = edges
            .iter()
            .map(|e| (e.id, e.relation_type.as_str()))
            .collect();
        let index = AdjacencyIndex::from_table_edges(&edges);

        let mut resolver = Resolver::new(self.metadata.as_ref());
        let mut graph = LineageGraph::new();
        graph.add_node(GraphNode::from_table(&start_table));

        // Shallowest depth at which each table has been queued
        let mut best_depth: HashMap<TableId, usize> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([TableFrame {
            table: start,
            depth: 0,
            path: HashSet::from([start]),
        }]);

        while let Some(frame) = queue.pop_front() {
            if frame.depth >= depth {
                continue;
            }

            let mut hops: Vec<(Neighbor<TableId>, bool)> = Vec::new();
            if direction.includes_up() {
                hops.extend(index.upstream(frame.table).into_iter().map(|n| (n, true)));
            }
            if direction.includes_down() {
                hops.extend(index.downstream(frame.table).into_iter().map(|n| (n, false)));
            }

            for (neighbor, upstream) in hops {
                let Some(table) = resolver.table(neighbor.id)? else {
                    continue;
                };
                graph.add_node(GraphNode::from_table(&table));

                let (source, target) = if upstream {
                    (neighbor.id, frame.table)
                } else {
                    (frame.table, neighbor.id)
                };
                graph.add_edge(GraphEdge {
                    kind: EdgeKind::TableLineage,
                    source: NodeRef::table(source),
                    target: NodeRef::table(target),
                    lineage_id: Some(neighbor.edge_id),
                    relation_type: relation_types
                        .get(&neighbor.edge_id)
                        .copied()
                        .unwrap_or_default()
                        .to_string(),
                });

                if frame.path.contains(&neighbor.id) {
                    continue;
                }
                let next_depth = frame.depth + 1;
                if best_depth
                    .get(&neighbor.id)
                    .is_some_and(|&seen| seen <= next_depth)
                {
                    continue;
                }
                best_depth.insert(neighbor.id, next_depth);

                let mut path = frame.path.clone();
                path.insert(neighbor.id);
                queue.push_back(TableFrame {
                    table: neighbor.id,
                    depth: next_depth,
                    path,
                });
            }
        }

        graph.skipped_references = resolver.skipped();
        self.log_result("table", start, depth, direction, &graph);
        Ok(graph)
    }

    // =========================================================================
    // Column Graph
    // =========================================================================

    /// Column lineage graph around `start` up to `depth` hops.
    ///
    /// Upstream and downstream are walked independently. A column may be
    /// re-expanded whenever it is reached by a shorter route, and depth alone
    /// bounds the walk. Every column node gets a `contains` link from its table.
    pub fn column_graph(
        &self,
        start: ColumnId,
        depth: usize,
        direction: TraversalDirection,
    ) -> Result<LineageGraph> {
        let start_column = self
            .metadata
            .column(start)?
            .ok_or_else(|| LineageError::not_found(Entity::Column, start))?;

        let edges = self.repository.all_column_edges()?;
        let index = AdjacencyIndex::from_column_edges(&edges);

        let mut resolver = Resolver::new(self.metadata.as_ref());
        let mut graph = LineageGraph::new();
        add_column_with_table(&mut graph, &mut resolver, &start_column)?;

        if direction.includes_up() {
            walk_columns(&index, &mut resolver, &mut graph, start, depth, true)?;
        }
        if direction.includes_down() {
            walk_columns(&index, &mut resolver, &mut graph, start, depth, false)?;
        }

        graph.skipped_references = resolver.skipped();
        self.log_result("column", start, depth, direction, &graph);
        Ok(graph)
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Tables reached from `start` in one direction, grouped by hop number.
    ///
    /// Each table is listed once, at the layer and through the edge by which
    /// it was first reached; the start table itself is not listed.
    pub fn layers(
        &self,
        start: TableId,
        depth: usize,
        direction: LayerDirection,
    ) -> Result<Vec<LayerEntry>> {
        if !self.metadata.table_exists(start)? {
            return Err(LineageError::not_found(Entity::Table, start));
        }

        let edges = self.repository.all_table_edges()?;
        let by_id: HashMap<TableEdgeId, &TableLineageEdge> =
            edges.iter().map(|e| (e.id, e)).collect();
        let index = AdjacencyIndex::from_table_edges(&edges);

        let mut resolver = Resolver::new(self.metadata.as_ref());
        let mut visited = HashSet::from([start]);
        let mut frontier = vec![start];
        let mut entries = Vec::new();

        for layer in 1..=depth {
            let mut next = Vec::new();
            for table_id in frontier {
                let neighbors = match direction {
                    LayerDirection::Upstream => index.upstream(table_id),
                    LayerDirection::Downstream => index.downstream(table_id),
                };
                for neighbor in neighbors {
                    if visited.contains(&neighbor.id) {
                        continue;
                    }
                    let Some(table) = resolver.table(neighbor.id)? else {
                        continue;
                    };
                    visited.insert(neighbor.id);
                    let edge = by_id.get(&neighbor.edge_id);
                    entries.push(LayerEntry {
                        table_id: table.id,
                        name: table.name,
                        data_source_name: table.data_source_name,
                        layer,
                        edge_id: neighbor.edge_id,
                        relation_type: edge.map(|e| e.relation_type.clone()).unwrap_or_default(),
                        relation_description: edge.and_then(|e| e.description.clone()),
                    });
                    next.push(neighbor.id);
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        if resolver.skipped() > 0 {
            warn!(
                start,
                skipped = resolver.skipped(),
                "Skipped dangling table references in layered listing"
            );
        }
        Ok(entries)
    }

    /// Edges where `table_id` is a source and edges where it is the target.
    pub fn edges_touching(&self, table_id: TableId) -> Result<TouchingEdges> {
        Ok(TouchingEdges {
            as_source: self.repository.edges_by_source(table_id)?,
            as_target: self.repository.edges_by_target(table_id)?,
        })
    }

    fn log_result(
        &self,
        kind: &str,
        start: i64,
        depth: usize,
        direction: TraversalDirection,
        graph: &LineageGraph,
    ) {
        debug!(
            kind,
            start,
            depth,
            direction = %direction,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Assembled lineage graph"
        );
        if graph.skipped_references > 0 {
            warn!(
                kind,
                start,
                skipped = graph.skipped_references,
                "Skipped dangling references while assembling lineage graph"
            );
        }
    }
}

// ============================================================================
// Column Walk
// ============================================================================

/// Add a column node plus its table node and `contains` link.
fn add_column_with_table(
    graph: &mut LineageGraph,
    resolver: &mut Resolver<'_>,
    column: &Column,
) -> Result<()> {
    match resolver.table(column.table_id)? {
        Some(table) => {
            graph.add_node(GraphNode::from_table(&table));
            graph.add_node(GraphNode::from_column(column, &table));
            graph.add_edge(GraphEdge {
                kind: EdgeKind::Contains,
                source: NodeRef::table(table.id),
                target: NodeRef::column(column.id),
                lineage_id: None,
                relation_type: CONTAINS_RELATION_TYPE.to_string(),
            });
        }
        None => {
            graph.add_node(GraphNode {
                node: NodeRef::column(column.id),
                name: column.name.clone(),
                data_source_name: None,
                data_source_type: None,
                table_id: Some(column.table_id),
                data_type: Some(column.data_type.clone()),
            });
        }
    }
    Ok(())
}

fn walk_columns(
    index: &AdjacencyIndex<ColumnId>,
    resolver: &mut Resolver<'_>,
    graph: &mut LineageGraph,
    start: ColumnId,
    limit: usize,
    upstream: bool,
) -> Result<()> {
    // Shallowest depth seen per column in this pass; a shorter route re-expands
    let mut best_depth: HashMap<ColumnId, usize> = HashMap::from([(start, 0)]);
    let mut stack = vec![(start, 0usize)];

    while let Some((current, depth)) = stack.pop() {
        if depth >= limit || best_depth.get(&current).is_some_and(|&d| d < depth) {
            continue;
        }

        let neighbors = if upstream {
            index.upstream(current)
        } else {
            index.downstream(current)
        };

        for neighbor in neighbors {
            let Some(column) = resolver.column(neighbor.id)? else {
                continue;
            };
            add_column_with_table(graph, resolver, &column)?;

            let (source, target) = if upstream {
                (neighbor.id, current)
            } else {
                (current, neighbor.id)
            };
            graph.add_edge(GraphEdge {
                kind: EdgeKind::ColumnLineage,
                source: NodeRef::column(source),
                target: NodeRef::column(target),
                lineage_id: Some(neighbor.edge_id),
                relation_type: COLUMN_RELATION_TYPE.to_string(),
            });

            let next_depth = depth + 1;
            if best_depth
                .get(&neighbor.id)
                .is_some_and(|&seen| seen <= next_depth)
            {
                continue;
            }
            best_depth.insert(neighbor.id, next_depth);
            stack.push((neighbor.id, next_depth));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SqliteMetadataStore;
    use crate::model::{DataSourceType, NewColumnLineage, NewTableLineage};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    struct Fixture {
        metadata: Arc<SqliteMetadataStore>,
        repo: Arc<LineageRepository>,
        engine: LineageEngine,
        ds: i64,
    }

    fn fixture() -> Fixture {
        let metadata = Arc::new(SqliteMetadataStore::in_memory().unwrap());
        let ds = metadata
            .add_data_source("dwh", DataSourceType::Oracle, None)
            .unwrap()
            .id;
        let repo = Arc::new(LineageRepository::in_memory(metadata.clone()).unwrap());
        let engine = LineageEngine::new(repo.clone(), metadata.clone());
        Fixture {
            metadata,
            repo,
            engine,
            ds,
        }
    }

    impl Fixture {
        fn table(&self, name: &str) -> TableId {
            self.metadata.add_table(self.ds, name, None, None).unwrap().id
        }

        fn link(&self, sources: &[TableId], target: TableId) -> TableEdgeId {
            self.repo
                .create_table_edge(NewTableLineage::new(sources.to_vec(), target))
                .unwrap()
                .id
        }
    }

    #[test]
    fn test_depth_zero_is_start_only() {
        let f = fixture();
        let a = f.table("a");
        let b = f.table("b");
        f.link(&[a], b);

        let graph = f.engine.table_graph(a, 0, TraversalDirection::Both).unwrap();
        assert_eq!(graph.table_ids(), BTreeSet::from([a]));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_missing_start_is_not_found() {
        let f = fixture();
        assert!(f
            .engine
            .table_graph(77, 3, TraversalDirection::Both)
            .unwrap_err()
            .is_not_found());
        assert!(f
            .engine
            .column_graph(77, 3, TraversalDirection::Both)
            .unwrap_err()
            .is_not_found());
        assert!(f
            .engine
            .layers(77, 3, LayerDirection::Upstream)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_depth_bounds_chain() {
        let f = fixture();
        let ids: Vec<_> = (0..5).map(|i| f.table(&format!("t{i}"))).collect();
        for pair in ids.windows(2) {
            f.link(&[pair[0]], pair[1]);
        }

        let graph = f
            .engine
            .table_graph(ids[0], 2, TraversalDirection::Down)
            .unwrap();
        assert_eq!(graph.table_ids(), BTreeSet::from([ids[0], ids[1], ids[2]]));
        assert_eq!(graph.edge_count(), 2);

        let graph = f
            .engine
            .table_graph(ids[4], 10, TraversalDirection::Down)
            .unwrap();
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_cycle_edge_emitted_without_reexpansion() {
        let f = fixture();
        let a = f.table("a");
        let b = f.table("b");
        let c = f.table("c");
        let ab = f.link(&[a], b);
        let bc = f.link(&[b], c);
        let ca = f.link(&[c], a);

        let graph = f.engine.table_graph(a, 10, TraversalDirection::Down).unwrap();
        assert_eq!(graph.table_ids(), BTreeSet::from([a, b, c]));
        assert_eq!(
            graph.links(EdgeKind::TableLineage),
            BTreeSet::from([(a, b, Some(ab)), (b, c, Some(bc)), (c, a, Some(ca))])
        );
    }

    #[test]
    fn test_dangling_reference_skipped_and_counted() {
        let f = fixture();
        let a = f.table("a");
        let b = f.table("b");
        let gone = f.table("gone");
        f.link(&[a, gone], b);
        struct NoRefs;
        impl crate::metadata::ReferenceCheck for NoRefs {
            fn table_is_referenced(&self, _: TableId) -> Result<bool> {
                Ok(false)
            }
            fn column_is_referenced(&self, _: ColumnId) -> Result<bool> {
                Ok(false)
            }
        }
        f.metadata.remove_table(gone, &NoRefs).unwrap();

        let graph = f.engine.table_graph(b, 3, TraversalDirection::Up).unwrap();
        assert_eq!(graph.table_ids(), BTreeSet::from([a, b]));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.skipped_references, 1);
    }

    #[test]
    fn test_relation_type_on_graph_edges() {
        let f = fixture();
        let a = f.table("a");
        let b = f.table("b");
        f.repo
            .create_table_edge(NewTableLineage::new(vec![a], b).with_relation_type("ETL"))
            .unwrap();

        let graph = f.engine.table_graph(a, 1, TraversalDirection::Down).unwrap();
        assert_eq!(graph.edges()[0].relation_type, "ETL");
    }

    #[test]
    fn test_column_graph_with_contains() {
        let f = fixture();
        let orders = f.table("orders");
        let summary = f.table("order_summary");
        let report = f.table("report");
        let e1 = f.link(&[orders], summary);
        let e2 = f.link(&[summary], report);

        let amount = f.metadata.add_column(orders, "amount", "NUMBER", None).unwrap();
        let total = f.metadata.add_column(summary, "total", "NUMBER", None).unwrap();
        let shown = f.metadata.add_column(report, "shown", "NUMBER", None).unwrap();
        let c1 = f
            .repo
            .create_column_edge(NewColumnLineage::new(e1, amount.id, total.id))
            .unwrap();
        let c2 = f
            .repo
            .create_column_edge(NewColumnLineage::new(e2, total.id, shown.id))
            .unwrap();

        let graph = f
            .engine
            .column_graph(total.id, 1, TraversalDirection::Both)
            .unwrap();
        assert_eq!(
            graph.column_ids(),
            BTreeSet::from([amount.id, total.id, shown.id])
        );
        assert_eq!(graph.table_ids(), BTreeSet::from([orders, summary, report]));
        assert_eq!(
            graph.links(EdgeKind::ColumnLineage),
            BTreeSet::from([
                (amount.id, total.id, Some(c1.id)),
                (total.id, shown.id, Some(c2.id))
            ])
        );
        assert_eq!(
            graph.links(EdgeKind::Contains),
            BTreeSet::from([
                (orders, amount.id, None),
                (summary, total.id, None),
                (report, shown.id, None)
            ])
        );

        let names: BTreeSet<String> = graph
            .nodes()
            .iter()
            .filter(|n| n.node.kind == crate::graph::NodeKind::Column)
            .map(|n| n.name.clone())
            .collect();
        assert!(names.contains("order_summary.total"));

        let up_only = f
            .engine
            .column_graph(total.id, 3, TraversalDirection::Up)
            .unwrap();
        assert_eq!(up_only.column_ids(), BTreeSet::from([amount.id, total.id]));
    }

    #[test]
    fn test_column_graph_reaches_through_shorter_route() {
        // x -> y -> z, x -> z, z -> q: q is two hops from x only via the direct x -> z link
        let f = fixture();
        let s = f.table("s");
        let m = f.table("m");
        let t = f.table("t");
        let u = f.table("u");
        let sm = f.link(&[s], m);
        let mt = f.link(&[m], t);
        let st = f.link(&[s], t);
        let tu = f.link(&[t], u);
        let x = f.metadata.add_column(s, "x", "INT", None).unwrap();
        let y = f.metadata.add_column(m, "y", "INT", None).unwrap();
        let z = f.metadata.add_column(t, "z", "INT", None).unwrap();
        let q = f.metadata.add_column(u, "q", "INT", None).unwrap();
        f.repo.create_column_edge(NewColumnLineage::new(sm, x.id, y.id)).unwrap();
        f.repo.create_column_edge(NewColumnLineage::new(mt, y.id, z.id)).unwrap();
        f.repo.create_column_edge(NewColumnLineage::new(st, x.id, z.id)).unwrap();
        f.repo.create_column_edge(NewColumnLineage::new(tu, z.id, q.id)).unwrap();

        let graph = f.engine.column_graph(x.id, 2, TraversalDirection::Down).unwrap();
        assert_eq!(graph.column_ids(), BTreeSet::from([x.id, y.id, z.id, q.id]));
        assert_eq!(graph.links(EdgeKind::ColumnLineage).len(), 4);
    }

    #[test]
    fn test_layers() {
        let f = fixture();
        let a = f.table("a");
        let b = f.table("b");
        let c = f.table("c");
        let d = f.table("d");
        let ab = f.link(&[a], c);
        f.link(&[b], c);
        let cd = f
            .repo
            .create_table_edge(
                NewTableLineage::new(vec![c], d)
                    .with_relation_type("ETL")
                    .with_description("nightly"),
            )
            .unwrap()
            .id;

        let up = f.engine.layers(d, 5, LayerDirection::Upstream).unwrap();
        let summary: Vec<(TableId, usize)> = up.iter().map(|e| (e.table_id, e.layer)).collect();
        assert_eq!(summary, vec![(c, 1), (a, 2), (b, 2)]);
        assert_eq!(up[0].edge_id, cd);
        assert_eq!(up[0].relation_type, "ETL");
        assert_eq!(up[0].relation_description.as_deref(), Some("nightly"));
        assert_eq!(up[1].edge_id, ab);

        let down = f.engine.layers(a, 1, LayerDirection::Downstream).unwrap();
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].table_id, c);
    }

    #[test]
    fn test_edges_touching() {
        let f = fixture();
        let a = f.table("a");
        let b = f.table("b");
        let c = f.table("c");
        let ab = f.link(&[a], b);
        let bc = f.link(&[b], c);

        let touching = f.engine.edges_touching(b).unwrap();
        assert_eq!(
            touching.as_source.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![bc]
        );
        assert_eq!(
            touching.as_target.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![ab]
        );
    }
}
