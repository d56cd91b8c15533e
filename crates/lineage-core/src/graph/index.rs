//! Adjacency Index
//!
//! A directed multigraph over entity ids, built once per traversal from the
//! full edge set. Each petgraph edge carries the id of the lineage record it
//! was flattened from, so a table edge with sources `[X, Y]` and target `Z`
//! becomes the two links `X -> Z` and `Y -> Z`, both weighted with its id.

use std::collections::HashMap;
use std::hash::Hash;

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::model::{ColumnId, ColumnLineageEdge, TableId, TableLineageEdge};

/// One hop out of a node: the neighbor and the lineage record linking them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Neighbor<K> {
    pub id: K,
    pub edge_id: i64,
}

/// Petgraph-backed adjacency over entity ids.
#[derive(Debug, Clone)]
pub struct AdjacencyIndex<K> {
    graph: StableGraph<K, i64, petgraph::Directed>,
    node_index_map: HashMap<K, NodeIndex>,
}

impl<K> Default for AdjacencyIndex<K>
where
    K: Copy + Eq + Hash + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> AdjacencyIndex<K>
where
    K: Copy + Eq + Hash + Ord,
{
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            node_index_map: HashMap::new(),
        }
    }

    fn ensure_node(&mut self, id: K) -> NodeIndex {
        if let Some(&idx) = self.node_index_map.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id);
        self.node_index_map.insert(id, idx);
        idx
    }

    /// Record that `source` feeds `target` through lineage record `edge_id`.
    pub fn add_link(&mut self, source: K, target: K, edge_id: i64) {
        let s = self.ensure_node(source);
        let t = self.ensure_node(target);
        let already = self
            .graph
            .edges_connecting(s, t)
            .any(|e| *e.weight() == edge_id);
        if !already {
            self.graph.add_edge(s, t, edge_id);
        }
    }

    pub fn contains(&self, id: K) -> bool {
        self.node_index_map.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Producers of `id`, sorted by (neighbor, edge id)
    pub fn upstream(&self, id: K) -> Vec<Neighbor<K>> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Consumers of `id`, sorted by (neighbor, edge id)
    pub fn downstream(&self, id: K) -> Vec<Neighbor<K>> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: K, direction: Direction) -> Vec<Neighbor<K>> {
        let Some(&idx) = self.node_index_map.get(&id) else {
            return Vec::new();
        };
        let mut out: Vec<Neighbor<K>> = self
            .graph
            .edges_directed(idx, direction)
            .filter_map(|edge_ref| {
                let other = match direction {
                    Direction::Incoming => edge_ref.source(),
                    Direction::Outgoing => edge_ref.target(),
                };
                let other_id = *self.graph.node_weight(other)?;
                Some(Neighbor {
                    id: other_id,
                    edge_id: *edge_ref.weight(),
                })
            })
            .collect();
        out.sort_by_key(|n| (n.id, n.edge_id));
        out
    }
}

impl AdjacencyIndex<TableId> {
    /// Flatten each table edge into its `source x target` links.
    pub fn from_table_edges<'a>(edges: impl IntoIterator<Item = &'a TableLineageEdge>) -> Self {
        let mut index = Self::new();
        for edge in edges {
            for &source in &edge.source_table_ids {
                index.add_link(source, edge.target_table_id, edge.id);
            }
        }
        index
    }
}

impl AdjacencyIndex<ColumnId> {
    pub fn from_column_edges<'a>(edges: impl IntoIterator<Item = &'a ColumnLineageEdge>) -> Self {
        let mut index = Self::new();
        for edge in edges {
            index.add_link(edge.source_column_id, edge.target_column_id, edge.id);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_RELATION_TYPE;

    fn table_edge(id: i64, sources: Vec<TableId>, target: TableId) -> TableLineageEdge {
        TableLineageEdge {
            id,
            source_table_ids: sources,
            target_table_id: target,
            relation_type: DEFAULT_RELATION_TYPE.to_string(),
            description: None,
            relation_details: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_cross_product_flattening() {
        let edges = vec![table_edge(1, vec![10, 11], 20), table_edge(2, vec![20], 30)];
        let index = AdjacencyIndex::from_table_edges(&edges);

        assert_eq!(index.node_count(), 4);
        assert_eq!(index.link_count(), 3);
        assert_eq!(
            index.upstream(20),
            vec![
                Neighbor { id: 10, edge_id: 1 },
                Neighbor { id: 11, edge_id: 1 }
            ]
        );
        assert_eq!(index.downstream(20), vec![Neighbor { id: 30, edge_id: 2 }]);
        assert!(index.downstream(30).is_empty());
        assert!(index.upstream(99).is_empty());
    }

    #[test]
    fn test_parallel_edges_kept_apart() {
        let edges = vec![table_edge(5, vec![1], 2), table_edge(3, vec![1], 2)];
        let index = AdjacencyIndex::from_table_edges(&edges);
        assert_eq!(
            index.downstream(1),
            vec![Neighbor { id: 2, edge_id: 3 }, Neighbor { id: 2, edge_id: 5 }]
        );
    }

    #[test]
    fn test_duplicate_link_ignored() {
        let mut index = AdjacencyIndex::new();
        index.add_link(1i64, 2, 7);
        index.add_link(1, 2, 7);
        assert_eq!(index.link_count(), 1);
        assert!(index.contains(1));
    }

    #[test]
    fn test_self_loop() {
        let edges = vec![table_edge(1, vec![4], 4)];
        let index = AdjacencyIndex::from_table_edges(&edges);
        assert_eq!(index.upstream(4), vec![Neighbor { id: 4, edge_id: 1 }]);
        assert_eq!(index.downstream(4), vec![Neighbor { id: 4, edge_id: 1 }]);
    }
}
