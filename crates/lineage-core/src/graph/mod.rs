//! Lineage Graph
//!
//! Query-time graph assembled by the [`LineageEngine`]: nodes are tables or
//! columns, edges are table lineage links, column lineage links, and
//! `contains` links from a table to one of its columns. Nodes are
//! de-duplicated by `(kind, id)`; edges by `(kind, source, target, lineage id)`.

pub mod direction;
pub mod index;
pub mod traversal;
pub mod view;

pub use direction::{LayerDirection, TraversalDirection};
pub use index::{AdjacencyIndex, Neighbor};
pub use traversal::{LayerEntry, LineageEngine};
pub use view::{GraphView, ViewEdge, ViewNode};

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::model::{Column, DataSourceType, Table};

/// Relation type carried by column lineage graph edges
pub const COLUMN_RELATION_TYPE: &str = "direct";

/// Relation type carried by `contains` graph edges
pub const CONTAINS_RELATION_TYPE: &str = "contains";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Table,
    Column,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Table => "table",
            NodeKind::Column => "column",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    TableLineage,
    ColumnLineage,
    Contains,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::TableLineage => "table_lineage",
            EdgeKind::ColumnLineage => "column_lineage",
            EdgeKind::Contains => "contains",
        }
    }
}

/// Identity of a graph node. Table and column ids share one integer space,
/// so the kind is part of the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    pub kind: NodeKind,
    pub id: i64,
}

impl NodeRef {
    pub fn table(id: i64) -> Self {
        Self {
            kind: NodeKind::Table,
            id,
        }
    }

    pub fn column(id: i64) -> Self {
        Self {
            kind: NodeKind::Column,
            id,
        }
    }
}

/// A node with its display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub node: NodeRef,
    pub name: String,
    pub data_source_name: Option<String>,
    pub data_source_type: Option<DataSourceType>,
    /// Owning table of a column node
    pub table_id: Option<i64>,
    /// Declared type of a column node
    pub data_type: Option<String>,
}

impl GraphNode {
    pub fn from_table(table: &Table) -> Self {
        Self {
            node: NodeRef::table(table.id),
            name: table.name.clone(),
            data_source_name: table.data_source_name.clone(),
            data_source_type: table.data_source_type,
            table_id: None,
            data_type: None,
        }
    }

    /// Column nodes are named `table.column`
    pub fn from_column(column: &Column, table: &Table) -> Self {
        Self {
            node: NodeRef::column(column.id),
            name: format!("{}.{}", table.name, column.name),
            data_source_name: table.data_source_name.clone(),
            data_source_type: table.data_source_type,
            table_id: Some(table.id),
            data_type: Some(column.data_type.clone()),
        }
    }
}

/// A directed link between two graph nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    pub source: NodeRef,
    pub target: NodeRef,
    /// Lineage record this link was derived from (none for `contains`)
    pub lineage_id: Option<i64>,
    pub relation_type: String,
}

impl GraphEdge {
    /// De-duplication key
    pub fn key(&self) -> (EdgeKind, NodeRef, NodeRef, Option<i64>) {
        (self.kind, self.source, self.target, self.lineage_id)
    }
}

/// Result of one traversal.
#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    nodes: Vec<GraphNode>,
    node_refs: HashSet<NodeRef>,
    edges: Vec<GraphEdge>,
    edge_keys: HashSet<(EdgeKind, NodeRef, NodeRef, Option<i64>)>,
    /// Dangling references skipped while assembling the graph
    pub skipped_references: usize,
}

impl LineageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node unless one with the same identity exists. Returns true if added.
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        if !self.node_refs.insert(node.node) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    /// Add an edge unless an identical one exists. Returns true if added.
    pub fn add_edge(&mut self, edge: GraphEdge) -> bool {
        if !self.edge_keys.insert(edge.key()) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn contains_node(&self, node: NodeRef) -> bool {
        self.node_refs.contains(&node)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Ids of the table nodes
    pub fn table_ids(&self) -> BTreeSet<i64> {
        self.ids_of(NodeKind::Table)
    }

    /// Ids of the column nodes
    pub fn column_ids(&self) -> BTreeSet<i64> {
        self.ids_of(NodeKind::Column)
    }

    fn ids_of(&self, kind: NodeKind) -> BTreeSet<i64> {
        self.node_refs
            .iter()
            .filter(|n| n.kind == kind)
            .map(|n| n.id)
            .collect()
    }

    /// `(source, target, lineage id)` of every edge of one kind
    pub fn links(&self, kind: EdgeKind) -> BTreeSet<(i64, i64, Option<i64>)> {
        self.edges
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| (e.source.id, e.target.id, e.lineage_id))
            .collect()
    }
}
