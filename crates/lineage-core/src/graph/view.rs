//! Graph presentation: the serializable node/edge shape handed to callers.

use serde::{Deserialize, Serialize};

use super::{EdgeKind, GraphEdge, GraphNode, LineageGraph, NodeKind, NodeRef};
use crate::model::DataSourceType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewNode {
    /// `table:<id>` or `column:<id>`
    pub id: String,
    pub entity_id: i64,
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_type: Option<DataSourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: String,
    pub relation_type: String,
}

/// Renderable lineage graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
    #[serde(default)]
    pub skipped_references: usize,
}

pub fn node_id(node: NodeRef) -> String {
    format!("{}:{}", node.kind.as_str(), node.id)
}

/// Stable edge id: `table_lineage:<edge>:<src>:<tgt>`, `column_lineage:<edge>`
/// or `contains:<table>:<column>`.
pub fn edge_id(edge: &GraphEdge) -> String {
    match edge.kind {
        EdgeKind::TableLineage => format!(
            "table_lineage:{}:{}:{}",
            edge.lineage_id.unwrap_or_default(),
            edge.source.id,
            edge.target.id
        ),
        EdgeKind::ColumnLineage => {
            format!("column_lineage:{}", edge.lineage_id.unwrap_or_default())
        }
        EdgeKind::Contains => format!("contains:{}:{}", edge.source.id, edge.target.id),
    }
}

fn view_node(node: &GraphNode) -> ViewNode {
    ViewNode {
        id: node_id(node.node),
        entity_id: node.node.id,
        name: node.name.clone(),
        kind: node.node.kind.as_str().to_string(),
        data_source_name: node.data_source_name.clone(),
        data_source_type: node.data_source_type,
        table_id: node.table_id,
        data_type: node.data_type.clone(),
    }
}

fn view_edge(edge: &GraphEdge) -> ViewEdge {
    ViewEdge {
        id: edge_id(edge),
        source: node_id(edge.source),
        target: node_id(edge.target),
        kind: edge.kind.as_str().to_string(),
        relation_type: edge.relation_type.clone(),
    }
}

impl From<&LineageGraph> for GraphView {
    fn from(graph: &LineageGraph) -> Self {
        let mut nodes: Vec<&GraphNode> = graph.nodes().iter().collect();
        nodes.sort_by_key(|n| n.node);
        let mut edges: Vec<&GraphEdge> = graph.edges().iter().collect();
        edges.sort_by_key(|e| e.key());

        Self {
            nodes: nodes.into_iter().map(view_node).collect(),
            edges: edges.into_iter().map(view_edge).collect(),
            skipped_references: graph.skipped_references,
        }
    }
}

impl From<LineageGraph> for GraphView {
    fn from(graph: LineageGraph) -> Self {
        Self::from(&graph)
    }
}

impl GraphView {
    pub fn node(&self, id: &str) -> Option<&ViewNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &ViewNode> {
        self.nodes.iter().filter(move |n| n.kind == kind.as_str())
    }

    /// Plain-text rendering: one line per node, then one per edge.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Nodes ({}):\n", self.nodes.len()));
        for node in &self.nodes {
            match &node.data_source_name {
                Some(ds) => out.push_str(&format!("  {}  {} [{}]\n", node.id, node.name, ds)),
                None => out.push_str(&format!("  {}  {}\n", node.id, node.name)),
            }
        }
        out.push_str(&format!("Edges ({}):\n", self.edges.len()));
        for edge in &self.edges {
            out.push_str(&format!(
                "  {} -> {}  ({}, {})\n",
                edge.source, edge.target, edge.kind, edge.relation_type
            ));
        }
        if self.skipped_references > 0 {
            out.push_str(&format!(
                "Skipped references: {}\n",
                self.skipped_references
            ));
        }
        out
    }
}
