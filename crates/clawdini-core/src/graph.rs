//! Graph model — nodes, edges, and the kind discriminator
//!
//! A graph is immutable once submitted for execution; the runner holds a
//! read-only reference. Node configuration stays a raw JSON record here —
//! each executor deserializes its own typed config, so the canvas editor can
//! ship extra fields without breaking submission.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The eleven node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Input,
    Template,
    Agent,
    Merge,
    Judge,
    Switch,
    Extract,
    Invoke,
    Foreach,
    State,
    Output,
}

/// A unit of computation in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub config: Value,
}

/// A directed dependency between two nodes. `source_handle` names the
/// output port on routing nodes (switch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(
        rename = "sourceHandle",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<String>,
}

/// A user-authored DAG of nodes and edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub id: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Edges whose target is `id`.
    pub fn in_edges(&self, id: &str) -> impl Iterator<Item = &Edge> {
        let id = id.to_string();
        self.edges.iter().filter(move |e| e.target == id)
    }

    /// Edges whose source is `id`.
    pub fn out_edges(&self, id: &str) -> impl Iterator<Item = &Edge> {
        let id = id.to_string();
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Display name for a node: its label when set, its id otherwise.
    /// Template scopes resolve upstream references through this.
    pub fn node_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.node(id)
            .and_then(|n| n.label.as_deref())
            .unwrap_or(id)
    }
}
