//! Pipeline domain model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// A pipeline definition: a named DAG of typed nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline identifier
    pub id: String,

    /// Human-readable pipeline name
    pub name: String,

    /// Nodes in definition order
    #[serde(default)]
    pub nodes: Vec<Node>,

    /// Directed edges between nodes
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// A unit of work in a pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Unique node identifier
    pub id: String,

    /// Node type, selects the executor
    #[serde(rename = "type")]
    pub node_type: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Type-specific configuration
    #[serde(default)]
    pub config: Value,
}

/// Kind of an edge. The scheduler treats every kind the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    #[default]
    Default,
    Data,
    Control,
}

/// A directed edge between two nodes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    /// Unique edge identifier
    pub id: String,

    /// Source node ID
    pub source: String,

    /// Target node ID
    pub target: String,

    /// Edge kind (informational)
    #[serde(default)]
    pub kind: EdgeKind,
}

impl Node {
    /// Create a node with an empty config
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            node_type: node_type.into(),
            description: None,
            config: Value::Null,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Name for display, falling back to the ID
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Default,
        }
    }
}

impl PipelineDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add an edge with a generated ID
    pub fn with_edge(mut self, source: &str, target: &str) -> Self {
        let id = format!("e{}-{}-{}", self.edges.len() + 1, source, target);
        self.edges.push(Edge::new(id, source, target));
        self
    }

    /// Get a node by ID
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges leaving a node, in definition order
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Nodes with no outgoing edges, in definition order
    pub fn sink_nodes(&self) -> Vec<&Node> {
        let sources: HashSet<&str> = self.edges.iter().map(|e| e.source.as_str()).collect();
        self.nodes
            .iter()
            .filter(|n| !sources.contains(n.id.as_str()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
