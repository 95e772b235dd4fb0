//! Run-scoped execution graph
//!
//! Built fresh from a [`PipelineDefinition`] for every run and dropped when
//! the run ends. Tracks in-degree, dependencies and outputs per node.

use crate::core::{Node, PipelineDefinition};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Key under which every merged node input carries the run's original input
pub const ORIGINAL_INPUT_KEY: &str = "_input";

/// Per-node scheduling state
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub node: Node,

    /// Number of incoming edges not yet satisfied
    pub in_degree: usize,

    /// Source IDs of incoming edges
    pub dependencies: HashSet<String>,

    pub executed: bool,

    pub output: Option<Value>,
}

/// Execution graph for a single run
#[derive(Debug, Clone)]
pub struct ExecutionGraphState {
    nodes: HashMap<String, GraphNode>,

    /// Node IDs in definition order
    order: Vec<String>,

    /// source -> targets, one entry per edge
    dependents: HashMap<String, Vec<String>>,
}

/// Build the execution graph: in-degree and dependency set per node.
///
/// Assumes the pipeline already passed validation; edges naming unknown
/// nodes are ignored.
pub fn build_graph(pipeline: &PipelineDefinition) -> ExecutionGraphState {
    let mut nodes: HashMap<String, GraphNode> = pipeline
        .nodes
        .iter()
        .map(|node| {
            (
                node.id.clone(),
                GraphNode {
                    node: node.clone(),
                    in_degree: 0,
                    dependencies: HashSet::new(),
                    executed: false,
                    output: None,
                },
            )
        })
        .collect();

    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();

    for edge in &pipeline.edges {
        if !nodes.contains_key(&edge.source) {
            continue;
        }
        if let Some(target) = nodes.get_mut(&edge.target) {
            target.in_degree += 1;
            target.dependencies.insert(edge.source.clone());
            dependents
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
        }
    }

    ExecutionGraphState {
        nodes,
        order: pipeline.nodes.iter().map(|n| n.id.clone()).collect(),
        dependents,
    }
}

impl ExecutionGraphState {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Unexecuted nodes with in-degree 0, in definition order
    pub fn frontier(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| {
                self.nodes
                    .get(*id)
                    .is_some_and(|n| !n.executed && n.in_degree == 0)
            })
            .cloned()
            .collect()
    }

    /// Check if every node has executed
    pub fn all_executed(&self) -> bool {
        self.nodes.values().all(|n| n.executed)
    }

    /// Nodes that have not executed yet, in definition order
    pub fn remaining(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.nodes.get(*id).is_some_and(|n| !n.executed))
            .cloned()
            .collect()
    }

    /// Record a node's output and release its dependents.
    ///
    /// Returns false if the node is unknown or already executed.
    pub fn mark_executed(&mut self, node_id: &str, output: Value) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) if !node.executed => {
                node.executed = true;
                node.output = Some(output);
            }
            _ => return false,
        }

        if let Some(targets) = self.dependents.get(node_id) {
            for target in targets {
                if let Some(dependent) = self.nodes.get_mut(target) {
                    dependent.in_degree = dependent.in_degree.saturating_sub(1);
                }
            }
        }

        true
    }

    /// Build the argument for a node.
    ///
    /// Nodes without dependencies get the raw input. Otherwise each
    /// dependency's output goes under the dependency's ID (its `value` field
    /// when present) and the original input under [`ORIGINAL_INPUT_KEY`].
    pub fn build_input(&self, node_id: &str, original_input: &Value) -> Value {
        let Some(node) = self.nodes.get(node_id) else {
            return original_input.clone();
        };

        if node.dependencies.is_empty() {
            return original_input.clone();
        }

        let mut dependencies: Vec<&String> = node.dependencies.iter().collect();
        dependencies.sort();

        let mut merged = Map::new();
        for dep in dependencies {
            let output = self
                .nodes
                .get(dep)
                .and_then(|n| n.output.as_ref())
                .map(unwrap_value)
                .unwrap_or(Value::Null);
            merged.insert(dep.clone(), output);
        }
        merged.insert(ORIGINAL_INPUT_KEY.to_string(), original_input.clone());

        Value::Object(merged)
    }

    /// Output of an executed node
    pub fn output(&self, node_id: &str) -> Option<&Value> {
        self.nodes.get(node_id).and_then(|n| n.output.as_ref())
    }
}

/// Use the `value` field of an object output if it has one
pub fn unwrap_value(output: &Value) -> Value {
    match output {
        Value::Object(map) => map.get("value").cloned().unwrap_or_else(|| output.clone()),
        other => other.clone(),
    }
}
