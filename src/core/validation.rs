//! Pipeline validation: edge integrity and cycle detection
//!
//! Both checks are pure and run before any execution record is created.
//! They are also exposed on their own through [`validate`].

use crate::core::PipelineDefinition;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Reasons a pipeline definition is rejected
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid edge '{edge_id}': node '{node_id}' does not exist")]
    InvalidEdge { edge_id: String, node_id: String },

    #[error("Cycle detected in pipeline graph involving node '{node_id}'")]
    CycleDetected { node_id: String },

    #[error("Duplicate node ID: {node_id}")]
    DuplicateNode { node_id: String },
}

/// Result of the standalone validation API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub message: String,
}

impl ValidationResult {
    fn valid() -> Self {
        Self {
            is_valid: true,
            message: "Pipeline is valid".to_string(),
        }
    }

    fn invalid(error: &ValidationError) -> Self {
        Self {
            is_valid: false,
            message: error.to_string(),
        }
    }
}

/// Validate a pipeline, reporting the outcome instead of failing
pub fn validate(pipeline: &PipelineDefinition) -> ValidationResult {
    match check(pipeline) {
        Ok(()) => ValidationResult::valid(),
        Err(e) => ValidationResult::invalid(&e),
    }
}

/// Run every check, stopping at the first failure
pub fn check(pipeline: &PipelineDefinition) -> Result<(), ValidationError> {
    check_unique_ids(pipeline)?;
    check_edges(pipeline)?;
    check_cycles(pipeline)
}

fn check_unique_ids(pipeline: &PipelineDefinition) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for node in &pipeline.nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateNode {
                node_id: node.id.clone(),
            });
        }
    }
    Ok(())
}

/// Every edge must point at known nodes on both ends
pub fn check_edges(pipeline: &PipelineDefinition) -> Result<(), ValidationError> {
    let node_ids: HashSet<&str> = pipeline.nodes.iter().map(|n| n.id.as_str()).collect();

    for edge in &pipeline.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !node_ids.contains(endpoint.as_str()) {
                return Err(ValidationError::InvalidEdge {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Depth-first search with a recursion stack
pub fn check_cycles(pipeline: &PipelineDefinition) -> Result<(), ValidationError> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &pipeline.edges {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut recursion_stack: HashSet<&str> = HashSet::new();
    // Explicit stack of (node, index of the next edge to follow)
    let mut stack: Vec<(&str, usize)> = Vec::new();

    for node in &pipeline.nodes {
        if !visited.insert(node.id.as_str()) {
            continue;
        }
        recursion_stack.insert(node.id.as_str());
        stack.push((node.id.as_str(), 0));

        while let Some((node_id, next)) = stack.last_mut() {
            let targets = adjacency.get(*node_id).map(Vec::as_slice).unwrap_or_default();
            let Some(&target) = targets.get(*next) else {
                recursion_stack.remove(*node_id);
                stack.pop();
                continue;
            };
            *next += 1;

            if recursion_stack.contains(target) {
                return Err(ValidationError::CycleDetected {
                    node_id: target.to_string(),
                });
            }
            if visited.insert(target) {
                recursion_stack.insert(target);
                stack.push((target, 0));
            }
        }
    }

    Ok(())
}
