//! Dry-run preview: walk a single chain through the pipeline
//!
//! Starts at the first node and follows the first outgoing edge of each
//! node. Nothing is persisted and no events are emitted.

use crate::{
    core::{unwrap_value, validation, NodeStatus, PipelineDefinition, ORIGINAL_INPUT_KEY},
    execution::{
        engine::EngineError,
        executor::NodeContext,
        registry::NodeExecutorRegistry,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

/// One node visited by the preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStep {
    pub node_id: String,
    pub status: NodeStatus,
    pub output: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    /// Output of the last node that succeeded
    pub output: Value,
    pub execution_path: Vec<PathStep>,
    /// Set when a node on the path failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PreviewResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Run the first-edge chain of a pipeline.
///
/// Invalid or empty pipelines are rejected up front; a node failure ends
/// the walk with a failed step and the error message.
pub async fn preview(
    pipeline: &PipelineDefinition,
    registry: &NodeExecutorRegistry,
    input: Value,
) -> Result<PreviewResult, EngineError> {
    validation::check(pipeline)?;

    let Some(first) = pipeline.nodes.first() else {
        return Err(EngineError::EmptyPipeline);
    };

    let ctx = NodeContext {
        execution_id: Uuid::new_v4(),
        pipeline_id: pipeline.id.clone(),
        original_input: input.clone(),
    };

    let mut result = PreviewResult {
        output: Value::Null,
        execution_path: Vec::new(),
        error: None,
    };
    let mut visited = HashSet::new();
    let mut current = Some(first);
    let mut previous: Option<(String, Value)> = None;

    while let Some(node) = current {
        if !visited.insert(node.id.clone()) {
            break;
        }

        let node_input = match &previous {
            None => input.clone(),
            Some((prev_id, prev_output)) => json!({
                prev_id.as_str(): unwrap_value(prev_output),
                ORIGINAL_INPUT_KEY: input,
            }),
        };

        debug!("Previewing node {}", node.id);
        let outcome = match registry.resolve(node) {
            Ok(executor) => executor
                .execute(node, &node_input, &ctx)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(out) => {
                result.execution_path.push(PathStep {
                    node_id: node.id.clone(),
                    status: NodeStatus::Success,
                    output: out.output.clone(),
                    timestamp: Utc::now(),
                });
                result.output = out.output.clone();
                previous = Some((node.id.clone(), out.output));
            }
            Err(message) => {
                warn!("Preview stopped at node {}: {}", node.id, message);
                result.execution_path.push(PathStep {
                    node_id: node.id.clone(),
                    status: NodeStatus::Failed,
                    output: Value::Null,
                    timestamp: Utc::now(),
                });
                result.error = Some(message);
                break;
            }
        }

        current = pipeline
            .outgoing_edges(&node.id)
            .next()
            .and_then(|edge| pipeline.node(&edge.target));
    }

    Ok(result)
}
