//! Node executors - strategies that run individual nodes

use crate::{
    core::{Node, ORIGINAL_INPUT_KEY},
    llm::LlmError,
    persistence::NodeMetadata,
    template::TemplateError,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Node types without a real backend, run by [`SimulatedExecutor`]
pub const SIMULATED_NODE_TYPES: &[&str] = &["input", "process", "transform", "output"];

/// Errors raised while running a single node
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NodeError {
    #[error("Missing variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Invalid node config: {0}")]
    InvalidConfig(String),

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Executor panicked: {0}")]
    Panicked(String),
}

impl From<TemplateError> for NodeError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::NotFound(id) => NodeError::TemplateNotFound(id),
            TemplateError::MissingVariables(vars) => NodeError::MissingVariables(vars),
        }
    }
}

/// Run-level information handed to every executor
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub execution_id: Uuid,
    pub pipeline_id: String,
    /// The run's top-level input
    pub original_input: Value,
}

/// What an executor produced for a node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    pub output: Value,
    pub metadata: NodeMetadata,
}

impl NodeOutput {
    pub fn new(output: Value) -> Self {
        Self {
            output,
            metadata: NodeMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A strategy capable of running one or more node types
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Check if this executor handles the node
    fn can_execute(&self, node: &Node) -> bool;

    /// Run the node against its merged input
    async fn execute(
        &self,
        node: &Node,
        input: &Value,
        ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError>;
}

/// Plain text view of a node input
pub fn input_text(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Text of a node input; merged inputs show their dependency outputs
fn describe_input(input: &Value) -> String {
    match input {
        Value::Object(map) if map.contains_key(ORIGINAL_INPUT_KEY) => map
            .iter()
            .filter(|(key, _)| key.as_str() != ORIGINAL_INPUT_KEY)
            .map(|(_, value)| input_text(value))
            .collect::<Vec<_>>()
            .join("; "),
        other => input_text(other),
    }
}

/// Stand-in executor for node types without a real backend.
///
/// Waits for a fixed delay, then returns `{"value": ...}` with a string
/// built from the node's description and its input.
#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    node_type: String,
    delay: Duration,
}

impl SimulatedExecutor {
    pub fn new(node_type: impl Into<String>, delay: Duration) -> Self {
        Self {
            node_type: node_type.into(),
            delay,
        }
    }

    fn render(&self, node: &Node, input: &Value) -> String {
        let label = node
            .description
            .as_deref()
            .unwrap_or_else(|| node.display_name());
        let text = describe_input(input);

        match self.node_type.as_str() {
            "input" => format!("Received input ({}): {}", label, text),
            "process" => format!("Processed by {}: {}", label, text),
            "transform" => format!("Transformed by {}: {}", label, text),
            "output" => format!("Final output ({}): {}", label, text),
            other => format!("Executed {} node {}: {}", other, label, text),
        }
    }
}

#[async_trait]
impl NodeExecutor for SimulatedExecutor {
    fn name(&self) -> &str {
        &self.node_type
    }

    fn can_execute(&self, node: &Node) -> bool {
        node.node_type == self.node_type
    }

    async fn execute(
        &self,
        node: &Node,
        input: &Value,
        _ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        debug!("Simulating {} node {}", self.node_type, node.id);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        Ok(NodeOutput::new(json!({ "value": self.render(node, input) })))
    }
}
