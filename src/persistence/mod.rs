//! Persistence layer for execution records

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRecordStore;

pub use crate::core::{ExecutionStatus, NodeStatus};
use crate::core::{InvalidTransition, Node, PipelineDefinition};
use crate::llm::TokenUsage;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Durable record of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// Job ID
    pub id: Uuid,

    pub pipeline_id: String,

    pub pipeline_name: String,

    /// The run's top-level input
    pub input: Value,

    pub status: ExecutionStatus,

    pub start_time: DateTime<Utc>,

    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub error: Option<String>,

    /// Per-node results in completion order (append-only)
    #[serde(default)]
    pub node_results: Vec<NodeExecutionResult>,

    #[serde(default)]
    pub final_output: Option<Value>,
}

/// Result of a single node within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecutionResult {
    pub node_id: String,
    pub node_name: String,
    pub node_type: String,
    pub input: Value,
    pub output: Value,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: NodeStatus,
    #[serde(default)]
    pub metadata: NodeMetadata,
}

/// Timing and usage details attached to a node result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Error message for failed nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionRecord {
    /// Start a new record in `running` state
    pub fn new(pipeline: &PipelineDefinition, input: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline_id: pipeline.id.clone(),
            pipeline_name: pipeline.name.clone(),
            input,
            status: ExecutionStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            error: None,
            node_results: Vec::new(),
            final_output: None,
        }
    }

    /// Append a node result; only allowed while running
    pub fn append_result(&mut self, result: NodeExecutionResult) -> Result<(), InvalidTransition> {
        if self.status.is_terminal() {
            return Err(InvalidTransition {
                from: self.status,
                to: self.status,
            });
        }
        self.node_results.push(result);
        Ok(())
    }

    /// Mark as completed with the run's final output
    pub fn complete(&mut self, final_output: Value) -> Result<(), InvalidTransition> {
        self.status = self.status.transition(ExecutionStatus::Completed)?;
        self.end_time = Some(Utc::now());
        self.final_output = Some(final_output);
        Ok(())
    }

    /// Mark as failed with the captured error
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        self.status = self.status.transition(ExecutionStatus::Failed)?;
        self.end_time = Some(Utc::now());
        self.error = Some(error.into());
        Ok(())
    }

    /// Result for a node, if it has one
    pub fn node_result(&self, node_id: &str) -> Option<&NodeExecutionResult> {
        self.node_results.iter().find(|r| r.node_id == node_id)
    }
}

impl NodeExecutionResult {
    /// Build a result for a node, filling name and type from the node
    pub fn for_node(
        node: &Node,
        input: Value,
        output: Value,
        status: NodeStatus,
        start_time: DateTime<Utc>,
        metadata: NodeMetadata,
    ) -> Self {
        Self {
            node_id: node.id.clone(),
            node_name: node.display_name().to_string(),
            node_type: node.node_type.clone(),
            input,
            output,
            start_time,
            end_time: Utc::now(),
            status,
            metadata,
        }
    }
}

/// Key-addressed repository of execution records
#[async_trait::async_trait]
pub trait ExecutionRecordStore: Send + Sync {
    /// Insert or replace a record
    async fn save(&self, record: &ExecutionRecord) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ExecutionRecord>>;

    /// Records for a pipeline, newest first
    async fn find_by_pipeline_id(&self, pipeline_id: &str) -> Result<Vec<ExecutionRecord>>;

    /// All records, newest first
    async fn find_all(&self) -> Result<Vec<ExecutionRecord>>;

    /// Delete a record; returns whether it existed
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// In-memory store (for testing or ephemeral use)
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<Uuid, ExecutionRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut records: Vec<ExecutionRecord>) -> Vec<ExecutionRecord> {
    records.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    records
}

#[async_trait::async_trait]
impl ExecutionRecordStore for InMemoryRecordStore {
    async fn save(&self, record: &ExecutionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ExecutionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&id).cloned())
    }

    async fn find_by_pipeline_id(&self, pipeline_id: &str) -> Result<Vec<ExecutionRecord>> {
        let records = self.records.read().await;
        Ok(newest_first(
            records
                .values()
                .filter(|r| r.pipeline_id == pipeline_id)
                .cloned()
                .collect(),
        ))
    }

    async fn find_all(&self) -> Result<Vec<ExecutionRecord>> {
        let records = self.records.read().await;
        Ok(newest_first(records.values().cloned().collect()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(&id).is_some())
    }
}
