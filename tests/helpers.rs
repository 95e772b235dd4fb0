//! Test utility functions for agentflow
#![allow(dead_code)]

use agentflow::core::config::PipelineConfig;
use agentflow::core::{ExecutionStatus, NodeStatus};
use agentflow::execution::{
    EngineError, ExecutionEngine, ExecutionEvent, NodeExecutorRegistry, RunOutcome,
};
use agentflow::llm::{Completion, CompletionOptions, LlmError, LlmProvider, TokenUsage};
use agentflow::persistence::{ExecutionRecord, ExecutionRecordStore, InMemoryRecordStore};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock LLM that returns predefined responses and records every prompt
pub struct MockLlm {
    responses: Arc<Vec<Result<String, LlmError>>>,
    index: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
    simulate_delay: Option<Duration>,
}

impl MockLlm {
    pub fn new(responses: Vec<&str>) -> Self {
        Self::with_results(responses.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn with_results(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Arc::new(responses),
            index: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
            simulate_delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.simulate_delay = Some(delay);
        self
    }

    /// Shared handle to the prompts seen so far
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        if let Some(delay) = self.simulate_delay {
            tokio::time::sleep(delay).await;
        }

        self.prompts.lock().unwrap().push(prompt.to_string());
        let idx = self.index.fetch_add(1, Ordering::SeqCst);

        match self.responses.get(idx) {
            Some(Ok(text)) => Ok(Completion::new(text.clone())
                .with_model("mock")
                .with_usage(TokenUsage::new(10, 5))),
            Some(Err(e)) => Err(e.clone()),
            None => Err(LlmError::Internal(format!(
                "MockLlm: No response available for request {}",
                idx + 1
            ))),
        }
    }
}

/// Result of running a pipeline in a test
pub struct PipelineTestResult {
    pub outcome: Result<RunOutcome, EngineError>,
    pub events: Vec<ExecutionEvent>,
    pub records: Vec<ExecutionRecord>,
}

impl PipelineTestResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn final_output(&self) -> Option<&Value> {
        self.outcome.as_ref().ok().map(|run| &run.final_output)
    }

    pub fn error(&self) -> Option<&EngineError> {
        self.outcome.as_ref().err()
    }

    /// The single persisted record of the run
    pub fn record(&self) -> &ExecutionRecord {
        assert_eq!(self.records.len(), 1, "expected exactly one record");
        &self.records[0]
    }

    pub fn event_kinds(&self) -> Vec<&'static str> {
        self.events.iter().map(|e| e.kind()).collect()
    }

    /// Index of the first event of `kind` for `node_id`
    pub fn position(&self, kind: &str, node_id: &str) -> usize {
        self.events
            .iter()
            .position(|e| e.kind() == kind && e.node_id() == Some(node_id))
            .unwrap_or_else(|| panic!("no {} event for {}", kind, node_id))
    }

    pub fn has_event(&self, kind: &str, node_id: &str) -> bool {
        self.events
            .iter()
            .any(|e| e.kind() == kind && e.node_id() == Some(node_id))
    }

    /// Node IDs in the order their `node-complete` events arrived
    pub fn completion_order(&self) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| e.kind() == "node-complete")
            .filter_map(|e| e.node_id().map(str::to_string))
            .collect()
    }
}

/// Run a pipeline file's contents against an input with the given LLM
pub async fn run_config(
    config: &PipelineConfig,
    input: Value,
    llm: impl LlmProvider + 'static,
) -> PipelineTestResult {
    let registry = NodeExecutorRegistry::with_defaults(
        config.settings.simulated_delay(),
        Arc::new(config.template_store()),
        Arc::new(llm),
    );
    run_with_registry(config, input, registry).await
}

/// Run with a custom registry, collecting events and persisted records
pub async fn run_with_registry(
    config: &PipelineConfig,
    input: Value,
    registry: NodeExecutorRegistry,
) -> PipelineTestResult {
    let store = Arc::new(InMemoryRecordStore::new());
    let engine = ExecutionEngine::new(registry, store.clone()).with_settings(&config.settings);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let outcome = engine.execute(&config.to_pipeline(), input).await;
    let records = store.find_all().await.unwrap();
    let events = events.lock().unwrap().clone();

    PipelineTestResult {
        outcome,
        events,
        records,
    }
}

/// Parse YAML, failing the test on error
pub fn config(yaml: &str) -> PipelineConfig {
    PipelineConfig::from_yaml(yaml).unwrap()
}

/// Assert the run completed and the persisted record agrees
pub fn assert_pipeline_completed(result: &PipelineTestResult) {
    assert!(
        result.is_success(),
        "pipeline failed: {:?}",
        result.error().map(|e| e.to_string())
    );
    let record = result.record();
    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.final_output.as_ref(), result.final_output());
    assert!(record.end_time.is_some());
    assert_eq!(result.event_kinds().last(), Some(&"complete"));
}

/// Assert the run failed and the persisted record agrees
pub fn assert_pipeline_failed(result: &PipelineTestResult) {
    assert!(result.error().is_some(), "pipeline unexpectedly succeeded");
    let record = result.record();
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record.error.is_some());
    assert!(record.final_output.is_none());
    assert_eq!(result.event_kinds().last(), Some(&"error"));
}

/// Assert a node has a successful result in the record
pub fn assert_node_succeeded(result: &PipelineTestResult, node_id: &str) {
    let node = result
        .record()
        .node_result(node_id)
        .unwrap_or_else(|| panic!("no result for {}", node_id));
    assert_eq!(node.status, NodeStatus::Success);
}
