//! Test: Failure handling - the first node error aborts the run

use crate::helpers::*;
use agentflow::core::NodeStatus;
use agentflow::execution::EngineError;
use agentflow::llm::LlmError;
use serde_json::json;

const CHAIN: &str = r#"
name: "Prompt chain"
settings:
  simulated_delay_ms: 0
templates:
  - id: summarize
    content: "Summarize: {{ input }}"
nodes:
  - { id: start, type: input }
  - id: ask
    type: prompt
    config:
      templateId: summarize
  - { id: finish, type: output }
edges:
  - { id: e1, source: start, target: ask }
  - { id: e2, source: ask, target: finish }
"#;

/// An LLM failure fails the node, the record and the run
#[tokio::test]
async fn test_llm_failure_aborts_run() {
    let llm = MockLlm::with_results(vec![Err(LlmError::Api("rate limited".to_string()))]);

    let result = run_config(&config(CHAIN), json!("text"), llm).await;

    assert_pipeline_failed(&result);
    assert!(matches!(
        result.error(),
        Some(EngineError::NodeFailed { node_id, .. }) if node_id == "ask"
    ));

    let record = result.record();
    assert!(record.error.as_deref().unwrap().contains("rate limited"));
    assert_eq!(record.node_results.len(), 2);
    let failed = record.node_result("ask").unwrap();
    assert_eq!(failed.status, NodeStatus::Failed);
    assert!(failed.metadata.error.is_some());

    // Nothing downstream of the failure runs
    assert!(record.node_result("finish").is_none());
    assert!(!result.has_event("node-start", "finish"));
    assert!(result.has_event("node-error", "ask"));
}

/// A missing template variable is a node failure, not a crash
#[tokio::test]
async fn test_missing_variable_fails_node() {
    let yaml = r#"
name: "Missing variable"
templates:
  - id: greet
    content: "Hello {{ name }}"
nodes:
  - id: greet
    type: prompt
    config:
      templateId: greet
      inputMapping:
        name: user.name
"#;

    let result = run_config(&config(yaml), json!({"user": {}}), MockLlm::new(vec![])).await;

    assert_pipeline_failed(&result);
    let message = result.record().error.clone().unwrap();
    assert!(message.contains("Missing variables: name"), "{}", message);
}

/// A failing node in a wide wave stops the run before the next wave
#[tokio::test]
async fn test_failure_in_wave_stops_next_wave() {
    let yaml = r#"
name: "Wide wave"
settings:
  simulated_delay_ms: 20
templates:
  - id: t
    content: "{{ input }}"
nodes:
  - { id: slow, type: process }
  - id: broken
    type: prompt
    config:
      templateId: missing-template
  - { id: after, type: output }
edges:
  - { id: e1, source: slow, target: after }
  - { id: e2, source: broken, target: after }
"#;

    let result = run_config(&config(yaml), json!("x"), MockLlm::new(vec![])).await;

    assert_pipeline_failed(&result);
    assert!(result
        .record()
        .error
        .as_deref()
        .unwrap()
        .contains("Template not found: missing-template"));
    assert!(!result.has_event("node-start", "after"));
}

/// Unknown node types abort the run before the node starts
#[tokio::test]
async fn test_unknown_node_type() {
    let yaml = r#"
name: "Unknown"
nodes:
  - { id: weird, type: teleport }
"#;

    let result = run_config(&config(yaml), json!("x"), MockLlm::new(vec![])).await;

    assert_pipeline_failed(&result);
    assert!(matches!(result.error(), Some(EngineError::ExecutorNotFound(_))));
    assert!(!result.has_event("node-start", "weird"));
}

/// Siblings that settled before the failure still land in the record
#[tokio::test]
async fn test_failure_keeps_completed_siblings_in_record() {
    let yaml = r#"
name: "Failing fan-out"
settings:
  simulated_delay_ms: 0
templates:
  - id: summarize
    content: "Summarize: {{ input }}"
nodes:
  - { id: start, type: input }
  - id: ask
    type: prompt
    config:
      templateId: summarize
  - { id: side, type: process }
edges:
  - { id: e1, source: start, target: ask }
  - { id: e2, source: start, target: side }
"#;
    let llm = MockLlm::with_results(vec![Err(LlmError::Api("down".to_string()))]);

    let result = run_config(&config(yaml), json!("text"), llm).await;

    assert_pipeline_failed(&result);
    let record = result.record();
    assert_eq!(record.node_result("ask").unwrap().status, NodeStatus::Failed);
    for node_id in result.completion_order() {
        let node = record
            .node_result(&node_id)
            .unwrap_or_else(|| panic!("{} completed but was not recorded", node_id));
        assert_eq!(node.status, NodeStatus::Success);
    }
    for event in &result.events {
        if event.kind() == "node-error" {
            let node_id = event.node_id().unwrap();
            assert_eq!(record.node_result(node_id).unwrap().status, NodeStatus::Failed);
        }
    }
}
