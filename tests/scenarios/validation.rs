//! Test: Validation - structural errors stop the run before it starts

use crate::helpers::*;
use agentflow::core::ValidationError;
use agentflow::execution::EngineError;
use agentflow::llm::EchoLlmProvider;
use serde_json::json;

/// A cycle is rejected and no record or event is produced
#[tokio::test]
async fn test_cycle_creates_no_record() {
    let yaml = r#"
name: "Loop"
nodes:
  - { id: A, type: process }
  - { id: B, type: process }
  - { id: C, type: process }
edges:
  - { id: e1, source: A, target: B }
  - { id: e2, source: B, target: C }
  - { id: e3, source: C, target: A }
"#;

    let cfg = config(yaml);
    let validation = cfg.validate();
    assert!(!validation.is_valid);
    assert!(validation.message.contains("Cycle detected"), "{}", validation.message);

    let result = run_config(&cfg, json!("x"), EchoLlmProvider).await;

    assert!(matches!(
        result.error(),
        Some(EngineError::Validation(ValidationError::CycleDetected { .. }))
    ));
    assert!(result.records.is_empty());
    assert!(result.events.is_empty());
}

/// An edge naming an unknown node is rejected
#[tokio::test]
async fn test_dangling_edge_creates_no_record() {
    let yaml = r#"
name: "Dangling"
nodes:
  - { id: A, type: input }
edges:
  - { id: e1, source: A, target: ghost }
"#;

    let result = run_config(&config(yaml), json!("x"), EchoLlmProvider).await;

    match result.error() {
        Some(EngineError::Validation(ValidationError::InvalidEdge { edge_id, node_id })) => {
            assert_eq!(edge_id, "e1");
            assert_eq!(node_id, "ghost");
        }
        other => panic!("unexpected outcome: {:?}", other.map(|e| e.to_string())),
    }
    assert!(result.records.is_empty());
}

/// Duplicate node ids are rejected
#[tokio::test]
async fn test_duplicate_node_ids() {
    let yaml = r#"
name: "Twins"
nodes:
  - { id: A, type: input }
  - { id: A, type: output }
"#;

    let validation = config(yaml).validate();
    assert!(!validation.is_valid);

    let result = run_config(&config(yaml), json!("x"), EchoLlmProvider).await;
    assert!(matches!(
        result.error(),
        Some(EngineError::Validation(ValidationError::DuplicateNode { .. }))
    ));
    assert!(result.records.is_empty());
}

/// An empty pipeline produces a failed record with a clear message
#[tokio::test]
async fn test_empty_pipeline_fails_record() {
    let cfg = config("name: \"Nothing\"\n");
    assert!(cfg.validate().is_valid);

    let result = run_config(&cfg, json!("x"), EchoLlmProvider).await;

    assert_pipeline_failed(&result);
    assert!(matches!(result.error(), Some(EngineError::EmptyPipeline)));
    assert_eq!(result.record().error.as_deref(), Some("No nodes to execute"));
    assert_eq!(result.event_kinds(), vec!["start", "error"]);
}

/// Valid pipelines report success through the validation API
#[test]
fn test_valid_pipeline_reports_valid() {
    let yaml = r#"
name: "Fine"
nodes:
  - { id: A, type: input }
  - { id: B, type: output }
edges:
  - { id: e1, source: A, target: B, kind: data }
"#;

    let validation = config(yaml).validate();
    assert!(validation.is_valid, "{}", validation.message);
}
