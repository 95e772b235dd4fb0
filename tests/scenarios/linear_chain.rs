//! Test: Linear chain - nodes run one after another

use crate::helpers::*;
use agentflow::llm::EchoLlmProvider;
use serde_json::json;

/// input -> process with "hello" produces two results and B's output
#[tokio::test]
async fn test_input_process_chain() {
    let yaml = r#"
name: "Hello chain"
settings:
  simulated_delay_ms: 0
nodes:
  - id: A
    type: input
    description: user request
  - id: B
    type: process
    description: summarizer
edges:
  - id: e1
    source: A
    target: B
"#;

    let result = run_config(&config(yaml), json!("hello"), EchoLlmProvider).await;

    assert_pipeline_completed(&result);
    let record = result.record();
    assert_eq!(record.node_results.len(), 2);

    let a_output = &record.node_result("A").unwrap().output;
    assert!(a_output["value"].as_str().unwrap().contains("hello"));

    // B receives A's output under A's id, plus the original input
    let b = record.node_result("B").unwrap();
    assert_eq!(b.input["A"], a_output["value"]);
    assert_eq!(b.input["_input"], json!("hello"));
    assert_eq!(result.final_output(), Some(&b.output));
}

/// Three nodes complete in chain order
#[tokio::test]
async fn test_completion_order_follows_chain() {
    let yaml = r#"
name: "Three step chain"
settings:
  simulated_delay_ms: 5
nodes:
  - { id: A, type: input }
  - { id: B, type: transform }
  - { id: C, type: output }
edges:
  - { id: e1, source: A, target: B }
  - { id: e2, source: B, target: C }
"#;

    let result = run_config(&config(yaml), json!("x"), EchoLlmProvider).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.completion_order(), vec!["A", "B", "C"]);
    assert_eq!(
        result.event_kinds(),
        vec![
            "start",
            "node-start",
            "node-complete",
            "node-start",
            "node-complete",
            "node-start",
            "node-complete",
            "complete",
        ]
    );
    for node in ["A", "B", "C"] {
        assert_node_succeeded(&result, node);
    }
}

/// A single node pipeline returns that node's output
#[tokio::test]
async fn test_single_node_pipeline() {
    let yaml = r#"
name: "Solo"
settings:
  simulated_delay_ms: 0
nodes:
  - id: only
    type: output
    name: Only node
"#;

    let result = run_config(&config(yaml), json!("done"), EchoLlmProvider).await;

    assert_pipeline_completed(&result);
    assert_eq!(
        result.final_output(),
        Some(&json!({"value": "Final output (Only node): done"}))
    );
}
