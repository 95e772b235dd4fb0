//! Test: Persistence - records are retrievable after a run

use agentflow::core::config::PipelineConfig;
use agentflow::core::ExecutionStatus;
use agentflow::execution::{ExecutionEngine, NodeExecutorRegistry};
use agentflow::llm::EchoLlmProvider;
use agentflow::persistence::{ExecutionRecordStore, InMemoryRecordStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const PIPELINE: &str = r#"
name: "Stored"
id: stored
nodes:
  - { id: A, type: input }
  - { id: B, type: output }
edges:
  - { id: e1, source: A, target: B }
"#;

fn engine(store: Arc<dyn ExecutionRecordStore>) -> ExecutionEngine {
    let config = PipelineConfig::from_yaml(PIPELINE).unwrap();
    let registry = NodeExecutorRegistry::with_defaults(
        Duration::ZERO,
        Arc::new(config.template_store()),
        Arc::new(EchoLlmProvider),
    );
    ExecutionEngine::new(registry, store)
}

async fn check_store(store: Arc<dyn ExecutionRecordStore>) {
    let pipeline = PipelineConfig::from_yaml(PIPELINE).unwrap().to_pipeline();
    let engine = engine(store.clone());

    let first = engine.execute(&pipeline, json!("one")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = engine.execute(&pipeline, json!("two")).await.unwrap();

    // Fetching by job id returns exactly what the run reported
    let fetched = store.find_by_id(first.execution_id).await.unwrap().unwrap();
    assert_eq!(fetched, first.record);
    assert_eq!(fetched.status, ExecutionStatus::Completed);
    assert_eq!(fetched.node_results.len(), 2);
    assert_eq!(fetched.input, json!("one"));

    let by_pipeline = store.find_by_pipeline_id("stored").await.unwrap();
    let ids: Vec<_> = by_pipeline.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![second.execution_id, first.execution_id]);
    assert!(store.find_by_pipeline_id("other").await.unwrap().is_empty());

    assert!(store.delete(first.execution_id).await.unwrap());
    assert!(!store.delete(first.execution_id).await.unwrap());
    assert_eq!(store.find_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_in_memory_store_round_trip() {
    check_store(Arc::new(InMemoryRecordStore::new())).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_store_round_trip() {
    let store = agentflow::persistence::SqliteRecordStore::new(":memory:")
        .await
        .unwrap();
    check_store(Arc::new(store)).await;
}
