//! Test: Concurrency - waves run in parallel, optionally bounded

use crate::helpers::*;
use agentflow::core::config::PipelineConfig;
use agentflow::core::Node;
use agentflow::execution::{NodeContext, NodeError, NodeExecutor, NodeExecutorRegistry, NodeOutput};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Executor that records the peak number of overlapping calls
struct GaugeExecutor {
    active: AtomicUsize,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl NodeExecutor for GaugeExecutor {
    fn name(&self) -> &str {
        "gauge"
    }

    fn can_execute(&self, _node: &Node) -> bool {
        true
    }

    async fn execute(
        &self,
        node: &Node,
        _input: &Value,
        _ctx: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(NodeOutput::new(json!({ "value": node.id })))
    }
}

fn wide_pipeline(width: usize, max_concurrency: Option<usize>) -> PipelineConfig {
    let mut yaml = String::from("name: \"Wide\"\nnodes:\n");
    for i in 0..width {
        yaml.push_str(&format!("  - {{ id: n{}, type: work }}\n", i));
    }
    yaml.push_str("  - { id: sink, type: work }\nedges:\n");
    for i in 0..width {
        yaml.push_str(&format!("  - {{ id: e{}, source: n{}, target: sink }}\n", i, i));
    }

    let mut config = config(&yaml);
    config.settings.max_concurrency = max_concurrency;
    config
}

fn gauge_registry() -> (NodeExecutorRegistry, Arc<AtomicUsize>) {
    let peak = Arc::new(AtomicUsize::new(0));
    let mut registry = NodeExecutorRegistry::new();
    registry.register(GaugeExecutor {
        active: AtomicUsize::new(0),
        peak: peak.clone(),
    });
    (registry, peak)
}

/// Most nodes in flight at once, according to the event stream
fn max_in_flight(result: &PipelineTestResult) -> usize {
    let mut in_flight = 0usize;
    let mut peak = 0usize;
    for event in &result.events {
        match event.kind() {
            "node-start" => {
                in_flight += 1;
                peak = peak.max(in_flight);
            }
            "node-complete" | "node-error" => in_flight = in_flight.saturating_sub(1),
            _ => {}
        }
    }
    peak
}

/// Without a bound the whole frontier runs at once
#[tokio::test]
async fn test_frontier_runs_in_parallel() {
    let (registry, peak) = gauge_registry();

    let result = run_with_registry(&wide_pipeline(5, None), json!(null), registry).await;

    assert_pipeline_completed(&result);
    assert_eq!(peak.load(Ordering::SeqCst), 5);
    assert_eq!(max_in_flight(&result), 5);

    // The sink starts only after the whole first wave completed
    let sink_start = result.position("node-start", "sink");
    for i in 0..5 {
        assert!(result.position("node-complete", &format!("n{}", i)) < sink_start);
    }
}

/// max_concurrency caps overlapping nodes but every node still runs
#[tokio::test]
async fn test_max_concurrency_caps_wave() {
    let (registry, peak) = gauge_registry();

    let result = run_with_registry(&wide_pipeline(6, Some(2)), json!(null), registry).await;

    assert_pipeline_completed(&result);
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(max_in_flight(&result) <= 2);
    assert_eq!(result.record().node_results.len(), 7);

    let sink_input = &result.record().node_result("sink").unwrap().input;
    assert_eq!(sink_input.as_object().unwrap().len(), 7);
}
