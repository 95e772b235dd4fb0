//! Main execution engine - orchestrates a pipeline run
//!
//! Runs the graph in waves: every node whose dependencies have finished is
//! dispatched concurrently, and the whole wave is joined before the next
//! frontier is computed. The first node failure aborts the run.

use crate::{
    core::{
        build_graph, validation, ExecutionGraphState, Node, NodeStatus, PipelineDefinition,
        ValidationError,
    },
    core::config::EngineSettings,
    execution::{
        events::{EventEmitter, ExecutionEvent},
        executor::{NodeContext, NodeError, NodeExecutor},
        recorder::RecordWriter,
        registry::{ExecutorNotFound, NodeExecutorRegistry},
    },
    persistence::{ExecutionRecord, ExecutionRecordStore, NodeExecutionResult, NodeMetadata},
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Errors that end a run
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Pipeline validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("No nodes to execute")]
    EmptyPipeline,

    #[error(transparent)]
    ExecutorNotFound(#[from] ExecutorNotFound),

    #[error("Pipeline stuck: no runnable nodes but {} remain ({})", .remaining.len(), .remaining.join(", "))]
    StuckGraph { remaining: Vec<String> },

    #[error("Node '{node_id}' failed: {source}")]
    NodeFailed { node_id: String, source: NodeError },

    #[error("Node task panicked: {0}")]
    TaskPanicked(String),

    #[error("Persistence error: {0:#}")]
    Persistence(anyhow::Error),
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub execution_id: Uuid,
    pub final_output: Value,
    /// The record as last persisted
    pub record: ExecutionRecord,
}

/// What a node task hands back to the run driver
struct NodeRun {
    node: Node,
    input: Value,
    start_time: DateTime<Utc>,
    metadata: NodeMetadata,
    result: Result<Value, NodeError>,
}

impl NodeRun {
    fn to_result(&self) -> NodeExecutionResult {
        let (output, status) = match &self.result {
            Ok(output) => (output.clone(), NodeStatus::Success),
            Err(_) => (Value::Null, NodeStatus::Failed),
        };
        NodeExecutionResult::for_node(
            &self.node,
            self.input.clone(),
            output,
            status,
            self.start_time,
            self.metadata.clone(),
        )
    }
}

/// A dispatched node, kept until its task settles
struct InFlight {
    node: Node,
    input: Value,
    start_time: DateTime<Utc>,
}

/// Main pipeline execution engine
pub struct ExecutionEngine {
    registry: Arc<NodeExecutorRegistry>,
    store: Arc<dyn ExecutionRecordStore>,
    events: EventEmitter,
    max_concurrency: Option<usize>,
}

impl ExecutionEngine {
    pub fn new(registry: NodeExecutorRegistry, store: Arc<dyn ExecutionRecordStore>) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
            events: EventEmitter::new(),
            max_concurrency: None,
        }
    }

    /// Cap the number of nodes running at once; `None` or zero means unbounded
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit.filter(|n| *n > 0);
        self
    }

    pub fn with_settings(self, settings: &EngineSettings) -> Self {
        self.with_max_concurrency(settings.max_concurrency)
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.add_event_handler(handler);
    }

    /// Receive events through a channel
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ExecutionEvent> {
        self.events.subscribe()
    }

    /// Execute the pipeline against one input.
    ///
    /// Validation failures return before any record is created. Every other
    /// failure leaves a `failed` record and emits an `error` event.
    pub async fn execute(
        &self,
        pipeline: &PipelineDefinition,
        input: Value,
    ) -> Result<RunOutcome, EngineError> {
        if let Err(e) = validation::check(pipeline) {
            warn!("Pipeline {} is invalid: {}", pipeline.id, e);
            return Err(e.into());
        }

        let record = ExecutionRecord::new(pipeline, input.clone());
        let execution_id = record.id;
        let writer = RecordWriter::start(self.store.clone(), record)
            .await
            .map_err(EngineError::Persistence)?;

        info!("Starting pipeline execution: {} ({})", pipeline.name, execution_id);
        self.events.emit(ExecutionEvent::Start {
            execution_id,
            pipeline_id: pipeline.id.clone(),
            pipeline_name: pipeline.name.clone(),
            timestamp: Utc::now(),
        });

        let outcome = match self.run_waves(pipeline, &input, execution_id, &writer).await {
            Ok(final_output) => {
                writer.complete(final_output.clone());
                writer
                    .finish()
                    .await
                    .map(|record| RunOutcome {
                        execution_id,
                        final_output,
                        record,
                    })
                    .map_err(EngineError::Persistence)
            }
            Err(e) => {
                writer.fail(e.to_string());
                if let Err(persist_err) = writer.finish().await {
                    error!("Could not persist failure of {}: {:#}", execution_id, persist_err);
                }
                Err(e)
            }
        };

        match &outcome {
            Ok(run) => {
                info!("Pipeline {} completed ({})", pipeline.name, execution_id);
                self.events.emit(ExecutionEvent::Complete {
                    execution_id,
                    final_output: run.final_output.clone(),
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                error!("Pipeline {} failed ({}): {}", pipeline.name, execution_id, e);
                self.events.emit(ExecutionEvent::Error {
                    execution_id,
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }

        outcome
    }

    async fn run_waves(
        &self,
        pipeline: &PipelineDefinition,
        input: &Value,
        execution_id: Uuid,
        writer: &RecordWriter,
    ) -> Result<Value, EngineError> {
        if pipeline.is_empty() {
            return Err(EngineError::EmptyPipeline);
        }

        let mut graph = build_graph(pipeline);
        let ctx = Arc::new(NodeContext {
            execution_id,
            pipeline_id: pipeline.id.clone(),
            original_input: input.clone(),
        });
        let permits = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let mut wave = 0usize;

        while !graph.all_executed() {
            let frontier = graph.frontier();
            if frontier.is_empty() {
                return Err(EngineError::StuckGraph {
                    remaining: graph.remaining(),
                });
            }

            wave += 1;
            debug!("Wave {}: dispatching {:?}", wave, frontier);

            // Resolve every executor before anything in the wave starts
            let mut dispatch: Vec<(Node, Arc<dyn NodeExecutor>, Value)> =
                Vec::with_capacity(frontier.len());
            for node_id in &frontier {
                let Some(entry) = graph.node(node_id) else {
                    continue;
                };
                let executor = self.registry.resolve(&entry.node)?;
                let node_input = graph.build_input(node_id, input);
                dispatch.push((entry.node.clone(), executor, node_input));
            }

            let mut tasks = JoinSet::new();
            let mut in_flight = HashMap::with_capacity(dispatch.len());
            for (node, executor, node_input) in dispatch {
                let handle = tasks.spawn(run_node(
                    node.clone(),
                    executor,
                    node_input.clone(),
                    ctx.clone(),
                    self.events.clone(),
                    permits.clone(),
                ));
                in_flight.insert(
                    handle.id(),
                    InFlight {
                        node,
                        input: node_input,
                        start_time: Utc::now(),
                    },
                );
            }

            self.join_wave(&mut tasks, &mut in_flight, &mut graph, writer)
                .await?;
        }

        Ok(final_output(pipeline, &graph))
    }

    /// Settle every task of a wave, aborting the rest on the first failure
    async fn join_wave(
        &self,
        tasks: &mut JoinSet<NodeRun>,
        in_flight: &mut HashMap<task::Id, InFlight>,
        graph: &mut ExecutionGraphState,
        writer: &RecordWriter,
    ) -> Result<(), EngineError> {
        while let Some(joined) = tasks.join_next_with_id().await {
            let run = match joined {
                Ok((id, run)) => {
                    in_flight.remove(&id);
                    run
                }
                Err(e) => self.panicked_run(e, in_flight)?,
            };

            writer.append(run.to_result());
            match run.result {
                Ok(output) => {
                    if !graph.mark_executed(&run.node.id, output) {
                        warn!("Node {} reported completion twice", run.node.id);
                    }
                }
                Err(source) => {
                    self.abort_wave(tasks, in_flight, writer).await;
                    return Err(EngineError::NodeFailed {
                        node_id: run.node.id,
                        source,
                    });
                }
            }
        }

        Ok(())
    }

    /// Cancel what is still running and record whatever already settled
    async fn abort_wave(
        &self,
        tasks: &mut JoinSet<NodeRun>,
        in_flight: &mut HashMap<task::Id, InFlight>,
        writer: &RecordWriter,
    ) {
        if !tasks.is_empty() {
            debug!("Aborting {} in-flight node(s)", tasks.len());
        }
        tasks.abort_all();

        while let Some(joined) = tasks.join_next_with_id().await {
            let run = match joined {
                Ok((id, run)) => {
                    in_flight.remove(&id);
                    run
                }
                Err(e) if e.is_cancelled() => continue,
                Err(e) => match self.panicked_run(e, in_flight) {
                    Ok(run) => run,
                    Err(_) => continue,
                },
            };
            writer.append(run.to_result());
        }
    }

    /// Turn a panicked node task into a failed run of that node
    fn panicked_run(
        &self,
        err: JoinError,
        in_flight: &mut HashMap<task::Id, InFlight>,
    ) -> Result<NodeRun, EngineError> {
        let Some(entry) = in_flight.remove(&err.id()) else {
            return Err(EngineError::TaskPanicked(err.to_string()));
        };

        let error = NodeError::Panicked(panic_message(err));
        error!("Node {} panicked: {}", entry.node.id, error);
        self.events.emit(ExecutionEvent::NodeError {
            node_id: entry.node.id.clone(),
            node_name: entry.node.display_name().to_string(),
            node_type: entry.node.node_type.clone(),
            error: error.to_string(),
            timestamp: Utc::now(),
        });

        let elapsed = Utc::now() - entry.start_time;
        Ok(NodeRun {
            metadata: NodeMetadata {
                duration_ms: u64::try_from(elapsed.num_milliseconds()).unwrap_or(0),
                error: Some(error.to_string()),
                ..NodeMetadata::default()
            },
            node: entry.node,
            input: entry.input,
            start_time: entry.start_time,
            result: Err(error),
        })
    }
}

fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string()),
        Err(err) => err.to_string(),
    }
}

async fn run_node(
    node: Node,
    executor: Arc<dyn NodeExecutor>,
    input: Value,
    ctx: Arc<NodeContext>,
    events: EventEmitter,
    permits: Option<Arc<Semaphore>>,
) -> NodeRun {
    let _permit = match permits {
        Some(semaphore) => semaphore.acquire_owned().await.ok(),
        None => None,
    };

    let start_time = Utc::now();
    let started = Instant::now();
    info!("Running node {} ({}) with {}", node.id, node.node_type, executor.name());
    events.emit(ExecutionEvent::NodeStart {
        node_id: node.id.clone(),
        node_name: node.display_name().to_string(),
        node_type: node.node_type.clone(),
        timestamp: start_time,
    });

    let result = executor.execute(&node, &input, &ctx).await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (metadata, result) = match result {
        Ok(out) => {
            let mut metadata = out.metadata;
            if metadata.duration_ms == 0 {
                metadata.duration_ms = elapsed_ms;
            }
            events.emit(ExecutionEvent::NodeComplete {
                node_id: node.id.clone(),
                node_name: node.display_name().to_string(),
                node_type: node.node_type.clone(),
                output: out.output.clone(),
                metadata: metadata.clone(),
                timestamp: Utc::now(),
            });
            (metadata, Ok(out.output))
        }
        Err(e) => {
            warn!("Node {} failed: {}", node.id, e);
            let metadata = NodeMetadata {
                duration_ms: elapsed_ms,
                error: Some(e.to_string()),
                ..NodeMetadata::default()
            };
            events.emit(ExecutionEvent::NodeError {
                node_id: node.id.clone(),
                node_name: node.display_name().to_string(),
                node_type: node.node_type.clone(),
                error: e.to_string(),
                timestamp: Utc::now(),
            });
            (metadata, Err(e))
        }
    };

    NodeRun {
        node,
        input,
        start_time,
        metadata,
        result,
    }
}

/// One sink: its output. Several sinks: an object keyed by sink id.
fn final_output(pipeline: &PipelineDefinition, graph: &ExecutionGraphState) -> Value {
    let sinks = pipeline.sink_nodes();
    let output_of = |node: &Node| graph.output(&node.id).cloned().unwrap_or(Value::Null);

    match sinks.as_slice() {
        [only] => output_of(*only),
        _ => Value::Object(
            sinks
                .iter()
                .map(|node| (node.id.clone(), output_of(*node)))
                .collect::<Map<String, Value>>(),
        ),
    }
}
