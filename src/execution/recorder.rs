//! Single-writer persistence of the execution record
//!
//! One spawned task owns the run's [`ExecutionRecord`] and drains a channel
//! of mutations, saving after each one. Concurrent node completions never
//! fetch-modify-save the record themselves.

use crate::persistence::{ExecutionRecord, ExecutionRecordStore, NodeExecutionResult};
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

#[derive(Debug)]
enum RecordCommand {
    Append(Box<NodeExecutionResult>),
    Complete(Value),
    Fail(String),
}

/// Handle to the task that owns and persists a run's record
pub struct RecordWriter {
    tx: mpsc::UnboundedSender<RecordCommand>,
    task: JoinHandle<Result<ExecutionRecord>>,
}

impl RecordWriter {
    /// Persist the initial record and spawn the writer task
    pub async fn start(store: Arc<dyn ExecutionRecordStore>, record: ExecutionRecord) -> Result<Self> {
        store.save(&record).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drain(store, record, rx));

        Ok(Self { tx, task })
    }

    /// Queue a node result for appending
    pub fn append(&self, result: NodeExecutionResult) {
        self.send(RecordCommand::Append(Box::new(result)));
    }

    pub fn complete(&self, final_output: Value) {
        self.send(RecordCommand::Complete(final_output));
    }

    pub fn fail(&self, error: impl Into<String>) {
        self.send(RecordCommand::Fail(error.into()));
    }

    fn send(&self, command: RecordCommand) {
        if self.tx.send(command).is_err() {
            error!("Record writer stopped before all updates were queued");
        }
    }

    /// Wait for every queued update to be saved and return the final record.
    ///
    /// Fails with the first save error, if any occurred.
    pub async fn finish(self) -> Result<ExecutionRecord> {
        drop(self.tx);
        self.task.await?
    }
}

async fn drain(
    store: Arc<dyn ExecutionRecordStore>,
    mut record: ExecutionRecord,
    mut rx: mpsc::UnboundedReceiver<RecordCommand>,
) -> Result<ExecutionRecord> {
    let mut first_error: Option<anyhow::Error> = None;

    while let Some(command) = rx.recv().await {
        let applied = match command {
            RecordCommand::Append(result) => {
                debug!("Recording result of node {}", result.node_id);
                record.append_result(*result)
            }
            RecordCommand::Complete(output) => record.complete(output),
            RecordCommand::Fail(message) => record.fail(message),
        };

        if let Err(e) = applied {
            warn!("Ignoring update to execution record {}: {}", record.id, e);
            continue;
        }

        if let Err(e) = store.save(&record).await {
            error!("Failed to save execution record {}: {:#}", record.id, e);
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(record),
    }
}
