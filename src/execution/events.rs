//! Progress events and the emitter that fans them out to subscribers
//!
//! Events are pushed as they happen and are not buffered: a handler added
//! mid-run only sees what is emitted after it was added.

use crate::persistence::NodeMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Events that can occur during a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ExecutionEvent {
    #[serde(rename_all = "camelCase")]
    Start {
        execution_id: Uuid,
        pipeline_id: String,
        pipeline_name: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    NodeStart {
        node_id: String,
        node_name: String,
        node_type: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    NodeComplete {
        node_id: String,
        node_name: String,
        node_type: String,
        output: Value,
        metadata: NodeMetadata,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    NodeError {
        node_id: String,
        node_name: String,
        node_type: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        execution_id: Uuid,
        final_output: Value,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        execution_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionEvent::Start { .. } => "start",
            ExecutionEvent::NodeStart { .. } => "node-start",
            ExecutionEvent::NodeComplete { .. } => "node-complete",
            ExecutionEvent::NodeError { .. } => "node-error",
            ExecutionEvent::Complete { .. } => "complete",
            ExecutionEvent::Error { .. } => "error",
        }
    }

    /// Node the event is about, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ExecutionEvent::NodeStart { node_id, .. }
            | ExecutionEvent::NodeComplete { node_id, .. }
            | ExecutionEvent::NodeError { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Ordered list of event handlers, cheap to clone into node tasks
#[derive(Clone, Default)]
pub struct EventEmitter {
    handlers: Arc<RwLock<Vec<EventHandler>>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ExecutionEvent>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.push(Arc::new(handler));
    }

    /// Subscribe through a channel; the receiver ends when the emitter is dropped.
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ExecutionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.push(tx);
        rx
    }

    /// Emit an event to all handlers, then to channel subscribers
    pub fn emit(&self, event: ExecutionEvent) {
        let handlers: Vec<EventHandler> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers.clone()
        };
        for handler in handlers {
            handler(event.clone());
        }

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Callback handlers plus live channel subscribers
    pub fn handler_count(&self) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner()).len();
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        handlers + subscribers.iter().filter(|tx| !tx.is_closed()).count()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("handlers", &self.handler_count())
            .finish()
    }
}
