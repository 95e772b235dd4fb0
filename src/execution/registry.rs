//! Executor lookup: the first registered executor that accepts a node wins

use crate::core::Node;
use crate::execution::executor::{NodeExecutor, SimulatedExecutor, SIMULATED_NODE_TYPES};
use crate::execution::prompt::PromptExecutor;
use crate::llm::LlmProvider;
use crate::template::TemplateRenderer;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("No executor found for node '{node_id}' of type '{node_type}'")]
pub struct ExecutorNotFound {
    pub node_id: String,
    pub node_type: String,
}

/// Ordered list of executors
#[derive(Default)]
pub struct NodeExecutorRegistry {
    executors: Vec<Arc<dyn NodeExecutor>>,
}

impl NodeExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated executors for the built-in types plus the prompt executor
    pub fn with_defaults(
        simulated_delay: Duration,
        templates: Arc<dyn TemplateRenderer>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        let mut registry = Self::new();
        for node_type in SIMULATED_NODE_TYPES {
            registry.register(SimulatedExecutor::new(*node_type, simulated_delay));
        }
        registry.register(PromptExecutor::new(templates, llm));
        registry
    }

    /// Append an executor; earlier registrations take precedence
    pub fn register<E: NodeExecutor + 'static>(&mut self, executor: E) {
        self.executors.push(Arc::new(executor));
    }

    pub fn resolve(&self, node: &Node) -> Result<Arc<dyn NodeExecutor>, ExecutorNotFound> {
        self.executors
            .iter()
            .find(|e| e.can_execute(node))
            .cloned()
            .ok_or_else(|| ExecutorNotFound {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl std::fmt::Debug for NodeExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.executors.iter().map(|e| e.name()).collect();
        f.debug_struct("NodeExecutorRegistry")
            .field("executors", &names)
            .finish()
    }
}
