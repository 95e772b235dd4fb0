//! agentflow - run DAG pipelines of prompt and processing nodes

pub mod cli;
pub mod core;
pub mod execution;
pub mod llm;
pub mod persistence;
pub mod template;

// Re-export commonly used types
pub use core::config::{EngineSettings, PipelineConfig};
pub use core::{Edge, EdgeKind, ExecutionStatus, Node, NodeStatus, PipelineDefinition};
pub use execution::{
    preview, EngineError, ExecutionEngine, ExecutionEvent, NodeExecutor, NodeExecutorRegistry,
    PreviewResult, RunOutcome,
};
pub use llm::{CommandLlmProvider, EchoLlmProvider, LlmClientConfig, LlmProvider};
pub use persistence::{ExecutionRecord, ExecutionRecordStore, InMemoryRecordStore};
pub use template::{PromptTemplate, TemplateStore};
