//! Pipeline execution engine

pub mod engine;
pub mod events;
pub mod executor;
pub mod preview;
pub mod prompt;
pub mod recorder;
pub mod registry;

pub use engine::{EngineError, ExecutionEngine, RunOutcome};
pub use events::{EventEmitter, EventHandler, ExecutionEvent};
pub use executor::{NodeContext, NodeError, NodeExecutor, NodeOutput, SimulatedExecutor};
pub use preview::{preview, PathStep, PreviewResult};
pub use prompt::{PromptExecutor, PromptNodeConfig};
pub use recorder::RecordWriter;
pub use registry::{ExecutorNotFound, NodeExecutorRegistry};
