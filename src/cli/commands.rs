//! CLI command definitions

use crate::llm::LlmClientConfig;
use clap::Args;
use serde_json::Value;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long)]
    pub file: String,

    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub llm: LlmArgs,

    /// Maximum nodes running at once (overrides the file setting)
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Delay of simulated node types in milliseconds (overrides the file setting)
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Don't save execution to history
    #[arg(long)]
    pub no_history: bool,

    /// Print each node's output as it completes
    #[arg(long)]
    pub show_output: bool,
}

/// Validate a pipeline file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Dry-run a pipeline along its first edges
#[derive(Debug, Args, Clone)]
pub struct PreviewCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long)]
    pub file: String,

    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub llm: LlmArgs,

    /// Delay of simulated node types in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show execution history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline ID to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent executions to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific execution
    #[arg(long)]
    pub execution_id: Option<String>,
}

/// Run input shared by `run` and `preview`
#[derive(Debug, Args, Clone, Default)]
pub struct InputArgs {
    /// Input text
    #[arg(short, long)]
    pub input: Option<String>,

    /// Parse the input as JSON
    #[arg(long)]
    pub json_input: bool,
}

impl InputArgs {
    /// The run input; missing input becomes an empty string
    pub fn value(&self) -> Result<Value, String> {
        parse_input(self.input.as_deref().unwrap_or(""), self.json_input)
    }
}

/// LLM backend selection shared by `run` and `preview`
#[derive(Debug, Args, Clone, Default)]
pub struct LlmArgs {
    /// Command used for prompt nodes (receives the prompt as last argument)
    #[arg(long)]
    pub llm_command: Option<String>,

    /// Extra argument passed to the LLM command (repeatable)
    #[arg(long = "llm-arg")]
    pub llm_args: Vec<String>,

    /// Echo prompts back instead of calling an LLM
    #[arg(long)]
    pub echo_llm: bool,

    /// Timeout for each LLM call in seconds
    #[arg(long)]
    pub llm_timeout: Option<u64>,

    /// Model name reported for completions (defaults to the command name)
    #[arg(long)]
    pub llm_model: Option<String>,
}

impl LlmArgs {
    pub fn client_config(&self) -> LlmClientConfig {
        let mut config = LlmClientConfig::new().with_args(self.llm_args.clone());
        if let Some(command) = &self.llm_command {
            config = config.with_command(command.clone());
        }
        if let Some(timeout) = self.llm_timeout {
            config = config.with_timeout(timeout);
        }
        if let Some(model) = &self.llm_model {
            config = config.with_model(model.clone());
        }
        config
    }
}

/// Parse run input, either as raw text or as JSON
pub fn parse_input(raw: &str, json: bool) -> Result<Value, String> {
    if json {
        serde_json::from_str(raw).map_err(|e| format!("Invalid JSON input: {}", e))
    } else {
        Ok(Value::String(raw.to_string()))
    }
}
