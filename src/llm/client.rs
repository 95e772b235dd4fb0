//! LLM client configuration

/// Configuration for the command-backed LLM client
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// Executable that receives the prompt as its last argument.
    ///
    /// If not provided, defaults to "llm" (assumes it's on PATH).
    pub command: Option<String>,

    /// Extra arguments placed before the prompt
    pub args: Vec<String>,

    /// Model name reported when the command does not report one
    pub model: Option<String>,

    /// Timeout for requests in seconds
    pub timeout_secs: u64,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            model: None,
            timeout_secs: 300,
        }
    }
}

impl LlmClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: String) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
