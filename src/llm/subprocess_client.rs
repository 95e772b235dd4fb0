//! LLM provider backed by a local command (model server CLI, wrapper script)

use crate::llm::{Completion, CompletionOptions, LlmClientConfig, LlmError, LlmProvider};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs `<command> <args..> <prompt>` and reads the completion from stdout.
///
/// Sampling options are passed through the `LLM_MAX_TOKENS`,
/// `LLM_TEMPERATURE` and `LLM_STOP` environment variables. Stdout may be a
/// JSON object `{text, model, usage}` or plain text.
#[derive(Debug, Clone)]
pub struct CommandLlmProvider {
    command: String,
    args: Vec<String>,
    model: String,
    timeout_secs: u64,
}

impl CommandLlmProvider {
    pub fn new(config: LlmClientConfig) -> Self {
        let command = config.command.unwrap_or_else(|| "llm".to_string());
        let model = config.model.unwrap_or_else(|| command.clone());
        Self {
            command,
            args: config.args,
            model,
            timeout_secs: config.timeout_secs,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn parse_output(&self, stdout: &str, options: &CompletionOptions) -> Completion {
        let mut completion = match serde_json::from_str::<Completion>(stdout.trim()) {
            Ok(parsed) => parsed,
            Err(_) => Completion::new(stdout.trim_end()),
        };

        if completion.model.is_empty() {
            completion.model = self.model.clone();
        }

        // Not every backend honors stop sequences
        if let Some(cut) = options
            .stop_sequences
            .iter()
            .filter(|s| !s.is_empty())
            .filter_map(|s| completion.text.find(s.as_str()))
            .min()
        {
            completion.text.truncate(cut);
        }

        completion
    }
}

#[async_trait]
impl LlmProvider for CommandLlmProvider {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        debug!(
            "Spawning {} with prompt length: {}",
            self.command,
            prompt.len()
        );

        let timeout_duration = Duration::from_secs(self.timeout_secs);

        let result = timeout(
            timeout_duration,
            Command::new(&self.command)
                .args(&self.args)
                .arg(prompt)
                .env("LLM_MAX_TOKENS", options.max_tokens.to_string())
                .env("LLM_TEMPERATURE", options.temperature.to_string())
                .env("LLM_STOP", options.stop_sequences.join("\n"))
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| LlmError::Timeout(self.timeout_secs))?;

        let output = result.map_err(|e| {
            LlmError::Internal(format!("Failed to execute {}: {}", self.command, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("{} exited with code {}: {}", self.command, exit_code, stderr.trim());
            return Err(LlmError::Api(format!(
                "{} exited with code {}: {}",
                self.command,
                exit_code,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout).map_err(|e| {
            LlmError::Internal(format!("Failed to decode {} output: {}", self.command, e))
        })?;

        debug!("{} returned {} bytes of output", self.command, stdout.len());

        Ok(self.parse_output(&stdout, options))
    }
}
