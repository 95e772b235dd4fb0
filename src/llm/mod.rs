//! LLM completion providers

pub mod client;
pub mod response;
pub mod subprocess_client;

use async_trait::async_trait;
pub use client::LlmClientConfig;
pub use response::{Completion, CompletionOptions, LlmError, TokenUsage};
pub use subprocess_client::CommandLlmProvider;

/// Trait for completion providers - allows for different implementations
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a prompt
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError>;
}

/// Stub provider that echoes the prompt back
#[derive(Debug, Clone, Default)]
pub struct EchoLlmProvider;

#[async_trait]
impl LlmProvider for EchoLlmProvider {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        let words: Vec<&str> = prompt
            .split_whitespace()
            .take(options.max_tokens as usize)
            .collect();
        let prompt_tokens = prompt.split_whitespace().count() as u32;

        Ok(Completion::new(words.join(" "))
            .with_model("echo")
            .with_usage(TokenUsage::new(prompt_tokens, words.len() as u32)))
    }
}
