//! Agent execution context - provider handles and shared call settings.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::AgentError;
use crate::config::Config;
use crate::llm::{ChatMessage, ChatOptions, Embedder, LlmClient};
use crate::util::preview;

/// Shared context passed to all agents.
///
/// # Thread Safety
/// Context is wrapped in `Arc` and shared by every agent in a workflow. It
/// holds no mutable state: each call is a stateless request to the provider.
pub struct AgentContext {
    /// LLM client for completions
    pub llm: Arc<dyn LlmClient>,

    /// Embedding provider for routing and retrieval
    pub embedder: Arc<dyn Embedder>,

    /// Model used for every completion
    pub chat_model: String,

    /// Sampling temperature for every completion
    pub temperature: f64,

    /// Refinement loop budget, read by `RefinementLoop::from_context`
    pub max_iterations: usize,

    /// Optional cancellation token shared with refinement loops.
    pub cancel_token: Option<CancellationToken>,
}

impl AgentContext {
    /// Create a new agent context.
    pub fn new(config: &Config, llm: Arc<dyn LlmClient>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            llm,
            embedder,
            chat_model: config.chat_model.clone(),
            temperature: config.temperature,
            max_iterations: config.max_iterations,
            cancel_token: None,
        }
    }

    /// Attach a cancellation token.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Run one completion and return its text; missing content becomes `""`.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        let response = self
            .llm
            .chat_completion_with_options(
                &self.chat_model,
                messages,
                ChatOptions::with_temperature(self.temperature),
            )
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

        let text = response.text();
        tracing::debug!("Completion: {}", preview(&text, 200));
        Ok(text)
    }

    /// Embed one text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AgentError> {
        self.embedder
            .embed(text)
            .await
            .map_err(|e| AgentError::Embedding(e.to_string()))
    }
}
