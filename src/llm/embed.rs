//! Embedding client for OpenAI-compatible `/embeddings` endpoints.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{with_retry, LlmError, RetryConfig};
use super::openai::OpenAiClient;
use super::Embedder;

/// Client for generating embeddings.
pub struct EmbeddingClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry_config: RetryConfig,
}

impl EmbeddingClient {
    /// Create a new embedding client.
    pub fn new(api_key: String, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.into(),
            model: model.into(),
            retry_config: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Apply a per-request timeout to the underlying HTTP client.
    ///
    /// # Errors
    /// Fails when the HTTP client cannot be built (e.g. no TLS backend).
    pub fn with_timeout(mut self, timeout: Duration) -> reqwest::Result<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Get the configured model.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    async fn execute_request(&self, request: &EmbeddingRequest) -> Result<Vec<Vec<f32>>, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        let retry_after = OpenAiClient::parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &body, retry_after));
        }

        parse_embeddings(&body, request.input.len())
    }
}

/// Parse an embeddings response, ordering vectors by their `index`.
fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
    let response: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::parse_error(format!("Failed to parse embedding response: {} - {}", e, body))
    })?;

    let mut data = response.data;
    data.sort_by_key(|d| d.index);

    if data.len() != expected {
        return Err(LlmError::parse_error(format!(
            "Expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }

    if let Some(usage) = response.usage {
        tracing::debug!("Embedding request used {} tokens", usage.total_tokens);
    }

    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
            encoding_format: "float",
        };

        tracing::debug!(
            "Sending embedding request: model={}, inputs={}",
            self.model,
            texts.len()
        );

        with_retry(&self.retry_config, "Embedding", || {
            self.execute_request(&request)
        })
        .await
        .map_err(anyhow::Error::new)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
    encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingUsage {
    total_tokens: u32,
}
