//! Configuration management for workflow agents.
//!
//! Configuration can be set via environment variables:
//! - `OPENAI_API_KEY` - Required. API key for the OpenAI-compatible endpoint.
//! - `OPENAI_BASE_URL` - Optional. Endpoint base URL. Defaults to `https://openai.vocareum.com/v1`.
//! - `CHAT_MODEL` - Optional. Completion model. Defaults to `gpt-4o-mini`.
//! - `EMBEDDING_MODEL` - Optional. Embedding model. Defaults to `text-embedding-3-large`.
//! - `TEMPERATURE` - Optional. Sampling temperature for every completion. Defaults to `0`.
//! - `MAX_ITERATIONS` - Optional. Refinement loop budget. Defaults to `10`.
//! - `CHUNK_SIZE` - Optional. Retrieval chunk length in characters. Defaults to `2000`.
//! - `CHUNK_OVERLAP` - Optional. Overlap between consecutive chunks. Defaults to `100`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Per-request HTTP timeout. Defaults to `120`.
//! - `PRODUCT_SPEC_PATH` - Optional. Input document for the workflow binary.
//! - `STORE_DIR` - Optional. Directory for persisted chunks and embeddings.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::retrieval::ChunkError;

pub const DEFAULT_BASE_URL: &str = "https://openai.vocareum.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_CHUNK_SIZE: usize = 2000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Retrieval chunking configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkingConfig {
    /// Nominal chunk length in characters
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks (must be < chunk_size)
    pub overlap: usize,

    /// Preferred chunk boundary
    pub break_char: char,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            break_char: '\n',
        }
    }
}

/// Workflow configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the completion/embedding endpoint
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// Model used for chat completions
    pub chat_model: String,

    /// Model used for embeddings
    pub embedding_model: String,

    /// Sampling temperature (0 = deterministic)
    pub temperature: f64,

    /// Maximum refinement iterations per step
    pub max_iterations: usize,

    /// Retrieval chunking
    pub chunking: ChunkingConfig,

    /// HTTP request timeout
    pub request_timeout: Duration,

    /// Input document for the workflow binary
    pub product_spec_path: PathBuf,

    /// Where to persist chunk/embedding records (None = in memory only)
    pub store_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENAI_API_KEY` is not set, and
    /// `ConfigError::InvalidValue` for unparsable numbers or a chunk overlap
    /// that is not smaller than the chunk size.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string());

        let embedding_model = std::env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());

        let temperature = parse_env("TEMPERATURE", 0.0)?;
        let max_iterations = parse_env("MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS)?;
        let chunk_size = parse_env("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let overlap = parse_env("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?;
        let timeout_secs: u64 = parse_env("REQUEST_TIMEOUT_SECS", 120)?;

        let product_spec_path = std::env::var("PRODUCT_SPEC_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("Product-Spec-Email-Router.txt"));

        let store_dir = std::env::var("STORE_DIR").ok().map(PathBuf::from);

        let chunking = ChunkingConfig {
            chunk_size,
            overlap,
            ..ChunkingConfig::default()
        };
        validate_chunking(&chunking)?;

        Ok(Self {
            api_key,
            base_url,
            chat_model,
            embedding_model,
            temperature,
            max_iterations,
            chunking,
            request_timeout: Duration::from_secs(timeout_secs),
            product_spec_path,
            store_dir,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, chat_model: String, embedding_model: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model,
            embedding_model,
            temperature: 0.0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            chunking: ChunkingConfig::default(),
            request_timeout: Duration::from_secs(120),
            product_spec_path: PathBuf::from("Product-Spec-Email-Router.txt"),
            store_dir: None,
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Chunking errors reported against the env var that caused them.
fn validate_chunking(chunking: &ChunkingConfig) -> Result<(), ConfigError> {
    crate::retrieval::validate_chunking(chunking).map_err(|e| {
        let name = match e {
            ChunkError::ZeroChunkSize => "CHUNK_SIZE",
            ChunkError::OverlapTooLarge { .. } => "CHUNK_OVERLAP",
        };
        ConfigError::InvalidValue(name.to_string(), e.to_string())
    })
}
