//! Retrieval subsystem - chunking, embedding index and grounded answers.
//!
//! ## Architecture
//!
//! ```text
//! corpus ──▶ chunk_text ──▶ embed_batch ──▶ CorpusIndex ──▶ find_best_chunk
//!                 │               │                               │
//!                 ▼               ▼                               ▼
//!           ┌──────────────────────────┐            RagKnowledgePromptAgent
//!           │ CorpusStore (optional)   │
//!           │ in-memory | JSON lines   │
//!           └──────────────────────────┘
//! ```

mod chunk;
mod engine;
mod rag_agent;
mod store;

pub use chunk::{
    chunk, chunk_default, chunk_text, normalize_whitespace, validate_chunking, Chunk, ChunkError,
};
pub use engine::{best_match, CorpusIndex, RetrievalEngine, DEFAULT_EMBED_BATCH_SIZE};
pub use rag_agent::{RagKnowledgePromptAgent, RetrievalAnswer, NO_ANSWER};
pub use store::{
    new_run_id, ChunkRecord, CorpusStore, EmbeddingRecord, InMemoryCorpusStore, JsonlCorpusStore,
    StoreError,
};

use crate::agents::AgentError;

impl From<ChunkError> for AgentError {
    fn from(e: ChunkError) -> Self {
        AgentError::Retrieval(e.to_string())
    }
}

impl From<StoreError> for AgentError {
    fn from(e: StoreError) -> Self {
        AgentError::Retrieval(e.to_string())
    }
}
