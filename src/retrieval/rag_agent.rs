//! Specialist that answers from the most relevant corpus chunk.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::engine::{CorpusIndex, RetrievalEngine};
use crate::agents::{AgentError, SpecialistAgent};
use crate::llm::ChatMessage;

/// Reply text when the corpus has nothing to answer from.
pub const NO_ANSWER: &str = "no answer available";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetrievalAnswer {
    Answer {
        chunk_id: usize,
        score: f64,
        text: String,
    },
    NoAnswer,
}

impl RetrievalAnswer {
    pub fn into_text(self) -> String {
        match self {
            RetrievalAnswer::Answer { text, .. } => text,
            RetrievalAnswer::NoAnswer => NO_ANSWER.to_string(),
        }
    }
}

/// Persona-driven RAG agent over a prebuilt corpus index.
pub struct RagKnowledgePromptAgent {
    engine: RetrievalEngine,
    index: Arc<CorpusIndex>,
    persona: String,
    name: String,
    description: String,
}

impl RagKnowledgePromptAgent {
    pub fn new(engine: RetrievalEngine, index: Arc<CorpusIndex>, persona: impl Into<String>) -> Self {
        let persona = persona.into();
        Self {
            engine,
            index,
            name: "rag".to_string(),
            description: persona.clone(),
            persona,
        }
    }

    /// Chunk and embed `corpus`, then wrap the result.
    pub async fn from_corpus(
        engine: RetrievalEngine,
        corpus: &str,
        persona: impl Into<String>,
    ) -> Result<Self, AgentError> {
        let index = engine.build(corpus).await?;
        Ok(Self::new(engine, index, persona))
    }

    pub fn named(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.name = name.into();
        self.description = description.into();
        self
    }

    pub fn index(&self) -> &Arc<CorpusIndex> {
        &self.index
    }

    /// Retrieve the best chunk and answer `query` from it alone.
    pub async fn answer(&self, query: &str) -> Result<RetrievalAnswer, AgentError> {
        let Some((chunk, score)) = self.engine.find_best_chunk(query, &self.index).await? else {
            tracing::info!("[{}] No chunk available for query", self.name);
            return Ok(RetrievalAnswer::NoAnswer);
        };

        let messages = [
            ChatMessage::system(format!(
                "You are {}, a knowledge-based assistant. Forget previous context.",
                self.persona
            )),
            ChatMessage::user(format!(
                "Answer based only on this information: {}. Prompt: {}",
                chunk.text, query
            )),
        ];
        let text = self.engine.context().complete(&messages).await?;

        Ok(RetrievalAnswer::Answer {
            chunk_id: chunk.id,
            score,
            text,
        })
    }
}

#[async_trait]
impl SpecialistAgent for RagKnowledgePromptAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn respond(&self, input: &str) -> Result<String, AgentError> {
        Ok(self.answer(input).await?.into_text())
    }
}
