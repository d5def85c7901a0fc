//! Prompt-template specialists.
//!
//! These agents differ only in the system instructions they prepend to the
//! user's input. Each call is independent and tells the model to disregard
//! any earlier conversation.

use std::sync::Arc;

use async_trait::async_trait;

use super::{AgentContext, AgentError, SpecialistAgent};
use crate::llm::ChatMessage;

/// Sends the prompt to the model with no system instructions.
pub struct DirectPromptAgent {
    ctx: Arc<AgentContext>,
    name: String,
    description: String,
}

impl DirectPromptAgent {
    pub fn new(ctx: Arc<AgentContext>) -> Self {
        Self {
            ctx,
            name: "direct".to_string(),
            description: "General-purpose assistant answering prompts directly".to_string(),
        }
    }

    pub fn named(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.name = name.into();
        self.description = description.into();
        self
    }
}

#[async_trait]
impl SpecialistAgent for DirectPromptAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn respond(&self, input: &str) -> Result<String, AgentError> {
        self.ctx.complete(&[ChatMessage::user(input)]).await
    }
}

/// Answers in a fixed persona.
pub struct AugmentedPromptAgent {
    ctx: Arc<AgentContext>,
    persona: String,
    name: String,
    description: String,
}

impl AugmentedPromptAgent {
    pub fn new(ctx: Arc<AgentContext>, persona: impl Into<String>) -> Self {
        let persona = persona.into();
        Self {
            ctx,
            name: "persona".to_string(),
            description: persona.clone(),
            persona,
        }
    }

    pub fn named(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.name = name.into();
        self.description = description.into();
        self
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}. Forget any previous conversation context and respond only based on this current interaction.",
            self.persona
        )
    }
}

#[async_trait]
impl SpecialistAgent for AugmentedPromptAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn respond(&self, input: &str) -> Result<String, AgentError> {
        let messages = [
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(input),
        ];
        self.ctx.complete(&messages).await
    }
}

/// Answers in a persona, restricted to the supplied knowledge.
pub struct KnowledgeAugmentedPromptAgent {
    ctx: Arc<AgentContext>,
    persona: String,
    knowledge: String,
    name: String,
    description: String,
}

impl KnowledgeAugmentedPromptAgent {
    pub fn new(
        ctx: Arc<AgentContext>,
        persona: impl Into<String>,
        knowledge: impl Into<String>,
    ) -> Self {
        let persona = persona.into();
        Self {
            ctx,
            name: "knowledge".to_string(),
            description: persona.clone(),
            persona,
            knowledge: knowledge.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.name = name.into();
        self.description = description.into();
        self
    }

    pub fn knowledge(&self) -> &str {
        &self.knowledge
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "You are {} knowledge-based assistant. Forget all previous context. \
             Use only the following knowledge to answer, do not use your own knowledge: {} \
             Answer the prompt based on this knowledge, not your own.",
            self.persona, self.knowledge
        )
    }
}

#[async_trait]
impl SpecialistAgent for KnowledgeAugmentedPromptAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn respond(&self, input: &str) -> Result<String, AgentError> {
        let messages = [
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(input),
        ];
        self.ctx.complete(&messages).await
    }
}
