//! Evaluation agent - judges worker output against an acceptance rule.
//!
//! # Verdict Protocol
//! The judge is asked to answer "Yes" or "No" followed by its reasoning.
//! [`Verdict::classify`](super::Verdict::classify) reads only the prefix.
//! On rejection the evaluator is asked a second time for concrete correction
//! instructions, which the refinement loop feeds back to the worker.

use std::sync::Arc;

use async_trait::async_trait;

use super::{AgentContext, AgentError};
use crate::llm::ChatMessage;

/// Judges candidates and proposes fixes.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Decide whether `candidate` satisfies `acceptance_rule`.
    ///
    /// Returns free text beginning with "yes" when accepted.
    async fn judge(&self, candidate: &str, acceptance_rule: &str) -> Result<String, AgentError>;

    /// Turn a rejection rationale into instructions for the worker.
    async fn propose_fix(&self, verdict: &str) -> Result<String, AgentError>;
}

/// Evaluator backed by the completion provider.
pub struct LlmEvaluator {
    ctx: Arc<AgentContext>,
    persona: String,
}

impl LlmEvaluator {
    pub fn new(ctx: Arc<AgentContext>, persona: impl Into<String>) -> Self {
        Self {
            ctx,
            persona: persona.into(),
        }
    }

    pub fn judge_prompt(candidate: &str, acceptance_rule: &str) -> String {
        format!(
            "Does the following answer: {}\n\
             Meet this criteria: {}\n\
             Respond Yes or No, and the reason why it does or doesn't meet the criteria.",
            candidate, acceptance_rule
        )
    }

    pub fn fix_prompt(verdict: &str) -> String {
        format!(
            "Provide instructions to fix an answer based on these reasons why it is incorrect: {}",
            verdict
        )
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    async fn judge(&self, candidate: &str, acceptance_rule: &str) -> Result<String, AgentError> {
        let messages = [
            ChatMessage::system(self.persona.as_str()),
            ChatMessage::user(Self::judge_prompt(candidate, acceptance_rule)),
        ];
        Ok(self.ctx.complete(&messages).await?.trim().to_string())
    }

    async fn propose_fix(&self, verdict: &str) -> Result<String, AgentError> {
        let messages = [
            ChatMessage::system(self.persona.as_str()),
            ChatMessage::user(Self::fix_prompt(verdict)),
        ];
        Ok(self.ctx.complete(&messages).await?.trim().to_string())
    }
}
