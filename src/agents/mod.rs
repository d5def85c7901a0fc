//! Agents module - specialists and the components that coordinate them.
//!
//! # Specialist Agents
//! - **DirectPromptAgent**: forwards the prompt as-is
//! - **AugmentedPromptAgent**: answers in a fixed persona
//! - **KnowledgeAugmentedPromptAgent**: answers only from supplied knowledge
//! - **RagKnowledgePromptAgent** (in `retrieval`): answers from the best corpus chunk
//! - **RefinedAgent**: any specialist wrapped in the refinement loop
//!
//! # Coordination
//! - **Router**: picks the specialist whose description is closest to the input
//! - **RefinementLoop**: generate → evaluate → correct, bounded by `max_iterations`
//! - **ActionPlanner**: splits an instruction into ordered steps
//!
//! Every call is stateless: agents carry no conversation memory between requests.

mod context;
mod evaluator;
mod planner;
mod prompt;
mod refine;
mod router;
mod types;

pub use context::AgentContext;
pub use evaluator::{Evaluator, LlmEvaluator};
pub use planner::{parse_steps, ActionPlanner, Plan};
pub use prompt::{AugmentedPromptAgent, DirectPromptAgent, KnowledgeAugmentedPromptAgent};
pub use refine::{
    correction_prompt, RefinedAgent, RefinementAttempt, RefinementLoop, RefinementOutcome,
};
pub use router::{RouteDecision, RouteOutcome, Router, NO_SUITABLE_AGENT};
pub use types::{AgentError, Verdict};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A response plus how it was produced.
///
/// `accepted` and `iterations` are `None` for specialists that do not
/// evaluate their own output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReply {
    pub text: String,
    pub accepted: Option<bool>,
    pub iterations: Option<usize>,
}

impl AgentReply {
    pub fn plain(text: String) -> Self {
        Self {
            text,
            accepted: None,
            iterations: None,
        }
    }
}

/// A capability that turns free text into free text.
///
/// The router and refinement loop depend only on this trait, never on a
/// concrete agent type.
///
/// # Invariants
/// - `name()` is unique within a routing set
/// - `respond()` returns `Ok("")` when the provider produced no content
#[async_trait]
pub trait SpecialistAgent: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Natural-language capability summary, embedded for routing.
    fn description(&self) -> &str;

    /// Answer one input.
    async fn respond(&self, input: &str) -> Result<String, AgentError>;

    /// Answer one input, reporting acceptance when the agent evaluates itself.
    async fn respond_detailed(&self, input: &str) -> Result<AgentReply, AgentError> {
        Ok(AgentReply::plain(self.respond(input).await?))
    }
}

/// Shared reference to a specialist.
pub type AgentRef = Arc<dyn SpecialistAgent>;
