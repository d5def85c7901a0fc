//! Router - semantic dispatch to the closest specialist.
//!
//! # Selection Rule
//! The input and every agent description are embedded; the agent with the
//! strictly greatest cosine similarity wins. Because the comparison is strict,
//! the first-listed agent keeps the lead on ties.
//!
//! # Failure Handling
//! - Input cannot be embedded: the whole call fails
//! - A description cannot be embedded (or has zero magnitude): that agent is skipped
//! - No agent scorable: [`RouteOutcome::NoSuitableAgent`]

use std::sync::Arc;

use futures::future::join_all;

use super::{AgentContext, AgentError, AgentRef, AgentReply};
use crate::similarity::cosine_similarity;

/// Text returned to users when no agent could be selected.
pub const NO_SUITABLE_AGENT: &str = "Sorry, no suitable agent could be selected.";

/// The chosen agent and how every candidate scored.
#[derive(Clone)]
pub struct RouteDecision {
    pub agent: AgentRef,
    pub score: f64,
    /// `(name, score)` for each scorable agent, in registration order
    pub scores: Vec<(String, f64)>,
}

impl std::fmt::Debug for RouteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDecision")
            .field("agent", &self.agent.name())
            .field("score", &self.score)
            .field("scores", &self.scores)
            .finish()
    }
}

/// Result of a routed request.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Dispatched {
        agent: String,
        score: f64,
        reply: AgentReply,
    },
    NoSuitableAgent,
}

impl RouteOutcome {
    /// The text a caller shows: the agent's response or the sentinel message.
    pub fn into_text(self) -> String {
        match self {
            RouteOutcome::Dispatched { reply, .. } => reply.text,
            RouteOutcome::NoSuitableAgent => NO_SUITABLE_AGENT.to_string(),
        }
    }

    pub fn agent_name(&self) -> Option<&str> {
        match self {
            RouteOutcome::Dispatched { agent, .. } => Some(agent),
            RouteOutcome::NoSuitableAgent => None,
        }
    }
}

/// Routes inputs across a fixed set of specialists.
pub struct Router {
    ctx: Arc<AgentContext>,
    agents: Vec<AgentRef>,
}

impl Router {
    pub fn new(ctx: Arc<AgentContext>, agents: Vec<AgentRef>) -> Self {
        Self { ctx, agents }
    }

    pub fn agents(&self) -> &[AgentRef] {
        &self.agents
    }

    /// Pick the best agent for `input` without dispatching.
    ///
    /// Description embeddings are requested concurrently; scores are
    /// compared in registration order.
    pub async fn select(&self, input: &str) -> Result<Option<RouteDecision>, AgentError> {
        let input_embedding = self.ctx.embed(input).await?;

        let description_embeddings =
            join_all(self.agents.iter().map(|a| self.ctx.embed(a.description()))).await;

        let mut best: Option<(usize, f64)> = None;
        let mut scores = Vec::with_capacity(self.agents.len());

        for (idx, (agent, embedding)) in self
            .agents
            .iter()
            .zip(description_embeddings)
            .enumerate()
        {
            let embedding = match embedding {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Skipping agent '{}': {}", agent.name(), e);
                    continue;
                }
            };

            let Some(score) = cosine_similarity(&input_embedding, &embedding) else {
                tracing::warn!("Skipping agent '{}': description not comparable", agent.name());
                continue;
            };

            tracing::debug!("{} = {:.4}", agent.name(), score);
            scores.push((agent.name().to_string(), score));

            let better = match best {
                None => true,
                Some((_, best_score)) => score > best_score,
            };
            if better {
                best = Some((idx, score));
            }
        }

        Ok(best.map(|(idx, score)| RouteDecision {
            agent: Arc::clone(&self.agents[idx]),
            score,
            scores,
        }))
    }

    /// Select the best agent and forward `input` to it.
    ///
    /// # Errors
    /// Input embedding failure, or an error from the chosen agent.
    pub async fn select_and_dispatch(&self, input: &str) -> Result<RouteOutcome, AgentError> {
        let Some(decision) = self.select(input).await? else {
            tracing::warn!("No suitable agent for input among {} candidates", self.agents.len());
            return Ok(RouteOutcome::NoSuitableAgent);
        };

        tracing::info!(
            "[Router] Best agent: {} (score={:.3})",
            decision.agent.name(),
            decision.score
        );

        let reply = decision.agent.respond_detailed(input).await?;
        Ok(RouteOutcome::Dispatched {
            agent: decision.agent.name().to_string(),
            score: decision.score,
            reply,
        })
    }
}
