//! Refinement loop - bounded generate → evaluate → correct cycle.
//!
//! ```text
//! GENERATE ──▶ EVALUATE ──"yes…"──▶ ACCEPT
//!    ▲             │
//!    └── correct ◀─┘ otherwise (until max_iterations)
//! ```
//!
//! Running out of iterations is a normal outcome (`accepted == false`), not
//! an error. Provider failures propagate.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{AgentContext, AgentError, AgentRef, AgentReply, Evaluator, SpecialistAgent, Verdict};
use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::util::preview;

/// One generate/evaluate round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefinementAttempt {
    /// 1-based
    pub iteration: usize,
    pub worker_output: String,
    pub verdict: Verdict,
    /// Full evaluator text
    pub rationale: String,
}

/// Result of one loop run.
///
/// # Invariants
/// - `iterations == attempts.len()`
/// - `accepted` iff the last attempt's verdict is `Accept`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementOutcome {
    pub final_response: String,
    pub final_evaluation: String,
    pub iterations: usize,
    pub accepted: bool,
    pub attempts: Vec<RefinementAttempt>,
}

/// Build the prompt for the next round after a rejection.
pub fn correction_prompt(original_prompt: &str, rejected_output: &str, instructions: &str) -> String {
    format!(
        "The original prompt was: {}\n\
         The response to that prompt was: {}\n\
         It has been evaluated as incorrect.\n\
         Make only these corrections, do not alter content validity: {}",
        original_prompt, rejected_output, instructions
    )
}

/// Drives one specialist against one evaluator.
#[derive(Clone)]
pub struct RefinementLoop {
    evaluator: Arc<dyn Evaluator>,
    max_iterations: usize,
    cancel_token: Option<CancellationToken>,
}

impl RefinementLoop {
    /// Create a loop with the default budget of 10 iterations.
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            cancel_token: None,
        }
    }

    /// Create a loop using the context's iteration budget and cancellation token.
    pub fn from_context(evaluator: Arc<dyn Evaluator>, ctx: &AgentContext) -> Self {
        let refinement = Self::new(evaluator).with_max_iterations(ctx.max_iterations);
        match &ctx.cancel_token {
            Some(token) => refinement.with_cancel_token(token.clone()),
            None => refinement,
        }
    }

    /// Set the iteration budget. Zero is clamped to one.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }

    /// Run the loop.
    ///
    /// # Postconditions
    /// - The agent is called at most `max_iterations` times
    /// - On acceptance at iteration `k`, the agent was called exactly `k` times
    ///
    /// # Errors
    /// Provider errors from the agent or evaluator, or `Cancelled` when the
    /// token fires before the first iteration. Cancellation after that returns
    /// the last attempt unaccepted.
    pub async fn run(
        &self,
        agent: &dyn SpecialistAgent,
        acceptance_rule: &str,
        initial_prompt: &str,
    ) -> Result<RefinementOutcome, AgentError> {
        let mut prompt = initial_prompt.to_string();
        let mut attempts: Vec<RefinementAttempt> = Vec::new();

        for iteration in 1..=self.max_iterations {
            if self.is_cancelled() {
                if attempts.is_empty() {
                    return Err(AgentError::Cancelled);
                }
                tracing::info!(
                    "Refinement of '{}' cancelled after {} iterations",
                    agent.name(),
                    attempts.len()
                );
                break;
            }

            tracing::debug!(
                "Refinement '{}' iteration {}: prompt={}",
                agent.name(),
                iteration,
                preview(&prompt, 200)
            );
            let worker_output = agent.respond(&prompt).await?;

            let rationale = self.evaluator.judge(&worker_output, acceptance_rule).await?;
            let verdict = Verdict::classify(&rationale);
            tracing::info!(
                "Refinement '{}' iteration {}/{}: {} ({})",
                agent.name(),
                iteration,
                self.max_iterations,
                verdict,
                preview(&rationale, 120)
            );

            attempts.push(RefinementAttempt {
                iteration,
                worker_output: worker_output.clone(),
                verdict,
                rationale: rationale.clone(),
            });

            if verdict.is_accept() {
                break;
            }

            // No correction round after the last permitted attempt
            if iteration == self.max_iterations {
                break;
            }

            let instructions = self.evaluator.propose_fix(&rationale).await?;
            prompt = correction_prompt(initial_prompt, &worker_output, &instructions);
        }

        Ok(Self::outcome(attempts))
    }

    fn outcome(attempts: Vec<RefinementAttempt>) -> RefinementOutcome {
        let (final_response, final_evaluation, accepted) = attempts
            .last()
            .map(|a| (a.worker_output.clone(), a.rationale.clone(), a.verdict.is_accept()))
            .unwrap_or_default();

        if !accepted {
            tracing::warn!(
                "Refinement ended unaccepted after {} iterations",
                attempts.len()
            );
        }

        RefinementOutcome {
            final_response,
            final_evaluation,
            iterations: attempts.len(),
            accepted,
            attempts,
        }
    }
}

/// A specialist whose answers go through a refinement loop.
///
/// Routes like the wrapped agent (same name and description) and returns the
/// loop's final response, accepted or not.
pub struct RefinedAgent {
    inner: AgentRef,
    refinement: RefinementLoop,
    acceptance_rule: String,
}

impl RefinedAgent {
    pub fn new(inner: AgentRef, refinement: RefinementLoop, acceptance_rule: impl Into<String>) -> Self {
        Self {
            inner,
            refinement,
            acceptance_rule: acceptance_rule.into(),
        }
    }

    pub fn acceptance_rule(&self) -> &str {
        &self.acceptance_rule
    }

    /// Run the loop and return the full outcome.
    pub async fn refine(&self, input: &str) -> Result<RefinementOutcome, AgentError> {
        self.refinement
            .run(self.inner.as_ref(), &self.acceptance_rule, input)
            .await
    }
}

#[async_trait]
impl SpecialistAgent for RefinedAgent {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    async fn respond(&self, input: &str) -> Result<String, AgentError> {
        Ok(self.refine(input).await?.final_response)
    }

    async fn respond_detailed(&self, input: &str) -> Result<AgentReply, AgentError> {
        let outcome = self.refine(input).await?;
        Ok(AgentReply {
            text: outcome.final_response,
            accepted: Some(outcome.accepted),
            iterations: Some(outcome.iterations),
        })
    }
}
