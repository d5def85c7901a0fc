//! Workflow driver - plan an instruction, then route each step.
//!
//! # Flow
//! ```text
//! instruction ──▶ ActionPlanner ──▶ [step 1, step 2, ...]
//!                                        │
//!                                        ▼  (sequential)
//!                                   Router ──▶ specialist ──▶ StepResult
//! ```
//!
//! A failing step is recorded as `"Error: <message>"` and the plan continues.
//! The last step's result is the workflow's output.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::agents::{ActionPlanner, AgentError, RouteOutcome, Router};
use crate::util::preview;

/// Outcome of one routed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-based position in the plan
    pub number: usize,
    pub description: String,
    pub result: String,
    pub error: bool,
    /// Specialist the step was routed to
    pub agent: Option<String>,
    /// Evaluator acceptance, for specialists that refine their output
    pub accepted: Option<bool>,
    /// Refinement iterations spent on this step
    pub iterations: Option<usize>,
}

/// Everything a workflow run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub instruction: String,
    pub steps: Vec<StepResult>,
    /// Set when cancellation stopped the run before all steps executed
    pub cancelled: bool,
}

impl WorkflowReport {
    /// Result of the last executed step.
    pub fn final_output(&self) -> Option<&str> {
        self.steps.last().map(|s| s.result.as_str())
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|s| s.error)
    }

    /// Steps whose refinement ran out of iterations without acceptance.
    pub fn unaccepted_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|s| s.accepted == Some(false))
    }
}

/// Plans an instruction and executes its steps through a router.
pub struct Workflow {
    planner: Arc<ActionPlanner>,
    router: Arc<Router>,
    cancel_token: Option<CancellationToken>,
}

impl Workflow {
    pub fn new(planner: Arc<ActionPlanner>, router: Arc<Router>) -> Self {
        Self {
            planner,
            router,
            cancel_token: None,
        }
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }

    /// Run the whole workflow.
    ///
    /// # Errors
    /// Only planning failures abort the run; step failures are recorded in
    /// the report.
    pub async fn run(&self, instruction: &str) -> Result<WorkflowReport, AgentError> {
        tracing::info!("[Workflow] Planning: {}", preview(instruction, 200));
        let plan = self.planner.extract_steps(instruction).await?;

        for (i, step) in plan.iter().enumerate() {
            tracing::info!("[Workflow]   {}. {}", i + 1, step);
        }

        let mut report = WorkflowReport {
            instruction: instruction.to_string(),
            ..WorkflowReport::default()
        };

        for (i, step) in plan.into_steps().into_iter().enumerate() {
            let number = i + 1;

            if self.is_cancelled() {
                tracing::info!("[Workflow] Cancelled before step {}", number);
                report.cancelled = true;
                break;
            }

            tracing::info!("[Workflow] Executing step {}: {}", number, step);
            let step_result = match self.router.select_and_dispatch(&step).await {
                Ok(RouteOutcome::Dispatched { agent, reply, .. }) => {
                    if reply.accepted == Some(false) {
                        tracing::warn!(
                            "[Workflow] Step {} result from {} was never accepted",
                            number,
                            agent
                        );
                    }
                    StepResult {
                        number,
                        description: step,
                        result: reply.text,
                        error: false,
                        agent: Some(agent),
                        accepted: reply.accepted,
                        iterations: reply.iterations,
                    }
                }
                Ok(outcome @ RouteOutcome::NoSuitableAgent) => StepResult {
                    number,
                    description: step,
                    result: outcome.into_text(),
                    error: false,
                    agent: None,
                    accepted: None,
                    iterations: None,
                },
                Err(e) => {
                    tracing::error!("[Workflow] Step {} failed: {}", number, e);
                    StepResult {
                        number,
                        description: step,
                        result: format!("Error: {}", e),
                        error: true,
                        agent: None,
                        accepted: None,
                        iterations: None,
                    }
                }
            };

            tracing::info!(
                "[Workflow] Step {} result: {}",
                number,
                preview(&step_result.result, 300)
            );
            report.steps.push(step_result);
        }

        tracing::info!(
            "[Workflow] Completed {} steps ({} failed, {} unaccepted)",
            report.steps.len(),
            report.failed_steps().count(),
            report.unaccepted_steps().count()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{
        AgentRef, KnowledgeAugmentedPromptAgent, LlmEvaluator, RefinedAgent, RefinementLoop,
        NO_SUITABLE_AGENT,
    };
    use crate::llm::ChatMessage;
    use crate::testing::{test_context, EchoAgent, KeywordEmbedder, ScriptedEvaluator, ScriptedLlm};

    fn workflow(plan_text: &str, embedder: KeywordEmbedder, agents: Vec<AgentRef>) -> Workflow {
        let ctx = test_context(Arc::new(ScriptedLlm::constant(plan_text)), Arc::new(embedder));
        let planner = Arc::new(ActionPlanner::new(ctx.clone(), "knowledge"));
        let router = Arc::new(Router::new(ctx, agents));
        Workflow::new(planner, router)
    }

    #[tokio::test]
    async fn routes_every_step_in_order() {
        let stories = Arc::new(EchoAgent::new("pm", "stories"));
        let tasks = Arc::new(EchoAgent::new("dev", "tasks"));
        let wf = workflow(
            "Define the stories\n\nDefine the tasks\n",
            KeywordEmbedder::new(&["stories", "tasks"]),
            vec![stories.clone(), tasks.clone()],
        );

        let report = wf.run("Plan the product").await.unwrap();

        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[0].number, 1);
        assert_eq!(report.steps[0].description, "Define the stories");
        assert_eq!(report.steps[0].result, "pm answer #1");
        assert_eq!(report.steps[1].result, "dev answer #1");
        assert_eq!(report.steps[0].agent.as_deref(), Some("pm"));
        assert_eq!(report.steps[1].agent.as_deref(), Some("dev"));
        assert_eq!(report.steps[0].accepted, None);
        assert_eq!(report.final_output(), Some("dev answer #1"));
        assert!(!report.cancelled);
        assert_eq!(report.failed_steps().count(), 0);
    }

    #[tokio::test]
    async fn exhausted_refinement_is_reported_as_unaccepted() {
        let inner: AgentRef = Arc::new(EchoAgent::new("dev", "tasks"));
        let evaluator = Arc::new(ScriptedEvaluator::always("No, wrong format"));
        let refinement = RefinementLoop::new(evaluator).with_max_iterations(3);
        let dev: AgentRef = Arc::new(RefinedAgent::new(inner, refinement, "Task ID: ..."));
        let wf = workflow("Define the tasks", KeywordEmbedder::new(&["tasks"]), vec![dev]);

        let report = wf.run("go").await.unwrap();

        let step = &report.steps[0];
        assert!(!step.error);
        assert_eq!(step.agent.as_deref(), Some("dev"));
        assert_eq!(step.accepted, Some(false));
        assert_eq!(step.iterations, Some(3));
        assert_eq!(step.result, "dev answer #3");
        assert_eq!(report.unaccepted_steps().count(), 1);
    }

    fn system_text(messages: &[ChatMessage]) -> &str {
        messages[0].text_content().unwrap_or_default()
    }

    fn user_text(messages: &[ChatMessage]) -> &str {
        messages
            .last()
            .and_then(|m| m.text_content())
            .unwrap_or_default()
    }

    /// One model playing planner, both workers and the evaluator.
    fn product_team_llm() -> ScriptedLlm {
        ScriptedLlm::new(|messages| {
            let system = system_text(messages);
            let user = user_text(messages);
            let reply = if system.starts_with("You are an action planning agent") {
                "Define user stories\nDefine development tasks"
            } else if system.contains("a Product Manager") {
                "As a shopper, I want a cart so that I can buy several items"
            } else if system.contains("a Development Engineer") {
                if user.starts_with("The original prompt was") {
                    "Task ID: 1 Build the cart service"
                } else {
                    "draft tasks"
                }
            } else if let Some(rest) = user.strip_prefix("Does the following answer: ") {
                let candidate = rest.split("\nMeet this criteria").next().unwrap_or_default();
                if candidate.contains("As a") || candidate.contains("Task ID") {
                    "Yes, it follows the structure"
                } else {
                    "No, missing structure"
                }
            } else if user.starts_with("Provide instructions") {
                "Use the Task ID structure"
            } else {
                anyhow::bail!("unexpected request: {}", user);
            };
            Ok(Some(reply.to_string()))
        })
    }

    #[tokio::test]
    async fn plans_routes_and_refines_end_to_end() {
        let llm = Arc::new(product_team_llm());
        let ctx = test_context(llm.clone(), Arc::new(KeywordEmbedder::new(&["stories", "tasks"])));

        let refined = |worker: KnowledgeAugmentedPromptAgent, criteria: &str| -> AgentRef {
            let evaluator = Arc::new(LlmEvaluator::new(ctx.clone(), "You are an evaluation agent."));
            let refinement = RefinementLoop::from_context(evaluator, &ctx);
            Arc::new(RefinedAgent::new(Arc::new(worker), refinement, criteria))
        };
        let product_manager = KnowledgeAugmentedPromptAgent::new(
            ctx.clone(),
            "a Product Manager",
            "Stories start with: As a",
        )
        .named(
            "Product Manager",
            "Defines user stories for a product based on product specifications",
        );
        let dev_engineer = KnowledgeAugmentedPromptAgent::new(
            ctx.clone(),
            "a Development Engineer",
            "Tasks are what needs to be built",
        )
        .named(
            "Development Engineer",
            "Defines development tasks needed to implement each user story",
        );

        let wf = Workflow::new(
            Arc::new(ActionPlanner::new(ctx.clone(), "planning knowledge")),
            Arc::new(Router::new(
                ctx.clone(),
                vec![
                    refined(dev_engineer, "Task ID: ..."),
                    refined(product_manager, "As a [user], I want ..."),
                ],
            )),
        );

        let report = wf.run("What are the development tasks?").await.unwrap();

        assert_eq!(report.steps.len(), 2);
        let stories = &report.steps[0];
        assert_eq!(stories.number, 1);
        assert_eq!(stories.description, "Define user stories");
        assert_eq!(stories.agent.as_deref(), Some("Product Manager"));
        assert_eq!(stories.accepted, Some(true));
        assert_eq!(stories.iterations, Some(1));

        let tasks = &report.steps[1];
        assert_eq!(tasks.number, 2);
        assert_eq!(tasks.description, "Define development tasks");
        assert_eq!(tasks.agent.as_deref(), Some("Development Engineer"));
        assert_eq!(tasks.accepted, Some(true));
        assert_eq!(tasks.iterations, Some(2));
        assert_eq!(report.final_output(), Some("Task ID: 1 Build the cart service"));

        // plan + (work, judge) + (work, judge, fix, work, judge)
        assert_eq!(llm.call_count(), 8);
    }

    #[tokio::test]
    async fn step_errors_are_recorded_and_the_plan_continues() {
        let dev = Arc::new(EchoAgent::new("dev", "tasks"));
        let wf = workflow(
            "broken step\nDefine the tasks",
            KeywordEmbedder::new(&["tasks", "broken"]).failing_on("broken step"),
            vec![dev.clone()],
        );

        let report = wf.run("go").await.unwrap();

        assert!(report.steps[0].error);
        assert_eq!(report.steps[0].agent, None);
        assert!(report.steps[0].result.starts_with("Error: Embedding failed"));
        assert!(!report.steps[1].error);
        assert_eq!(report.final_output(), Some("dev answer #1"));
    }

    #[tokio::test]
    async fn unroutable_step_yields_sentinel_text() {
        let dev = Arc::new(EchoAgent::new("dev", "tasks"));
        let wf = workflow("bake bread", KeywordEmbedder::new(&["tasks"]), vec![dev]);

        let report = wf.run("go").await.unwrap();

        assert_eq!(report.final_output(), Some(NO_SUITABLE_AGENT));
        assert!(!report.steps[0].error);
        assert_eq!(report.steps[0].agent, None);
    }

    #[tokio::test]
    async fn empty_plan_has_no_output() {
        let wf = workflow("\n  \n", KeywordEmbedder::new(&["x"]), Vec::new());
        let report = wf.run("go").await.unwrap();
        assert!(report.steps.is_empty());
        assert_eq!(report.final_output(), None);
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_step() {
        let dev = Arc::new(EchoAgent::new("dev", "tasks"));
        let token = CancellationToken::new();
        token.cancel();
        let wf = workflow("tasks one\ntasks two", KeywordEmbedder::new(&["tasks"]), vec![dev.clone()])
            .with_cancel_token(token);

        let report = wf.run("go").await.unwrap();

        assert!(report.cancelled);
        assert!(report.steps.is_empty());
        assert_eq!(dev.call_count(), 0);
    }

    #[tokio::test]
    async fn planning_failure_aborts() {
        let ctx = test_context(
            Arc::new(ScriptedLlm::failing("upstream down")),
            Arc::new(KeywordEmbedder::new(&["x"])),
        );
        let wf = Workflow::new(
            Arc::new(ActionPlanner::new(ctx.clone(), "k")),
            Arc::new(Router::new(ctx, Vec::new())),
        );

        assert!(matches!(
            wf.run("go").await,
            Err(AgentError::ProviderUnavailable(_))
        ));
    }
}
