//! Step planner - turns a high-level instruction into ordered steps.
//!
//! The model is constrained to steps present in the planner's knowledge and
//! returns them one per line. Parsing is deliberately plain: every non-blank
//! line becomes a step, in order, with no renumbering or deduplication.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{AgentContext, AgentError};
use crate::llm::ChatMessage;

/// Ordered step descriptions extracted from one instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    steps: Vec<String>,
}

impl Plan {
    pub fn new(steps: Vec<String>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.steps.iter()
    }

    pub fn into_steps(self) -> Vec<String> {
        self.steps
    }
}

/// Split model output into steps: trimmed, non-empty lines in order.
pub fn parse_steps(text: &str) -> Plan {
    Plan::new(
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect(),
    )
}

/// Extracts action steps using a fixed body of workflow knowledge.
pub struct ActionPlanner {
    ctx: Arc<AgentContext>,
    knowledge: String,
}

impl ActionPlanner {
    pub fn new(ctx: Arc<AgentContext>, knowledge: impl Into<String>) -> Self {
        Self {
            ctx,
            knowledge: knowledge.into(),
        }
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "You are an action planning agent. Using your knowledge, you extract from the user \
             prompt the steps requested to complete the action the user is asking for. You return \
             the steps as a list. Only return the steps in your knowledge. Forget any previous \
             context. This is your knowledge: {}",
            self.knowledge
        )
    }

    /// Ask the model for the steps of `instruction`.
    ///
    /// An empty plan is a valid result.
    pub async fn extract_steps(&self, instruction: &str) -> Result<Plan, AgentError> {
        let messages = [
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(instruction),
        ];
        let text = self.ctx.complete(&messages).await?;
        let plan = parse_steps(&text);
        tracing::info!("[Planner] Extracted {} steps", plan.len());
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, KeywordEmbedder, ScriptedLlm};

    #[test]
    fn parse_drops_blank_lines_and_keeps_order() {
        let plan = parse_steps("1. Define stories\n\n   \n2. Define features  \r\n3. Define tasks\n");
        assert_eq!(
            plan.steps(),
            &[
                "1. Define stories".to_string(),
                "2. Define features".to_string(),
                "3. Define tasks".to_string(),
            ]
        );
    }

    #[test]
    fn parse_keeps_duplicates_and_headers() {
        let plan = parse_steps("Steps:\n- a\n- a");
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.steps()[0], "Steps:");
    }

    #[test]
    fn parse_blank_text_is_empty_plan() {
        assert!(parse_steps("").is_empty());
        assert!(parse_steps(" \n\t\n").is_empty());
    }

    #[tokio::test]
    async fn extract_steps_sends_knowledge_and_instruction() {
        let llm = Arc::new(ScriptedLlm::constant("Make dough\nBake\n"));
        let ctx = test_context(llm.clone(), Arc::new(KeywordEmbedder::new(&["x"])));
        let planner = ActionPlanner::new(ctx, "Bread: make dough, bake");

        let plan = planner.extract_steps("How do I make bread?").await.unwrap();

        assert_eq!(plan.into_steps(), vec!["Make dough".to_string(), "Bake".to_string()]);
        let calls = llm.calls();
        let system = calls[0][0].text_content().unwrap();
        assert!(system.starts_with("You are an action planning agent."));
        assert!(system.ends_with("This is your knowledge: Bread: make dough, bake"));
        assert_eq!(calls[0][1].text_content(), Some("How do I make bread?"));
    }

    #[tokio::test]
    async fn empty_completion_is_empty_plan() {
        let ctx = test_context(
            Arc::new(ScriptedLlm::new(|_| Ok(None))),
            Arc::new(KeywordEmbedder::new(&["x"])),
        );
        let plan = ActionPlanner::new(ctx, "k").extract_steps("anything").await.unwrap();
        assert!(plan.is_empty());
    }
}
