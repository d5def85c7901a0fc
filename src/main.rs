//! workflow-agents - product planning workflow entry point.
//!
//! Turns a product specification into user stories, features and
//! development tasks using routed, self-evaluating specialists.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use workflow_agents::agents::{
    ActionPlanner, AgentContext, AgentRef, KnowledgeAugmentedPromptAgent, LlmEvaluator,
    RefinedAgent, RefinementLoop, Router,
};
use workflow_agents::config::Config;
use workflow_agents::llm::{EmbeddingClient, OpenAiClient};
use workflow_agents::retrieval::{JsonlCorpusStore, RagKnowledgePromptAgent, RetrievalEngine};
use workflow_agents::workflow::{Workflow, WorkflowReport};

const WORKFLOW_PROMPT: &str = "What would the development tasks for this product be?";

const PLANNING_KNOWLEDGE: &str = "Stories are defined from a product spec by identifying a \
persona, an action, and a desired outcome for each story. Each story represents a specific \
functionality of the product described in the specification. \n\
Features are defined by grouping related user stories. \n\
Tasks are defined for each story and represent the engineering work required to develop the \
product. \n\
A development Plan for a product contains all these components";

const EVALUATOR_PERSONA: &str =
    "You are an evaluation agent that checks the answers of other worker agents.";

const STORY_CRITERIA: &str =
    "As a [type of user], I want [an action or feature] so that [benefit/value].";

const FEATURE_CRITERIA: &str = "The answer should be product features that follow the following structure: \
Feature Name: A clear, concise title that identifies the capability\n\
Description: A brief explanation of what the feature does and its purpose\n\
Key Functionality: The specific capabilities or actions the feature provides\n\
User Benefit: How this feature creates value for the user";

const TASK_CRITERIA: &str = "The answer should be tasks following this exact structure: \
Task ID: A unique identifier for tracking purposes\n\
Task Title: Brief description of the specific development work\n\
Related User Story: Reference to the parent user story\n\
Description: Detailed explanation of the technical work required\n\
Acceptance Criteria: Specific requirements that must be met for completion\n\
Estimated Effort: Time or complexity estimation\n\
Dependencies: Any tasks that must be completed first";

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "workflow_agents=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: chat_model={}, embedding_model={}, max_iterations={}",
        config.chat_model, config.embedding_model, config.max_iterations
    );

    let product_spec = match tokio::fs::read_to_string(&config.product_spec_path).await {
        Ok(text) => text,
        Err(e) => {
            warn!(
                "Could not load {}: {}. Continuing with an empty product spec.",
                config.product_spec_path.display(),
                e
            );
            String::new()
        }
    };

    let llm = Arc::new(
        OpenAiClient::new(config.api_key.clone(), config.base_url.clone())
            .with_timeout(config.request_timeout)?,
    );
    let embedder = Arc::new(
        EmbeddingClient::new(
            config.api_key.clone(),
            config.base_url.clone(),
            config.embedding_model.clone(),
        )
        .with_timeout(config.request_timeout)?,
    );

    // Ctrl-C stops the workflow between steps and refinement rounds
    let cancel_token = CancellationToken::new();
    {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current request");
                token.cancel();
            }
        });
    }

    let ctx = Arc::new(
        AgentContext::new(&config, llm, embedder).with_cancel_token(cancel_token.clone()),
    );

    let mut specialists = build_specialists(&ctx, &product_spec);

    if let Some(dir) = &config.store_dir {
        let engine = RetrievalEngine::new(Arc::clone(&ctx), config.chunking.clone())
            .with_store(Arc::new(JsonlCorpusStore::new(dir)));
        match RagKnowledgePromptAgent::from_corpus(engine, &product_spec, "a product analyst").await {
            Ok(agent) => {
                info!(
                    "Product spec indexed as corpus {} ({} chunks)",
                    agent.index().run_id,
                    agent.index().len()
                );
                specialists.push(Arc::new(agent.named(
                    "Product Spec Reference",
                    "Answers factual questions quoted from the product specification",
                )));
            }
            Err(e) => warn!("Product spec retrieval disabled: {}", e),
        }
    }

    let planner = Arc::new(ActionPlanner::new(Arc::clone(&ctx), PLANNING_KNOWLEDGE));
    let router = Arc::new(Router::new(Arc::clone(&ctx), specialists));
    let workflow = Workflow::new(planner, router).with_cancel_token(cancel_token);

    info!("Workflow prompt: {}", WORKFLOW_PROMPT);
    let report = workflow.run(WORKFLOW_PROMPT).await?;
    print_report(&report);

    Ok(())
}

/// Product manager, program manager and development engineer, each wrapped
/// in a refinement loop with its own acceptance criteria.
fn build_specialists(ctx: &Arc<AgentContext>, product_spec: &str) -> Vec<AgentRef> {
    let refined = |worker: KnowledgeAugmentedPromptAgent, criteria: &str| -> AgentRef {
        let evaluator = Arc::new(LlmEvaluator::new(Arc::clone(ctx), EVALUATOR_PERSONA));
        let refinement = RefinementLoop::from_context(evaluator, ctx);
        Arc::new(RefinedAgent::new(Arc::new(worker), refinement, criteria))
    };

    let product_manager = KnowledgeAugmentedPromptAgent::new(
        Arc::clone(ctx),
        "a Product Manager, you are responsible for defining the user stories for a product.",
        format!(
            "Stories are defined by writing sentences with a persona, an action, and a desired \
             outcome. The sentences always start with: As a Write several stories for the \
             product spec below, where the personas are the different users of the product. \
             \n\nProduct Specification:\n{}",
            product_spec
        ),
    )
    .named(
        "Product Manager",
        "Defines user stories for a product based on product specifications",
    );

    let program_manager = KnowledgeAugmentedPromptAgent::new(
        Arc::clone(ctx),
        "a Program Manager, you are responsible for defining the features for a product.",
        "Features of a product are defined by organizing similar user stories into cohesive groups.",
    )
    .named(
        "Program Manager",
        "Defines features by organizing similar user stories into cohesive groups",
    );

    let dev_engineer = KnowledgeAugmentedPromptAgent::new(
        Arc::clone(ctx),
        "a Development Engineer, you are responsible for defining the development tasks for a product.",
        "Development tasks are defined by identifying what needs to be built to implement each user story.",
    )
    .named(
        "Development Engineer",
        "Defines development tasks needed to implement each user story",
    );

    vec![
        refined(dev_engineer, TASK_CRITERIA),
        refined(product_manager, STORY_CRITERIA),
        refined(program_manager, FEATURE_CRITERIA),
    ]
}

fn print_report(report: &WorkflowReport) {
    println!("\n{}", "=".repeat(60));
    println!("WORKFLOW EXECUTION COMPLETE");
    println!("{}", "=".repeat(60));

    if report.cancelled {
        println!("\n(cancelled before all steps ran)");
    }

    let Some(last) = report.steps.last() else {
        println!("\nNo steps were completed.");
        return;
    };

    println!("\nTotal steps completed: {}", report.steps.len());
    println!("\n--- FINAL WORKFLOW OUTPUT ---");
    println!("Final Step ({}): {}", last.number, last.description);
    println!("Final Result: {}", last.result);

    println!("\n--- COMPLETE WORKFLOW SUMMARY ---");
    for step in &report.steps {
        println!("Step {}: {}", step.number, step.description);
        if let Some(agent) = &step.agent {
            match (step.accepted, step.iterations) {
                (Some(accepted), Some(iterations)) => println!(
                    "  Agent: {} ({} after {} iterations)",
                    agent,
                    if accepted { "accepted" } else { "NOT accepted" },
                    iterations
                ),
                _ => println!("  Agent: {}", agent),
            }
        }
        println!(
            "  Result: {}\n",
            workflow_agents::util::preview(&step.result, 1000)
        );
    }
}
