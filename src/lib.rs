//! # Workflow Agents
//!
//! Orchestration of LLM-backed specialist agents.
//!
//! This library provides:
//! - A semantic router that dispatches free text to the closest specialist
//! - A refinement loop in which an evaluator judges and corrects a worker
//! - A step planner that turns an instruction into ordered steps
//! - A retrieval engine that answers from the most relevant corpus chunk
//!
//! ## Architecture
//!
//! ```text
//!   instruction
//!        │
//!        ▼
//! ┌──────────────┐     ┌──────────┐     ┌──────────────────────────────┐
//! │ActionPlanner │────▶│  Router  │────▶│ RefinedAgent                 │
//! └──────────────┘     └──────────┘     │  worker ◀──▶ LlmEvaluator    │
//!                           │           └──────────────────────────────┘
//!                           ▼
//!                 RagKnowledgePromptAgent ──▶ RetrievalEngine
//! ```
//!
//! ## Modules
//! - `agents`: specialists, router, refinement loop, planner
//! - `retrieval`: chunking, corpus store, best-chunk search
//! - `llm`: OpenAI-compatible completion and embedding clients
//! - `workflow`: plan-then-route driver

pub mod agents;
pub mod config;
pub mod llm;
pub mod retrieval;
pub mod similarity;
pub mod util;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use agents::{AgentContext, AgentError, AgentRef, SpecialistAgent};
pub use config::Config;
pub use workflow::{StepResult, Workflow, WorkflowReport};
