//! Core types for the agent system.

use serde::{Deserialize, Serialize};

/// Errors that can occur in agent operations.
///
/// Normal outcomes such as "no suitable agent", an unaccepted refinement run
/// or an empty corpus are not errors; they are carried by the result types of
/// the respective components.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    /// The completion endpoint failed (after the client's own retries).
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// An embedding could not be produced.
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Corpus chunking or persistence failed.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// The caller cancelled before any work was done.
    #[error("Cancelled")]
    Cancelled,
}

/// Evaluator verdict on one worker output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accept,
    Reject,
}

impl Verdict {
    /// Classify evaluator text: accepted iff it starts with "yes", ignoring
    /// case and leading whitespace. Anything else, including empty text, rejects.
    pub fn classify(text: &str) -> Self {
        let accepted = text
            .trim_start()
            .get(..3)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("yes"));
        if accepted {
            Verdict::Accept
        } else {
            Verdict::Reject
        }
    }

    pub fn is_accept(self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Reject => write!(f, "reject"),
        }
    }
}
