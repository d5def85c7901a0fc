//! Test doubles for the provider traits and agents.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::agents::{AgentContext, AgentError, Evaluator, SpecialistAgent};
use crate::config::Config;
use crate::llm::{ChatMessage, ChatOptions, ChatResponse, Embedder, LlmClient};

type ReplyFn = dyn Fn(&[ChatMessage]) -> anyhow::Result<Option<String>> + Send + Sync;

/// LLM whose replies are computed by a closure; records every request.
pub(crate) struct ScriptedLlm {
    reply: Box<ReplyFn>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    temperatures: Mutex<Vec<Option<f64>>>,
}

impl ScriptedLlm {
    pub fn new<F>(reply: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> anyhow::Result<Option<String>> + Send + Sync + 'static,
    {
        Self {
            reply: Box::new(reply),
            calls: Mutex::new(Vec::new()),
            temperatures: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same text.
    pub fn constant(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(Some(text.clone())))
    }

    /// Answer with the queued texts in order; errors once exhausted.
    pub fn queue(replies: &[&str]) -> Self {
        let queue: Mutex<VecDeque<String>> =
            Mutex::new(replies.iter().map(|s| s.to_string()).collect());
        Self::new(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .map(Some)
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        })
    }

    /// Always fail as if the provider were down.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| Err(anyhow::anyhow!("{}", message)))
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn temperatures(&self) -> Vec<Option<f64>> {
        self.temperatures.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_completion_with_options(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> anyhow::Result<ChatResponse> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.temperatures.lock().unwrap().push(options.temperature);
        let content = (self.reply)(messages)?;
        Ok(ChatResponse {
            content,
            model: Some(model.to_string()),
            ..ChatResponse::default()
        })
    }
}

/// Bag-of-keywords embedder: component `i` counts occurrences of `vocab[i]`.
///
/// Texts with none of the keywords map to the zero vector.
pub(crate) struct KeywordEmbedder {
    vocab: Vec<String>,
    fail_on: Vec<String>,
    calls: AtomicUsize,
    batches: Mutex<Vec<usize>>,
}

impl KeywordEmbedder {
    pub fn new(vocab: &[&str]) -> Self {
        Self {
            vocab: vocab.iter().map(|s| s.to_lowercase()).collect(),
            fail_on: Vec::new(),
            calls: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Fail whenever the text equals `text` exactly.
    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on.push(text.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sizes of the `embed_batch` requests seen so far.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.vocab
            .iter()
            .map(|word| lower.matches(word.as_str()).count() as f32)
            .collect()
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.iter().any(|t| t == text) {
            anyhow::bail!("embedding endpoint unavailable");
        }
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.batches.lock().unwrap().push(texts.len());
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Build a context around test doubles.
pub(crate) fn test_context(llm: Arc<dyn LlmClient>, embedder: Arc<dyn Embedder>) -> Arc<AgentContext> {
    let config = Config::new("test-key".to_string(), "test-chat".to_string(), "test-embed".to_string());
    Arc::new(AgentContext::new(&config, llm, embedder))
}

/// Specialist that echoes a numbered reply and records its inputs.
pub(crate) struct EchoAgent {
    name: String,
    description: String,
    inputs: Mutex<Vec<String>>,
}

impl EchoAgent {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }
}

#[async_trait]
impl SpecialistAgent for EchoAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn respond(&self, input: &str) -> Result<String, AgentError> {
        let mut inputs = self.inputs.lock().unwrap();
        inputs.push(input.to_string());
        Ok(format!("{} answer #{}", self.name, inputs.len()))
    }
}

/// Evaluator replaying a fixed list of verdicts (last one repeats).
pub(crate) struct ScriptedEvaluator {
    verdicts: Vec<String>,
    judged: Mutex<Vec<String>>,
    fixes: AtomicUsize,
}

impl ScriptedEvaluator {
    pub fn new(verdicts: &[&str]) -> Self {
        Self {
            verdicts: verdicts.iter().map(|s| s.to_string()).collect(),
            judged: Mutex::new(Vec::new()),
            fixes: AtomicUsize::new(0),
        }
    }

    pub fn always(verdict: &str) -> Self {
        Self::new(&[verdict])
    }

    pub fn judged(&self) -> Vec<String> {
        self.judged.lock().unwrap().clone()
    }

    pub fn fix_count(&self) -> usize {
        self.fixes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn judge(&self, candidate: &str, _acceptance_rule: &str) -> Result<String, AgentError> {
        let mut judged = self.judged.lock().unwrap();
        let idx = judged.len().min(self.verdicts.len().saturating_sub(1));
        judged.push(candidate.to_string());
        Ok(self.verdicts.get(idx).cloned().unwrap_or_default())
    }

    async fn propose_fix(&self, verdict: &str) -> Result<String, AgentError> {
        let n = self.fixes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("fix #{} for: {}", n, verdict))
    }
}
