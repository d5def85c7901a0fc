//! Retrieval engine - build-once embedding index and best-chunk search.

use std::collections::HashMap;
use std::sync::Arc;

use super::chunk::{chunk_text, Chunk};
use super::store::{new_run_id, CorpusStore, EmbeddingRecord};
use crate::agents::{AgentContext, AgentError};
use crate::config::ChunkingConfig;
use crate::similarity::cosine_similarity;

/// Chunks and their embeddings, immutable once built.
///
/// # Invariants
/// - `chunks.len() == embeddings.len()`
/// - `embeddings[i]` belongs to `chunks[i]`
#[derive(Debug, Clone)]
pub struct CorpusIndex {
    pub run_id: String,
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
}

impl CorpusIndex {
    /// Pair chunks with embeddings; extra items on either side are dropped.
    pub fn new(run_id: impl Into<String>, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Self {
        let run_id = run_id.into();
        let mut chunks = chunks;
        let mut embeddings = embeddings;
        if chunks.len() != embeddings.len() {
            tracing::warn!(
                "Corpus {}: {} chunks but {} embeddings, truncating",
                run_id,
                chunks.len(),
                embeddings.len()
            );
            let n = chunks.len().min(embeddings.len());
            chunks.truncate(n);
            embeddings.truncate(n);
        }
        Self {
            run_id,
            chunks,
            embeddings,
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Chunk, &[f32])> {
        self.chunks
            .iter()
            .zip(self.embeddings.iter().map(Vec::as_slice))
    }
}

/// Highest-similarity chunk for an already embedded query.
///
/// Ties go to the chunk that comes first (lowest id). Chunks whose
/// similarity cannot be computed are skipped.
pub fn best_match<'a>(query_embedding: &[f32], index: &'a CorpusIndex) -> Option<(&'a Chunk, f64)> {
    let mut best: Option<(&Chunk, f64)> = None;
    for (chunk, embedding) in index.iter() {
        let Some(score) = cosine_similarity(query_embedding, embedding) else {
            continue;
        };
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((chunk, score));
        }
    }
    best
}

/// Most texts sent to the embedder in one request.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 256;

/// Chunks a corpus, embeds it and answers nearest-chunk queries.
#[derive(Clone)]
pub struct RetrievalEngine {
    ctx: Arc<AgentContext>,
    chunking: ChunkingConfig,
    store: Option<Arc<dyn CorpusStore>>,
    embed_batch_size: usize,
}

impl RetrievalEngine {
    pub fn new(ctx: Arc<AgentContext>, chunking: ChunkingConfig) -> Self {
        Self {
            ctx,
            chunking,
            store: None,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }

    /// Cap the texts per embedding request. Zero is clamped to one.
    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size.max(1);
        self
    }

    /// Persist every build to `store`, and allow [`RetrievalEngine::load`].
    pub fn with_store(mut self, store: Arc<dyn CorpusStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn context(&self) -> &Arc<AgentContext> {
        &self.ctx
    }

    /// Chunk and embed `corpus`; each chunk is embedded exactly once.
    pub async fn build(&self, corpus: &str) -> Result<Arc<CorpusIndex>, AgentError> {
        let run_id = new_run_id();
        let chunks = chunk_text(corpus, &self.chunking)?;

        if let Some(store) = &self.store {
            store.save_chunks(&run_id, &chunks).await?;
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embed_batch_size) {
            let vectors = self
                .ctx
                .embedder
                .embed_batch(batch)
                .await
                .map_err(|e| AgentError::Embedding(e.to_string()))?;
            embeddings.extend(vectors);
        }

        if embeddings.len() != chunks.len() {
            return Err(AgentError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        if let Some(store) = &self.store {
            let records: Vec<EmbeddingRecord> = chunks
                .iter()
                .zip(&embeddings)
                .map(|(chunk, embedding)| EmbeddingRecord {
                    chunk_id: chunk.id,
                    text: chunk.text.clone(),
                    embedding: embedding.clone(),
                })
                .collect();
            store.save_embeddings(&run_id, &records).await?;
        }

        tracing::info!("[Retrieval] Built corpus {} with {} chunks", run_id, chunks.len());
        Ok(Arc::new(CorpusIndex::new(run_id, chunks, embeddings)))
    }

    /// Reload a previously built corpus from the store.
    ///
    /// Chunks without a stored embedding are left out of the index.
    pub async fn load(&self, run_id: &str) -> Result<Arc<CorpusIndex>, AgentError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| AgentError::Retrieval("no corpus store configured".to_string()))?;

        let chunks = store.load_chunks(run_id).await?;
        let mut by_id: HashMap<usize, Vec<f32>> = store
            .load_embeddings(run_id)
            .await?
            .into_iter()
            .map(|r| (r.chunk_id, r.embedding))
            .collect();

        let total = chunks.len();
        let (chunks, embeddings): (Vec<Chunk>, Vec<Vec<f32>>) = chunks
            .into_iter()
            .filter_map(|chunk| by_id.remove(&chunk.id).map(|e| (chunk, e)))
            .unzip();

        if chunks.len() < total {
            tracing::warn!(
                "Corpus {}: {} of {} chunks have no embedding",
                run_id,
                total - chunks.len(),
                total
            );
        }

        Ok(Arc::new(CorpusIndex::new(run_id, chunks, embeddings)))
    }

    /// Find the chunk most similar to `query`.
    ///
    /// Returns `Ok(None)` for an empty index without calling the embedder.
    pub async fn find_best_chunk(
        &self,
        query: &str,
        index: &CorpusIndex,
    ) -> Result<Option<(Chunk, f64)>, AgentError> {
        if index.is_empty() {
            return Ok(None);
        }

        let query_embedding = self.ctx.embed(query).await?;
        let best = best_match(&query_embedding, index).map(|(chunk, score)| (chunk.clone(), score));

        if let Some((chunk, score)) = &best {
            tracing::debug!("[Retrieval] Best chunk {} (score={:.4})", chunk.id, score);
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::store::InMemoryCorpusStore;
    use crate::testing::{test_context, KeywordEmbedder, ScriptedLlm};

    fn engine(embedder: Arc<KeywordEmbedder>, chunk_size: usize) -> RetrievalEngine {
        let ctx = test_context(Arc::new(ScriptedLlm::constant("unused")), embedder);
        RetrievalEngine::new(
            ctx,
            ChunkingConfig {
                chunk_size,
                overlap: 0,
                break_char: '.',
            },
        )
    }

    const CORPUS: &str = "Cats purr softly. Dogs bark loudly. Birds sing early.";

    #[tokio::test]
    async fn finds_the_matching_chunk() {
        let embedder = Arc::new(KeywordEmbedder::new(&["cats", "dogs", "birds"]));
        let engine = engine(embedder.clone(), 20);

        let index = engine.build(CORPUS).await.unwrap();
        assert_eq!(index.len(), 3);
        let after_build = embedder.call_count();

        let (chunk, score) = engine
            .find_best_chunk("what do dogs do", &index)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(chunk.id, 1);
        assert!(chunk.text.contains("Dogs bark"));
        assert!((score - 1.0).abs() < 1e-9);
        // Only the query is embedded at search time
        assert_eq!(embedder.call_count(), after_build + 1);
    }

    #[test]
    fn ties_go_to_lowest_id() {
        let chunk = |id| Chunk {
            id,
            text: format!("chunk {}", id),
            size: 7,
            start_offset: 0,
            end_offset: 7,
        };
        let index = CorpusIndex::new(
            "run",
            vec![chunk(0), chunk(1), chunk(2)],
            vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![2.0, 0.0]],
        );

        let (best, _) = best_match(&[1.0, 0.0], &index).unwrap();
        assert_eq!(best.id, 1);
    }

    #[tokio::test]
    async fn empty_corpus_finds_nothing() {
        let embedder = Arc::new(KeywordEmbedder::new(&["x"]));
        let engine = engine(embedder.clone(), 20);

        let index = engine.build("   ").await.unwrap();
        let found = engine.find_best_chunk("anything", &index).await.unwrap();

        assert!(index.is_empty());
        assert!(found.is_none());
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn query_embedding_failure_is_an_error() {
        let embedder = Arc::new(KeywordEmbedder::new(&["cats"]).failing_on("broken query"));
        let engine = engine(embedder, 20);
        let index = engine.build(CORPUS).await.unwrap();

        let err = engine.find_best_chunk("broken query", &index).await.unwrap_err();
        assert!(matches!(err, AgentError::Embedding(_)));
    }

    #[tokio::test]
    async fn invalid_chunking_fails_the_build() {
        let embedder = Arc::new(KeywordEmbedder::new(&["x"]));
        let ctx = test_context(Arc::new(ScriptedLlm::constant("unused")), embedder);
        let engine = RetrievalEngine::new(
            ctx,
            ChunkingConfig {
                chunk_size: 10,
                overlap: 10,
                break_char: '\n',
            },
        );

        let err = engine.build("some text").await.unwrap_err();
        assert!(matches!(err, AgentError::Retrieval(_)));
    }

    #[tokio::test]
    async fn stored_corpus_can_be_reloaded() {
        let embedder = Arc::new(KeywordEmbedder::new(&["cats", "dogs", "birds"]));
        let store = Arc::new(InMemoryCorpusStore::new());
        let engine = engine(embedder, 20).with_store(store.clone());

        let built = engine.build(CORPUS).await.unwrap();
        let loaded = engine.load(&built.run_id).await.unwrap();

        assert_eq!(loaded.chunks(), built.chunks());
        let (chunk, _) = engine
            .find_best_chunk("birds", &loaded)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunk.id, 2);
    }

    #[tokio::test]
    async fn large_corpora_are_embedded_in_batches() {
        let embedder = Arc::new(KeywordEmbedder::new(&["cats", "dogs", "birds"]));
        let engine = engine(embedder.clone(), 20).with_embed_batch_size(2);

        let index = engine.build(CORPUS).await.unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(embedder.batch_sizes(), vec![2, 1]);
    }

    #[tokio::test]
    async fn load_without_store_is_an_error() {
        let engine = engine(Arc::new(KeywordEmbedder::new(&["x"])), 20);
        assert!(matches!(
            engine.load("whatever").await,
            Err(AgentError::Retrieval(_))
        ));
    }
}
