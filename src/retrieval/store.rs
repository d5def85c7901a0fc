//! Persistence for chunked corpora and their embeddings.
//!
//! A corpus is stored under a run id of the form `%Y%m%d_%H%M%S_<8 hex>`.
//! Chunks and embeddings are written separately so a build can be inspected
//! before embedding finishes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use super::chunk::Chunk;

/// A chunk as persisted.
pub type ChunkRecord = Chunk;

/// One chunk's embedding as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub chunk_id: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown run: {0}")]
    NotFound(String),

    #[error("Invalid run id: {0:?}")]
    InvalidRunId(String),

    #[error("Malformed record in {path} line {line}: {source}")]
    Malformed {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Generate a run id: local timestamp plus 8 random hex characters.
pub fn new_run_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    )
}

fn validate_run_id(run_id: &str) -> Result<(), StoreError> {
    let valid = !run_id.is_empty()
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidRunId(run_id.to_string()))
    }
}

/// Storage backend for corpus builds.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    async fn save_chunks(&self, run_id: &str, chunks: &[ChunkRecord]) -> Result<(), StoreError>;

    async fn save_embeddings(
        &self,
        run_id: &str,
        records: &[EmbeddingRecord],
    ) -> Result<(), StoreError>;

    async fn load_chunks(&self, run_id: &str) -> Result<Vec<ChunkRecord>, StoreError>;

    async fn load_embeddings(&self, run_id: &str) -> Result<Vec<EmbeddingRecord>, StoreError>;
}

/// Process-local store, used by tests and one-shot runs.
#[derive(Default)]
pub struct InMemoryCorpusStore {
    chunks: RwLock<HashMap<String, Vec<ChunkRecord>>>,
    embeddings: RwLock<HashMap<String, Vec<EmbeddingRecord>>>,
}

impl InMemoryCorpusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.chunks.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl CorpusStore for InMemoryCorpusStore {
    async fn save_chunks(&self, run_id: &str, chunks: &[ChunkRecord]) -> Result<(), StoreError> {
        validate_run_id(run_id)?;
        self.chunks
            .write()
            .await
            .insert(run_id.to_string(), chunks.to_vec());
        Ok(())
    }

    async fn save_embeddings(
        &self,
        run_id: &str,
        records: &[EmbeddingRecord],
    ) -> Result<(), StoreError> {
        validate_run_id(run_id)?;
        self.embeddings
            .write()
            .await
            .insert(run_id.to_string(), records.to_vec());
        Ok(())
    }

    async fn load_chunks(&self, run_id: &str) -> Result<Vec<ChunkRecord>, StoreError> {
        self.chunks
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(run_id.to_string()))
    }

    async fn load_embeddings(&self, run_id: &str) -> Result<Vec<EmbeddingRecord>, StoreError> {
        self.embeddings
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(run_id.to_string()))
    }
}

/// JSON-lines files in one directory:
/// `chunks-<run_id>.jsonl` and `embeddings-<run_id>.jsonl`.
pub struct JsonlCorpusStore {
    dir: PathBuf,
}

impl JsonlCorpusStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn chunks_path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("chunks-{}.jsonl", run_id))
    }

    fn embeddings_path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("embeddings-{}.jsonl", run_id))
    }

    async fn write_lines<T: Serialize>(&self, path: &Path, records: &[T]) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut body = String::new();
        for record in records {
            body.push_str(&serde_json::to_string(record)?);
            body.push('\n');
        }

        tokio::fs::write(path, body).await?;
        tracing::debug!("Wrote {} records to {}", records.len(), path.display());
        Ok(())
    }

    async fn read_lines<T: DeserializeOwned>(
        &self,
        run_id: &str,
        path: &Path,
    ) -> Result<Vec<T>, StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(run_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line).map_err(|source| StoreError::Malformed {
                    path: path.display().to_string(),
                    line: idx + 1,
                    source,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CorpusStore for JsonlCorpusStore {
    async fn save_chunks(&self, run_id: &str, chunks: &[ChunkRecord]) -> Result<(), StoreError> {
        validate_run_id(run_id)?;
        self.write_lines(&self.chunks_path(run_id), chunks).await
    }

    async fn save_embeddings(
        &self,
        run_id: &str,
        records: &[EmbeddingRecord],
    ) -> Result<(), StoreError> {
        validate_run_id(run_id)?;
        self.write_lines(&self.embeddings_path(run_id), records).await
    }

    async fn load_chunks(&self, run_id: &str) -> Result<Vec<ChunkRecord>, StoreError> {
        validate_run_id(run_id)?;
        self.read_lines(run_id, &self.chunks_path(run_id)).await
    }

    async fn load_embeddings(&self, run_id: &str) -> Result<Vec<EmbeddingRecord>, StoreError> {
        validate_run_id(run_id)?;
        self.read_lines(run_id, &self.embeddings_path(run_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunks() -> Vec<ChunkRecord> {
        vec![
            Chunk {
                id: 0,
                text: "alpha beta".to_string(),
                size: 10,
                start_offset: 0,
                end_offset: 10,
            },
            Chunk {
                id: 1,
                text: "beta gamma".to_string(),
                size: 10,
                start_offset: 6,
                end_offset: 16,
            },
        ]
    }

    #[test]
    fn run_id_format() {
        let id = new_run_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(new_run_id(), id);
    }

    #[tokio::test]
    async fn jsonl_store_persists_chunks_and_embeddings() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlCorpusStore::new(dir.path().join("corpus"));
        let run_id = new_run_id();
        let embeddings = vec![EmbeddingRecord {
            chunk_id: 0,
            text: "alpha beta".to_string(),
            embedding: vec![0.5, -0.25],
        }];

        store.save_chunks(&run_id, &sample_chunks()).await.unwrap();
        store.save_embeddings(&run_id, &embeddings).await.unwrap();

        assert!(dir
            .path()
            .join("corpus")
            .join(format!("chunks-{}.jsonl", run_id))
            .exists());
        assert_eq!(store.load_chunks(&run_id).await.unwrap(), sample_chunks());
        assert_eq!(store.load_embeddings(&run_id).await.unwrap(), embeddings);
    }

    #[tokio::test]
    async fn jsonl_store_reports_missing_and_malformed_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlCorpusStore::new(dir.path());

        assert!(matches!(
            store.load_chunks("20240101_000000_deadbeef").await,
            Err(StoreError::NotFound(_))
        ));

        std::fs::write(
            dir.path().join("chunks-broken.jsonl"),
            "{\"id\":0,\"text\":\"a\",\"size\":1,\"start_offset\":0,\"end_offset\":1}\nnot json\n",
        )
        .unwrap();
        match store.load_chunks("broken").await {
            Err(StoreError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn run_ids_cannot_escape_the_store_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlCorpusStore::new(dir.path());
        assert!(matches!(
            store.load_chunks("../etc/passwd").await,
            Err(StoreError::InvalidRunId(_))
        ));
    }

    #[tokio::test]
    async fn in_memory_store_round_trip() {
        let store = InMemoryCorpusStore::new();
        store.save_chunks("run_a", &sample_chunks()).await.unwrap();

        assert_eq!(store.load_chunks("run_a").await.unwrap().len(), 2);
        assert!(matches!(
            store.load_embeddings("run_a").await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.run_ids().await, vec!["run_a".to_string()]);
    }
}
