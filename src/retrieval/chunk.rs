//! Corpus chunking with overlap and preferred break characters.
//!
//! # Algorithm
//! 1. Collapse every whitespace run into one space and trim (lossy).
//! 2. Slide a window of `chunk_size` characters over the normalized text.
//! 3. If the break character occurs in the window, end the chunk just after
//!    its last occurrence.
//! 4. The next window starts `overlap` characters before the previous end.
//!
//! Offsets count characters (not bytes) of the normalized text. Because
//! whitespace is normalized first, a whitespace break character such as the
//! default `'\n'` never matches; only visible separators like `'.'` shift
//! chunk ends.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// A contiguous window of the normalized corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based, contiguous in corpus order
    pub id: usize,
    pub text: String,
    /// Length in characters
    pub size: usize,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Collapse whitespace runs into single spaces and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reject settings that could not make progress through a corpus.
pub fn validate_chunking(config: &ChunkingConfig) -> Result<(), ChunkError> {
    if config.chunk_size == 0 {
        return Err(ChunkError::ZeroChunkSize);
    }
    if config.overlap >= config.chunk_size {
        return Err(ChunkError::OverlapTooLarge {
            chunk_size: config.chunk_size,
            overlap: config.overlap,
        });
    }
    Ok(())
}

/// Split `corpus` into overlapping chunks.
///
/// An empty (or whitespace-only) corpus yields no chunks.
pub fn chunk_text(corpus: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>, ChunkError> {
    validate_chunking(config)?;

    let normalized = normalize_whitespace(corpus);
    let chars: Vec<char> = normalized.chars().collect();
    let len = chars.len();

    if len == 0 {
        return Ok(Vec::new());
    }

    if len <= config.chunk_size {
        return Ok(vec![Chunk {
            id: 0,
            text: normalized,
            size: len,
            start_offset: 0,
            end_offset: len,
        }]);
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = (start + config.chunk_size).min(len);
        let mut end = hard_end;

        if let Some(pos) = chars[start..hard_end]
            .iter()
            .rposition(|&c| c == config.break_char)
        {
            let trimmed = start + pos + 1;
            // Trimming must still leave room to advance past the overlap
            if trimmed > start + config.overlap {
                end = trimmed;
            }
        }

        chunks.push(Chunk {
            id: chunks.len(),
            text: chars[start..end].iter().collect(),
            size: end - start,
            start_offset: start,
            end_offset: end,
        });

        if end >= len {
            break;
        }
        start = end - config.overlap;
    }

    tracing::debug!(
        "Chunked {} chars into {} chunks (size={}, overlap={})",
        len,
        chunks.len(),
        config.chunk_size,
        config.overlap
    );

    Ok(chunks)
}

/// [`chunk_text`] with the default break character.
pub fn chunk(corpus: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>, ChunkError> {
    chunk_text(
        corpus,
        &ChunkingConfig {
            chunk_size,
            overlap,
            ..ChunkingConfig::default()
        },
    )
}

/// [`chunk`] with the default size and overlap.
pub fn chunk_default(corpus: &str) -> Result<Vec<Chunk>, ChunkError> {
    chunk(corpus, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
}
