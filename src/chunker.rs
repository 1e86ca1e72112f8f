//! Deterministic sliding-window chunker.
//!
//! Splits document text into overlapping fixed-size character windows for
//! embedding and retrieval. Identical input and parameters always yield
//! identical chunk boundaries.

use crate::model::Chunk;

/// Configuration for the sliding-window chunker.
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    /// Target characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkConfig {
    /// Whether the configuration produces a forward-moving window.
    ///
    /// The overlap must be strictly smaller than the chunk size, otherwise the
    /// window never advances.
    pub fn is_valid(&self) -> bool {
        self.chunk_size > 0 && self.overlap < self.chunk_size
    }

    /// Characters the window advances between chunks.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Split `text` into overlapping chunks.
///
/// Each chunk after the first starts at `previous_start + (chunk_size - overlap)`;
/// the final chunk may be shorter. Offsets are character-based so multi-byte
/// text never splits inside a code point. Empty input yields an empty sequence
/// rather than an error, keeping downstream stages idempotent.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<Chunk> {
    debug_assert!(config.is_valid(), "chunk config must be validated upstream");

    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let stride = config.stride();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    loop {
        let end = (start + config.chunk_size).min(total);
        chunks.push(Chunk {
            index,
            text: chars[start..end].iter().collect(),
            start,
            end,
        });
        if end == total {
            break;
        }
        start += stride;
        index += 1;
    }

    chunks
}
