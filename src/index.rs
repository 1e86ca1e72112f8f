//! In-memory nearest-neighbor index over embedded chunks.
//!
//! The index is an ordered collection of (chunk, embedding) pairs queried with
//! an exact cosine-similarity scan. Indexes cover a single web page, so a
//! brute-force scan beats an ANN structure here: results are exact, fully
//! deterministic (ties break toward the lower chunk index), and the whole
//! structure round-trips through `bincode` without loss.

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, StoreError};
use crate::model::Chunk;

/// A single search result: the matching chunk and its similarity score.
#[derive(Debug, Clone)]
pub struct SearchHit<'a> {
    /// The matching chunk.
    pub chunk: &'a Chunk,
    /// Cosine similarity in `[-1, 1]`; zero-norm vectors score 0.
    pub similarity: f32,
}

/// Immutable searchable structure over embedded chunks.
///
/// Invariant: `chunks.len() == embeddings.len()`, enforced at build time, so
/// every query result references an existing chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build an index from parallel chunk and embedding sequences.
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::LengthMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        Ok(Self { chunks, embeddings })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The indexed chunks in document order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Return the `k` chunks nearest to `query`, nearest-first.
    ///
    /// Ties break toward the lower chunk index for determinism. If `k` exceeds
    /// the chunk count, all chunks are returned.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit<'_>>, IndexError> {
        if let Some(first) = self.embeddings.first() {
            if first.len() != query.len() {
                return Err(IndexError::DimensionMismatch {
                    expected: first.len(),
                    actual: query.len(),
                });
            }
        }

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, emb)| (i, cosine_similarity(query, emb)))
            .collect();

        // Descending similarity, ascending chunk index on ties. Scores are
        // finite by construction (zero norms map to 0), so total_cmp is exact.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, similarity)| SearchHit {
                chunk: &self.chunks[i],
                similarity,
            })
            .collect())
    }

    /// Serialize the index to a durable byte form.
    pub fn serialize(&self) -> Result<Vec<u8>, StoreError> {
        bincode::serialize(self).map_err(|e| StoreError::Serialize {
            message: e.to_string(),
        })
    }

    /// Reconstruct an index from its serialized form.
    ///
    /// A deserialized index returns identical search results to the original
    /// for any query and `k`.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, StoreError> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Corrupt {
            key: "(standalone index)".into(),
            message: e.to_string(),
        })
    }
}

/// Cosine similarity between two vectors; 0 when either norm is zero.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.into(),
            start: index * 10,
            end: index * 10 + text.len(),
        }
    }

    fn test_index() -> VectorIndex {
        VectorIndex::build(
            vec![chunk(0, "north"), chunk(1, "east"), chunk(2, "northeast")],
            vec![
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![0.7071, 0.7071],
            ],
        )
        .unwrap()
    }

    #[test]
    fn build_rejects_length_mismatch() {
        let result = VectorIndex::build(vec![chunk(0, "a")], vec![]);
        assert!(matches!(result, Err(IndexError::LengthMismatch { .. })));
    }

    #[test]
    fn search_returns_nearest_first() {
        let index = test_index();
        let hits = index.search(&[1.0, 0.1], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "north");
        assert_eq!(hits[1].chunk.text, "northeast");
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[test]
    fn k_larger_than_index_returns_all() {
        let index = test_index();
        let hits = index.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn ties_break_toward_lower_chunk_index() {
        let index = VectorIndex::build(
            vec![chunk(0, "first"), chunk(1, "second")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0]],
        )
        .unwrap();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].chunk.index, 0);
        assert_eq!(hits[1].chunk.index, 1);
    }

    #[test]
    fn zero_norm_query_scores_zero() {
        let index = test_index();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert!(hits.iter().all(|h| h.similarity == 0.0));
        // Tie-break keeps document order.
        assert_eq!(hits[0].chunk.index, 0);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let index = test_index();
        let result = index.search(&[1.0, 0.0, 0.0], 1);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn serialized_index_searches_identically() {
        let index = test_index();
        let bytes = index.serialize().unwrap();
        let restored = VectorIndex::deserialize(&bytes).unwrap();

        for query in [[1.0, 0.0], [0.3, 0.9], [0.7, 0.7]] {
            for k in 1..=4 {
                let original = index.search(&query, k).unwrap();
                let reloaded = restored.search(&query, k).unwrap();
                assert_eq!(original.len(), reloaded.len());
                for (a, b) in original.iter().zip(reloaded.iter()) {
                    assert_eq!(a.chunk, b.chunk);
                    assert_eq!(a.similarity, b.similarity);
                }
            }
        }
    }

    #[test]
    fn deserialize_garbage_is_corrupt() {
        let result = VectorIndex::deserialize(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }
}
