//! Core data types shared across the retrieval pipeline.
//!
//! A fetched page becomes a [`Document`], the chunker slices it into
//! [`Chunk`]s, and the index binds each chunk to its embedding vector.

use serde::{Deserialize, Serialize};

/// Raw fetched content for a URL.
///
/// Owned transiently by the cold-build path; once chunks are produced only the
/// text survives, carried along for summarization.
#[derive(Debug, Clone)]
pub struct Document {
    /// The URL the content was fetched from, as given by the caller.
    pub url: String,
    /// Extracted plain text of the page.
    pub text: String,
    /// Seconds since UNIX epoch when the fetch completed.
    pub fetched_at: u64,
}

impl Document {
    /// Create a document stamped with the current time.
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        let fetched_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            url: url.into(),
            text: text.into(),
            fetched_at,
        }
    }
}

/// A bounded span of document text, immutable once created.
///
/// `start` and `end` are character offsets into the source document text
/// (`[start, end)`), recorded so chunk boundaries stay auditable after the
/// document itself is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Sequential index within the document.
    pub index: usize,
    /// The text content of this chunk.
    pub text: String,
    /// Character offset of the first character (inclusive).
    pub start: usize,
    /// Character offset past the last character (exclusive).
    pub end: usize,
}
