//! pagelore: a retrieval service for web pages.
//!
//! Given a URL, pagelore fetches the page, extracts its text, chunks it,
//! embeds the chunks, and builds a searchable vector index. Indexes are
//! content-addressed by the canonicalized URL, cached in memory, and persisted
//! to disk so a restart or cache reset never repeats the expensive fetch and
//! embedding work. On top of the cache sit two operations: `analyze` (build
//! the index and summarize the page) and `ask` (answer a question using the
//! most relevant chunks as context).
//!
//! The pipeline is synchronous; the HTTP layer in [`server`] bridges it onto
//! the async runtime with blocking tasks.

pub mod cache;
pub mod chunker;
pub mod config;
pub mod error;
pub mod fetch;
pub mod index;
pub mod llm;
pub mod model;
pub mod server;
pub mod service;
pub mod store;

pub use cache::{CacheEntry, IndexCache};
pub use chunker::{chunk_text, ChunkConfig};
pub use config::ServiceConfig;
pub use error::{PageloreError, PageloreResult};
pub use fetch::{HttpPageFetcher, PageFetcher};
pub use index::{SearchHit, VectorIndex};
pub use llm::{EmbeddingClient, GeminiClient, GeminiConfig, GenerationClient};
pub use model::{Chunk, Document};
pub use service::{AnalyzeReport, PageService};
pub use store::{Artifact, ArtifactStore, ContentKey};
