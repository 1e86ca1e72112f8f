//! Request orchestration: analyze and ask, on top of the cache.
//!
//! The service wires the fetch, chunk, embed, and index stages into the cold
//! build path, and the retrieve and generate stages into the question path.
//! All collaborator access goes through the trait objects, so the whole
//! pipeline runs against in-process fakes in tests.

use std::sync::Arc;

use crate::cache::{CacheEntry, IndexCache};
use crate::chunker::{chunk_text, ChunkConfig};
use crate::error::{CacheError, PageloreResult};
use crate::fetch::PageFetcher;
use crate::index::VectorIndex;
use crate::llm::{EmbeddingClient, GenerationClient};
use crate::store::Artifact;

/// Upper bound on retrieved context passed to the generation model.
const MAX_CONTEXT_CHARS: usize = 6000;

/// Upper bound on document text passed to summarization.
const MAX_SUMMARY_SOURCE_CHARS: usize = 15_000;

/// Result of analyzing a page.
#[derive(Debug, Clone)]
pub struct AnalyzeReport {
    /// Generated summary of the page.
    pub summary: String,
    /// Number of chunks in the page's index.
    pub num_chunks: usize,
}

/// Orchestrates page analysis and question answering over the index cache.
pub struct PageService {
    cache: IndexCache,
    fetcher: Arc<dyn PageFetcher>,
    embedder: Arc<dyn EmbeddingClient>,
    generator: Arc<dyn GenerationClient>,
    chunking: ChunkConfig,
    top_k: usize,
}

impl PageService {
    pub fn new(
        cache: IndexCache,
        fetcher: Arc<dyn PageFetcher>,
        embedder: Arc<dyn EmbeddingClient>,
        generator: Arc<dyn GenerationClient>,
        chunking: ChunkConfig,
        top_k: usize,
    ) -> Self {
        Self {
            cache,
            fetcher,
            embedder,
            generator,
            chunking,
            top_k,
        }
    }

    /// The underlying cache, for status reporting.
    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    /// Drop all in-memory cache entries; durable artifacts survive.
    pub fn reset_cache(&self) -> usize {
        self.cache.reset()
    }

    /// Analyze a page: ensure its index exists, then summarize it.
    ///
    /// A repeat analyze of a cached URL regenerates the summary but never
    /// refetches or re-embeds the page.
    pub fn analyze(&self, url: &str) -> PageloreResult<AnalyzeReport> {
        let entry = self.entry_for(url)?;

        let text = entry.document_text.as_deref().ok_or_else(|| {
            CacheError::SummarySourceMissing {
                url: url.to_string(),
            }
        })?;
        let source = truncate_chars(text, MAX_SUMMARY_SOURCE_CHARS);

        let prompt = format!(
            "Summarize the following web page content in a few concise \
             paragraphs. Cover the main topic and key points.\n\n{source}"
        );
        let summary = self.generator.generate(&prompt, None)?;

        Ok(AnalyzeReport {
            summary,
            num_chunks: entry.index.len(),
        })
    }

    /// Answer a question about a page using retrieved chunks as context.
    pub fn ask(&self, url: &str, question: &str) -> PageloreResult<String> {
        let entry = self.entry_for(url)?;

        let query = self.embedder.embed(question)?;
        let hits = entry.index.search(&query, self.top_k)?;

        let mut context = String::new();
        for hit in &hits {
            let remaining = MAX_CONTEXT_CHARS.saturating_sub(context.chars().count());
            if remaining == 0 {
                break;
            }
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&truncate_chars(&hit.chunk.text, remaining));
        }

        let prompt = format!(
            "Answer the question using only the context below. If the context \
             does not contain the answer, say that the page does not cover it.\
             \n\nContext:\n{context}\n\nQuestion: {question}"
        );
        let answer = self.generator.generate(&prompt, None)?;
        Ok(answer)
    }

    fn entry_for(&self, url: &str) -> PageloreResult<Arc<CacheEntry>> {
        self.cache.get_or_build(url, || self.build_artifact(url))
    }

    /// Cold build: fetch, chunk, embed, index.
    fn build_artifact(&self, url: &str) -> PageloreResult<Artifact> {
        let document = self.fetcher.fetch(url)?;
        let chunks = chunk_text(&document.text, &self.chunking);
        tracing::debug!(url, chunks = chunks.len(), "chunked page");

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;

        let index = VectorIndex::build(chunks, embeddings)?;
        Ok(Artifact {
            index,
            document_text: Some(document.text),
        })
    }
}

impl std::fmt::Debug for PageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageService")
            .field("cache", &self.cache)
            .field("chunking", &self.chunking)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

/// Truncate to at most `limit` characters, never splitting a code point.
fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, FetchError, GenerationError, PageloreError};
    use crate::model::Document;
    use crate::store::ArtifactStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FakeFetcher {
        text: String,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(text: &str) -> Self {
            Self {
                text: text.into(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PageFetcher for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<Document, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Document::new(url, self.text.clone()))
        }
    }

    struct FakeEmbedder {
        calls: AtomicUsize,
    }

    impl FakeEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl EmbeddingClient for FakeEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Deterministic 3-dim vector from simple text statistics.
            let len = text.chars().count() as f32;
            let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count() as f32;
            Ok(vec![len, vowels, 1.0])
        }
    }

    struct EchoGenerator;

    impl GenerationClient for EchoGenerator {
        fn generate(&self, prompt: &str, _system: Option<&str>) -> Result<String, GenerationError> {
            Ok(format!("generated from {} chars", prompt.chars().count()))
        }
    }

    fn service_with(
        fetcher: Arc<FakeFetcher>,
        embedder: Arc<FakeEmbedder>,
        dir: &TempDir,
    ) -> PageService {
        PageService::new(
            IndexCache::new(ArtifactStore::open(dir.path()).unwrap()),
            fetcher,
            embedder,
            Arc::new(EchoGenerator),
            ChunkConfig {
                chunk_size: 50,
                overlap: 10,
            },
            4,
        )
    }

    #[test]
    fn analyze_reports_chunk_count() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new(&"word ".repeat(30)));
        let embedder = Arc::new(FakeEmbedder::new());
        let service = service_with(Arc::clone(&fetcher), Arc::clone(&embedder), &dir);

        let report = service.analyze("https://example.com/page").unwrap();
        assert!(report.num_chunks > 1);
        assert!(report.summary.starts_with("generated from"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeat_analyze_skips_fetch_and_embed() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new("some page text about birds"));
        let embedder = Arc::new(FakeEmbedder::new());
        let service = service_with(Arc::clone(&fetcher), Arc::clone(&embedder), &dir);

        service.analyze("https://example.com/page").unwrap();
        let embeds_after_first = embedder.calls.load(Ordering::SeqCst);

        service.analyze("https://example.com/page").unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), embeds_after_first);
    }

    #[test]
    fn ask_embeds_question_but_not_chunks_on_cache_hit() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new("the sky is blue and wide"));
        let embedder = Arc::new(FakeEmbedder::new());
        let service = service_with(Arc::clone(&fetcher), Arc::clone(&embedder), &dir);

        service.analyze("https://example.com/page").unwrap();
        let embeds_after_build = embedder.calls.load(Ordering::SeqCst);

        let answer = service
            .ask("https://example.com/page", "what color is the sky?")
            .unwrap();
        assert!(answer.starts_with("generated from"));
        // Exactly one additional embed call, for the question.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), embeds_after_build + 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ask_on_uncached_url_builds_first() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new("content to index"));
        let embedder = Arc::new(FakeEmbedder::new());
        let service = service_with(Arc::clone(&fetcher), Arc::clone(&embedder), &dir);

        service
            .ask("https://example.com/fresh", "anything?")
            .unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_then_ask_rehydrates_without_refetch() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new("persisted page content"));
        let embedder = Arc::new(FakeEmbedder::new());
        let service = service_with(Arc::clone(&fetcher), Arc::clone(&embedder), &dir);

        service.analyze("https://example.com/page").unwrap();
        assert_eq!(service.reset_cache(), 1);

        let embeds_before = embedder.calls.load(Ordering::SeqCst);
        service
            .ask("https://example.com/page", "still there?")
            .unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        // Only the question embed, no chunk re-embedding.
        assert_eq!(embedder.calls.load(Ordering::SeqCst), embeds_before + 1);
    }

    #[test]
    fn summary_without_document_text_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let key = crate::store::ContentKey::for_url("https://example.com/old");

        // Simulate an artifact written without document text.
        let chunks = vec![crate::model::Chunk {
            index: 0,
            text: "old chunk".into(),
            start: 0,
            end: 9,
        }];
        store
            .store(
                &key,
                &Artifact {
                    index: VectorIndex::build(chunks, vec![vec![1.0, 0.0, 0.0]]).unwrap(),
                    document_text: None,
                },
            )
            .unwrap();

        let fetcher = Arc::new(FakeFetcher::new("unused"));
        let embedder = Arc::new(FakeEmbedder::new());
        let service = PageService::new(
            IndexCache::new(store),
            fetcher.clone(),
            embedder.clone(),
            Arc::new(EchoGenerator),
            ChunkConfig::default(),
            4,
        );

        let result = service.analyze("https://example.com/old");
        assert!(matches!(
            result,
            Err(PageloreError::Cache(CacheError::SummarySourceMissing { .. }))
        ));
        // The artifact still answers questions.
        assert!(service.ask("https://example.com/old", "q?").is_ok());
    }
}
