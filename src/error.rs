//! Rich diagnostic error types for the pagelore service.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so operators know exactly
//! what went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the pagelore service.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum PageloreError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Fetch errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("invalid URL \"{url}\": {message}")]
    #[diagnostic(
        code(pagelore::fetch::invalid_url),
        help("URLs must be absolute and start with http:// or https://.")
    )]
    InvalidUrl { url: String, message: String },

    #[error("HTTP error {status} fetching \"{url}\"")]
    #[diagnostic(
        code(pagelore::fetch::http_status),
        help(
            "The server responded with a non-success status. \
             Check that the page exists and is publicly reachable."
        )
    )]
    HttpStatus { url: String, status: u16 },

    #[error("transport error fetching \"{url}\": {message}")]
    #[diagnostic(
        code(pagelore::fetch::transport),
        help(
            "The request could not complete. Check network connectivity and DNS. \
             Timeouts are retryable — the failed attempt is not cached."
        )
    )]
    Transport { url: String, message: String },

    #[error("empty document: no text extracted from \"{url}\"")]
    #[diagnostic(
        code(pagelore::fetch::empty_document),
        help(
            "The page body contained no extractable text. The page may be \
             script-rendered or behind an interstitial."
        )
    )]
    EmptyDocument { url: String },
}

// ---------------------------------------------------------------------------
// Embedding / generation collaborator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EmbeddingError {
    #[error("embedding request failed: {message}")]
    #[diagnostic(
        code(pagelore::embed::request_failed),
        help(
            "The embedding API call failed or timed out. The failure is surfaced \
             to the caller and never poisons the cache; the next request for the \
             same URL rebuilds from scratch."
        )
    )]
    RequestFailed { message: String },

    #[error("failed to parse embedding response: {message}")]
    #[diagnostic(
        code(pagelore::embed::parse_error),
        help("The embedding API returned an unexpected response shape.")
    )]
    ParseError { message: String },

    #[error("embedding batch mismatch: sent {sent} texts, received {received} vectors")]
    #[diagnostic(
        code(pagelore::embed::batch_mismatch),
        help("The API returned a different number of embeddings than requested.")
    )]
    BatchMismatch { sent: usize, received: usize },
}

#[derive(Debug, Error, Diagnostic)]
pub enum GenerationError {
    #[error("generation request failed: {message}")]
    #[diagnostic(
        code(pagelore::generate::request_failed),
        help(
            "The text-generation API call failed or timed out. \
             Check the API key and model name, then retry."
        )
    )]
    RequestFailed { message: String },

    #[error("failed to parse generation response: {message}")]
    #[diagnostic(
        code(pagelore::generate::parse_error),
        help("The generation API returned a response with no candidate text.")
    )]
    ParseError { message: String },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(pagelore::store::io),
        help(
            "A filesystem operation failed. Check that the storage root exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt artifact for key {key}: {message}")]
    #[diagnostic(
        code(pagelore::store::corrupt),
        help(
            "The durable artifact could not be deserialized. It is treated as \
             absent and the index is rebuilt from the source page."
        )
    )]
    Corrupt { key: String, message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(pagelore::store::serialize),
        help("Failed to encode the index artifact for durable storage.")
    )]
    Serialize { message: String },
}

// ---------------------------------------------------------------------------
// Index errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IndexError {
    #[error("length mismatch: {chunks} chunks but {embeddings} embeddings")]
    #[diagnostic(
        code(pagelore::index::length_mismatch),
        help(
            "Every chunk must have exactly one embedding. This indicates a bug \
             in the build pipeline, not bad input."
        )
    )]
    LengthMismatch { chunks: usize, embeddings: usize },

    #[error("dimension mismatch: index built with {expected}, query has {actual}")]
    #[diagnostic(
        code(pagelore::index::dim_mismatch),
        help(
            "The query embedding must come from the same model as the index \
             embeddings. Check the embedding model configuration."
        )
    )]
    DimensionMismatch { expected: usize, actual: usize },
}

// ---------------------------------------------------------------------------
// Cache errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CacheError {
    #[error("build failed for \"{url}\": {message}")]
    #[diagnostic(
        code(pagelore::cache::build_failed),
        help(
            "An in-flight build for this URL failed; all callers waiting on it \
             receive this error. The key returns to Absent, so the next request \
             retries from scratch."
        )
    )]
    BuildFailed { url: String, message: String },

    #[error("no document text available for \"{url}\"")]
    #[diagnostic(
        code(pagelore::cache::summary_source_missing),
        help(
            "Summaries need the full page text, and this entry's durable artifact \
             was written without it. Reset the cache and re-analyze the URL."
        )
    )]
    SummarySourceMissing { url: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(pagelore::config::invalid),
        help("Check the service environment variables. {message}")
    )]
    Invalid { message: String },

    #[error("missing required environment variable {name}")]
    #[diagnostic(
        code(pagelore::config::missing_env),
        help("Set {name} in the environment before starting the service.")
    )]
    MissingEnv { name: String },
}

/// Convenience alias for functions returning pagelore results.
pub type PageloreResult<T> = std::result::Result<T, PageloreError>;
