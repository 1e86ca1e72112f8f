//! Page fetching: retrieve a URL and extract its readable text.
//!
//! Uses `ureq` for synchronous HTTP requests with a timeout and a maximum
//! response size, and `scraper` (servo's html5ever) to strip markup, scripts,
//! and styles down to plain text.

use scraper::{Html, Selector};

use crate::error::FetchError;
use crate::model::Document;

/// Maximum response body size (2 MB). Larger pages are truncated.
const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024;

/// Capability interface for the web-content collaborator.
///
/// The cold-build path depends only on this trait, so tests substitute a
/// deterministic fetcher and count invocations.
pub trait PageFetcher: Send + Sync {
    /// Fetch the page behind `url` and return its extracted text.
    fn fetch(&self, url: &str) -> Result<Document, FetchError>;
}

/// HTTP fetcher backed by `ureq` with HTML text extraction.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    /// Request timeout in seconds.
    timeout_secs: u64,
}

impl HttpPageFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

impl Default for HttpPageFetcher {
    fn default() -> Self {
        Self::new(15)
    }
}

impl PageFetcher for HttpPageFetcher {
    fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
                message: "must start with http:// or https://".into(),
            });
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build();

        let response = match agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(FetchError::HttpStatus {
                    url: url.to_string(),
                    status: code,
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    message: transport.to_string(),
                });
            }
        };

        let mut body = response.into_string().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: format!("failed to read body: {e}"),
        })?;

        if body.len() > MAX_RESPONSE_SIZE {
            let mut cut = MAX_RESPONSE_SIZE;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            tracing::warn!(url, limit = MAX_RESPONSE_SIZE, "response truncated");
        }

        let text = extract_text(&body);
        if text.is_empty() {
            return Err(FetchError::EmptyDocument {
                url: url.to_string(),
            });
        }

        tracing::debug!(url, bytes = text.len(), "fetched page text");
        Ok(Document::new(url, text))
    }
}

/// Extract readable text from an HTML body.
///
/// Scripts, styles, and other non-content elements are dropped; the remaining
/// text nodes are joined with newlines and blank lines collapsed. Non-HTML
/// input passes through `Html::parse_document` unharmed and comes back as its
/// own text.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let skip =
        Selector::parse("script, style, noscript, head").expect("static selector must parse");
    let skipped: std::collections::HashSet<_> = document
        .select(&skip)
        .flat_map(|el| el.descendants().map(|n| n.id()))
        .collect();

    let mut lines: Vec<String> = Vec::new();
    for node in document.root_element().descendants() {
        if skipped.contains(&node.id()) {
            continue;
        }
        if let Some(text) = node.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
    }

    lines.join("\n")
}
