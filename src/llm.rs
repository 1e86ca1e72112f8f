//! Google Generative Language API client for embeddings and text generation.
//!
//! Both collaborators are remote, rate-limited, and potentially slow, so every
//! call goes through a fresh `ureq` agent with a bounded timeout. The service
//! core depends only on the [`EmbeddingClient`] and [`GenerationClient`]
//! traits; tests substitute deterministic in-process implementations.

use crate::error::{EmbeddingError, GenerationError};

/// Capability interface for the text-embedding collaborator.
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text into a fixed-length vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch of texts, one vector per input, in input order.
    ///
    /// The default implementation loops over [`EmbeddingClient::embed`];
    /// implementations with a batch endpoint should override it.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Capability interface for the text-generation collaborator.
pub trait GenerationClient: Send + Sync {
    /// Generate a completion for `prompt`, optionally steered by a system
    /// instruction. Returns the generated text verbatim.
    fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, GenerationError>;
}

/// Configuration for the Gemini REST client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL for the Generative Language API.
    pub base_url: String,
    /// API key passed as the `key` query parameter.
    pub api_key: String,
    /// Embedding model name.
    pub embed_model: String,
    /// Generation model name.
    pub chat_model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Defaults matching the hosted API; only the key is caller-supplied.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            api_key: api_key.into(),
            embed_model: "text-embedding-004".into(),
            chat_model: "gemini-1.5-pro".into(),
            timeout_secs: 60,
        }
    }
}

/// Client for the Google Generative Language REST API.
pub struct GeminiClient {
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self { config }
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build()
    }

    fn endpoint(&self, model: &str, verb: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.config.base_url, model, verb, self.config.api_key
        )
    }
}

impl EmbeddingClient for GeminiClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = self.endpoint(&self.config.embed_model, "embedContent");
        let body = serde_json::json!({
            "content": { "parts": [ { "text": text } ] },
        });

        let response = self
            .agent()
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e| EmbeddingError::RequestFailed {
                message: redact_key(&e.to_string(), &self.config.api_key),
            })?;

        let json: serde_json::Value = response
            .into_json()
            .map_err(|e| EmbeddingError::ParseError {
                message: e.to_string(),
            })?;

        parse_embedding(&json["embedding"])
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint(&self.config.embed_model, "batchEmbedContents");
        let model_path = format!("models/{}", self.config.embed_model);
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|t| {
                serde_json::json!({
                    "model": model_path,
                    "content": { "parts": [ { "text": t } ] },
                })
            })
            .collect();
        let body = serde_json::json!({ "requests": requests });

        let response = self
            .agent()
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e| EmbeddingError::RequestFailed {
                message: redact_key(&e.to_string(), &self.config.api_key),
            })?;

        let json: serde_json::Value = response
            .into_json()
            .map_err(|e| EmbeddingError::ParseError {
                message: e.to_string(),
            })?;

        let embeddings = json["embeddings"]
            .as_array()
            .ok_or_else(|| EmbeddingError::ParseError {
                message: "missing 'embeddings' field".into(),
            })?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::BatchMismatch {
                sent: texts.len(),
                received: embeddings.len(),
            });
        }

        embeddings.iter().map(parse_embedding).collect()
    }
}

impl GenerationClient for GeminiClient {
    fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, GenerationError> {
        let url = self.endpoint(&self.config.chat_model, "generateContent");

        let mut body = serde_json::json!({
            "contents": [ { "parts": [ { "text": prompt } ] } ],
            "generationConfig": { "temperature": 0 },
        });
        if let Some(sys) = system {
            body["systemInstruction"] = serde_json::json!({ "parts": [ { "text": sys } ] });
        }

        let response = self
            .agent()
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e| GenerationError::RequestFailed {
                message: redact_key(&e.to_string(), &self.config.api_key),
            })?;

        let json: serde_json::Value = response
            .into_json()
            .map_err(|e| GenerationError::ParseError {
                message: e.to_string(),
            })?;

        json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| GenerationError::ParseError {
                message: "no candidate text in response".into(),
            })
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.config.base_url)
            .field("embed_model", &self.config.embed_model)
            .field("chat_model", &self.config.chat_model)
            .finish()
    }
}

fn parse_embedding(value: &serde_json::Value) -> Result<Vec<f32>, EmbeddingError> {
    let values = value["values"]
        .as_array()
        .ok_or_else(|| EmbeddingError::ParseError {
            message: "missing 'values' field in embedding".into(),
        })?;
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| EmbeddingError::ParseError {
                    message: "non-numeric embedding component".into(),
                })
        })
        .collect()
}

/// Keep the API key out of error messages; ureq includes the full URL in
/// transport errors.
fn redact_key(message: &str, key: &str) -> String {
    if key.is_empty() {
        message.to_string()
    } else {
        message.replace(key, "<redacted>")
    }
}
