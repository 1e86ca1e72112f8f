//! Service configuration loaded from the environment.

use std::path::PathBuf;

use crate::chunker::ChunkConfig;
use crate::error::ConfigError;

/// Runtime configuration for the pagelore service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Directory for durable index artifacts.
    pub data_dir: PathBuf,
    /// API key for the embedding and generation backend.
    pub api_key: String,
    /// Chunking parameters.
    pub chunking: ChunkConfig,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Page fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// `GEMINI_API_KEY` is required; everything else has a default.
    /// `PAGELORE_BIND` (default `0.0.0.0`), `PAGELORE_PORT` (default `5000`),
    /// `PAGELORE_DATA_DIR` (default `./pagelore_store`),
    /// `PAGELORE_CHUNK_SIZE` / `PAGELORE_CHUNK_OVERLAP` (1000 / 200),
    /// `PAGELORE_TOP_K` (4), `PAGELORE_FETCH_TIMEOUT` (15 seconds).
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| ConfigError::MissingEnv {
            name: "GEMINI_API_KEY".into(),
        })?;

        let bind_addr = env_or("PAGELORE_BIND", "0.0.0.0");
        let port = parse_env("PAGELORE_PORT", 5000u16)?;
        let data_dir = PathBuf::from(env_or("PAGELORE_DATA_DIR", "./pagelore_store"));

        let chunking = ChunkConfig {
            chunk_size: parse_env("PAGELORE_CHUNK_SIZE", 1000usize)?,
            overlap: parse_env("PAGELORE_CHUNK_OVERLAP", 200usize)?,
        };
        let top_k = parse_env("PAGELORE_TOP_K", 4usize)?;
        let fetch_timeout_secs = parse_env("PAGELORE_FETCH_TIMEOUT", 15u64)?;

        let config = Self {
            bind_addr,
            port,
            data_dir,
            api_key,
            chunking,
            top_k,
            fetch_timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.chunking.is_valid() {
            return Err(ConfigError::Invalid {
                message: format!(
                    "chunk overlap ({}) must be smaller than chunk size ({})",
                    self.chunking.overlap, self.chunking.chunk_size
                ),
            });
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid {
                message: "top_k must be at least 1".into(),
            });
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "API key is empty".into(),
            });
        }
        Ok(())
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
            message: format!("{name}={raw}: {e}"),
        }),
        Err(_) => Ok(default),
    }
}
