//! pagelore server binary.

use std::sync::Arc;

use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use pagelore::cache::IndexCache;
use pagelore::config::ServiceConfig;
use pagelore::fetch::HttpPageFetcher;
use pagelore::llm::{EmbeddingClient, GeminiClient, GeminiConfig, GenerationClient};
use pagelore::server;
use pagelore::service::PageService;
use pagelore::store::ArtifactStore;

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        "starting pagelore"
    );

    let store = ArtifactStore::open(&config.data_dir)?;
    let cache = IndexCache::new(store);

    let gemini = Arc::new(GeminiClient::new(GeminiConfig::with_api_key(
        config.api_key.clone(),
    )));
    let embedder: Arc<dyn EmbeddingClient> = gemini.clone();
    let generator: Arc<dyn GenerationClient> = gemini;
    let service = Arc::new(PageService::new(
        cache,
        Arc::new(HttpPageFetcher::new(config.fetch_timeout_secs)),
        embedder,
        generator,
        config.chunking,
        config.top_k,
    ));

    let app = server::router(service);
    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .into_diagnostic()?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}
