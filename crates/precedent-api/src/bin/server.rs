//! Precedent-RS API server binary.

use precedent_api::router;
use precedent_cache::MemoryCache;
use precedent_pipeline::{PipelineConfig, PipelineEngine};
use precedent_reasoner::{BedrockClient, ReasonerOrchestrator};
use precedent_retrieval::LexicalCaseLawProvider;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = PipelineConfig::from_env();
    let cache = Arc::new(MemoryCache::new());

    let api_key = std::env::var("LLM_REASONER_API_KEY").unwrap_or_default();
    let model = Arc::new(BedrockClient::new(config.reasoner.model_id.clone(), api_key));
    let reasoner = Arc::new(ReasonerOrchestrator::new(
        cache.clone(),
        model,
        config.reasoner.clone(),
    ));

    let provider_base = std::env::var("IK_BASE_URL")
        .unwrap_or_else(|_| "https://indiankanoon.org".to_string());
    let provider = Arc::new(LexicalCaseLawProvider::new(provider_base));

    let engine = Arc::new(PipelineEngine::new(config, cache, reasoner, provider));
    let app = router(engine);

    let host = std::env::var("PRECEDENT_API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PRECEDENT_API_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(3000);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!(%host, port, "precedent-api listening");
    axum::serve(listener, app).await?;
    Ok(())
}
