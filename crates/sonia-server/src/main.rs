use std::sync::Arc;

use anyhow::{Context, Result};
use sonia_config::AppConfig;
use sonia_llm::GeminiService;
use sonia_server::{build_router, ServerState};
use sonia_store::WellnessStore;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    if !config.gemini.is_configured() {
        warn!("GEMINI_API_KEY not set: analysis, transcription and voice calls will fail");
    }

    let store = WellnessStore::new(&config.database_path)
        .with_context(|| format!("failed to open database at {}", config.database_path))?;
    let model = GeminiService::new(config.gemini.clone()).context("failed to build Gemini client")?;

    let addr = config.bind_addr.clone();
    let state = Arc::new(ServerState::new(store, Arc::new(model), config));
    let app = build_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
