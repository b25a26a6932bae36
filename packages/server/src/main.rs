// Main entry point for the job discovery API server

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use discovery::ai::openai::OpenAiExtractorFactory;
use discovery::{DefaultSourceProvider, FsSnapshotStore, MemorySessionStore, Orchestrator};
use server_core::{build_app, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,discovery=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting job discovery API");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(snapshot_dir = %config.snapshot_dir, "Configuration loaded");

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(FsSnapshotStore::new(&config.snapshot_dir)),
        Arc::new(DefaultSourceProvider::new()),
        Arc::new(OpenAiExtractorFactory),
    ));

    let state = AppState {
        orchestrator,
        snapshot_dir: config.snapshot_dir.clone(),
    };
    let app = build_app(state, &config.allowed_origins);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Listening on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
