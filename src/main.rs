use std::sync::Arc;

use clap::Parser;
use quiz_session_engine::config::{Cli, Config};
use quiz_session_engine::gateway::{build_router, AppState};
use quiz_session_engine::{build_document_store, build_fast_store};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(Config::log_level(&cli)))
        .init();

    let config = Config::load(&cli)?;
    let bind_addr = config.bind_addr.clone();

    let fast_store = build_fast_store(&config).await?;
    let documents = build_document_store(&config).await?;

    let state = Arc::new(AppState::new(config, fast_store, documents));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "quiz session engine listening");
    axum::serve(listener, app).await?;

    Ok(())
}
