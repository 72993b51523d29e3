use std::time::Duration;

use anyhow::Context;
use fileshare_api::{app, config, services::spawn_purge_task, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config().clone();
    info!("Starting Fileshare API in {:?} mode", config.environment);

    let port = config.server.port;
    let sweep = config.sweep.clone();
    let state = AppState::from_config(config).await?;

    if sweep.enabled {
        spawn_purge_task(state.store.clone(), state.blobs.clone(), Duration::from_secs(sweep.interval_secs.max(1)));
    }

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Fileshare API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server")?;
    Ok(())
}
