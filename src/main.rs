mod app;
mod config;
mod error;
mod handlers;
mod models;
mod multipart;
mod store;

use crate::app::{create_app, AppState};
use crate::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let address = config.server_address();
    let state = AppState::init(config).await?;
    tracing::info!(
        "Products stored in {}, uploads in {}",
        state.store.path().display(),
        state.config.uploads_dir.display()
    );

    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Asset store running at http://{}", address);
    tracing::info!("Press Ctrl+C to stop the server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped successfully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
