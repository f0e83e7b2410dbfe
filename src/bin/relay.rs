//! Radio Relay Application
//!
//! Streams the configured source to every listener connected on `/stream`.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use radio_relay::{
    assets::FileStreamProvider,
    broadcast::ClientStreamRegistry,
    config::AppConfig,
    error::SessionError,
    stream::{BitrateProbe, StreamingSession},
    ui::{AppState, WebServer},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Radio Relay");

    // Optional config path as the first argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load_or_default(config_path.as_deref())?;

    tracing::info!(public_dir = %config.assets.public_dir.display(), "Serving assets");

    let registry = Arc::new(ClientStreamRegistry::new());
    let assets = FileStreamProvider::new(config.assets.public_dir.clone());
    let probe = BitrateProbe::new(&config.probe);
    let session = Arc::new(StreamingSession::new(
        &config.stream,
        probe,
        assets.clone(),
        registry.clone(),
    ));

    if config.stream.auto_start {
        // The server still comes up idle if the default source is unusable
        if let Err(e) = session.start(&config.stream.default_source).await {
            tracing::warn!("Default source not started: {}", e);
        }
    }

    let web_server = WebServer::new(
        config.server.clone(),
        AppState {
            session: session.clone(),
            registry: registry.clone(),
            assets,
            pages: config.assets.clone(),
            default_source: config.stream.default_source.clone(),
        },
    );

    tracing::info!(
        "Listen at http://{}:{}/stream",
        config.server.bind_address,
        config.server.http_port
    );

    let shutdown = {
        let session = session.clone();
        let registry = registry.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
            match session.stop().await {
                Ok(()) | Err(SessionError::NotRunning) => {}
                Err(e) => tracing::warn!("Failed to stop streaming session: {}", e),
            }
            registry.disconnect_all();
        }
    };

    web_server.run(shutdown).await?;
    Ok(())
}
