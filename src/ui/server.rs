//! Web server
//!
//! | Path | Description |
//! |------|-------------|
//! | `GET /` | Redirect to `/home` |
//! | `GET /home` | Listener page |
//! | `GET /controller` | Controller page |
//! | `POST /controller` | `{"command": "start" \| "stop"}` |
//! | `GET /stream` | Live `audio/mpeg` stream (chunked) |
//! | `GET /status` | Session status JSON |
//! | `GET /<file>` | Static asset under the public root |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::assets::FileStreamProvider;
use crate::broadcast::ClientStreamRegistry;
use crate::config::{AssetConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::stream::StreamingSession;
use crate::ui::handlers;

/// Shared state for all handlers
pub struct AppState {
    pub session: Arc<StreamingSession>,
    pub registry: Arc<ClientStreamRegistry>,
    pub assets: FileStreamProvider,
    pub pages: AssetConfig,
    /// Source used by a `start` command that names none
    pub default_source: String,
}

/// HTTP front end for the relay
pub struct WebServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(handlers::redirect_home))
            .route("/home", get(handlers::home_page))
            .route(
                "/controller",
                get(handlers::controller_page).post(handlers::command),
            )
            .route("/stream", get(handlers::listen))
            .route("/status", get(handlers::get_status))
            .fallback(handlers::serve_asset)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
            .with_state(self.state.clone())
    }

    pub fn address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.config.bind_address, self.config.http_port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address: {}", e)))
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.address()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }
}
