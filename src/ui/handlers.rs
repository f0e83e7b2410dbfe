//! HTTP handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;

use crate::constants::HOME_LOCATION;
use crate::error::{AssetError, SessionError};
use crate::stream::{SessionStatus, SourceDescriptor};
use crate::ui::server::AppState;

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Control command body for `POST /controller`
#[derive(Debug, serde::Deserialize)]
pub struct CommandRequest {
    pub command: String,
    /// Source to start instead of the configured default
    #[serde(default)]
    pub source: Option<String>,
}

/// Control command outcome
#[derive(Debug, serde::Serialize)]
pub struct CommandResult {
    pub result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDescriptor>,
}

/// Commands understood by the controller endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
}

impl ControlCommand {
    /// Matches by substring, so `"start"`, `"START"` and `"start now"` all start
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.to_ascii_lowercase();
        if text.contains("start") {
            Some(ControlCommand::Start)
        } else if text.contains("stop") {
            Some(ControlCommand::Stop)
        } else {
            None
        }
    }
}

/// `GET /`
pub async fn redirect_home() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, HOME_LOCATION)])
}

/// `GET /home`
pub async fn home_page(State(state): State<Arc<AppState>>) -> Response {
    serve_file(&state, &state.pages.home_page).await
}

/// `GET /controller`
pub async fn controller_page(State(state): State<Arc<AppState>>) -> Response {
    serve_file(&state, &state.pages.controller_page).await
}

/// `GET /stream`: attach a new listener to the broadcast
pub async fn listen(State(state): State<Arc<AppState>>) -> Response {
    // Dropping the body (client gone) drops the listener, which unregisters it
    let listener = state.registry.register();
    let body = Body::from_stream(listener.map(Ok::<_, std::io::Error>));

    (
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::ACCEPT_RANGES, "bytes"),
        ],
        body,
    )
        .into_response()
}

/// `POST /controller`
pub async fn command(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommandRequest>,
) -> (StatusCode, Json<ApiResponse<CommandResult>>) {
    let Some(command) = ControlCommand::parse(&req.command) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Unknown command: {}", req.command))),
        );
    };

    tracing::info!(command = ?command, "Controller command received");

    let outcome = match command {
        ControlCommand::Start => {
            let source = req.source.as_deref().unwrap_or(&state.default_source);
            state.session.start(source).await.map(Some)
        }
        ControlCommand::Stop => state.session.stop().await.map(|_| None),
    };

    match outcome {
        Ok(source) => (
            StatusCode::OK,
            Json(ApiResponse::ok(CommandResult { result: "ok", source })),
        ),
        Err(e) => (session_error_status(&e), Json(ApiResponse::error(e.to_string()))),
    }
}

/// `GET /status`
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<SessionStatus>> {
    Json(ApiResponse::ok(state.session.status()))
}

/// Any other request: static assets under the public root
pub async fn serve_asset(State(state): State<Arc<AppState>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        return StatusCode::NOT_FOUND.into_response();
    }
    serve_file(&state, uri.path()).await
}

async fn serve_file(state: &AppState, path: &str) -> Response {
    match state.assets.open_stream(path).await {
        Ok(stream) => (
            [(header::CONTENT_TYPE, stream.info.content_type())],
            Body::from_stream(ReaderStream::new(stream.reader)),
        )
            .into_response(),
        Err(e) => asset_error_response(path, e),
    }
}

fn asset_error_response(path: &str, err: AssetError) -> Response {
    if err.is_not_found() {
        tracing::debug!(path, error = %err, "Asset not found");
        StatusCode::NOT_FOUND.into_response()
    } else {
        tracing::error!(path, error = %err, "Failed to serve asset");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

fn session_error_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::DoubleStart | SessionError::Busy(_) | SessionError::NotRunning => StatusCode::CONFLICT,
        SessionError::SourceUnavailable(e) if e.is_not_found() => StatusCode::NOT_FOUND,
        SessionError::SourceUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
