//! Error types for the broadcast relay

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::stream::SessionState;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bitrate probe failures
///
/// These never leave the probe as a hard failure; the probe substitutes
/// its fallback bitrate instead.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Probe process has no {0} pipe")]
    MissingPipe(&'static str),

    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("Probe reported: {0}")]
    Diagnostic(String),

    #[error("Unparseable bitrate: {0:?}")]
    Parse(String),

    #[error("Probe IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Asset lookup errors
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Asset path escapes the public root: {0}")]
    OutsideRoot(String),

    #[error("Asset IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssetError {
    /// Whether the route layer should answer with a not-found status
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::NotFound(_) | AssetError::OutsideRoot(_))
    }
}

/// Streaming session lifecycle errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A streaming session is already running")]
    DoubleStart,

    #[error("Session is busy ({0:?})")]
    Busy(SessionState),

    #[error("No streaming session is running")]
    NotRunning,

    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[source] AssetError),
}

/// Per-listener delivery errors
#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("Listener {0} closed its channel")]
    ListenerClosed(Uuid),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
