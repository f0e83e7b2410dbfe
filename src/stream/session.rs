//! Streaming session
//!
//! Owns the single broadcast pipeline of the process:
//!
//! ```text
//! FileStreamProvider ──► RateLimitedSource ──► BroadcastSink ──► listeners
//!         ▲                     ▲
//!   source path          BitrateProbe / divisor
//! ```
//!
//! State transitions are `Idle → Starting → Running → Stopping → Idle`.
//! Listeners live in the registry and are not touched by start/stop; they
//! simply receive nothing while the session is idle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::fs::File;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::assets::FileStreamProvider;
use crate::broadcast::{BroadcastSink, ClientStreamRegistry, SinkStats};
use crate::config::StreamConfig;
use crate::error::SessionError;

use super::probe::BitrateProbe;
use super::throttle::{byte_rate, chunk_size_for, RateLimitedSource};

/// Lifecycle state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// The source being broadcast; fixed for the lifetime of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDescriptor {
    pub path: String,
    pub bitrate: u64,
    pub bytes_per_second: u64,
}

/// Snapshot for status queries
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub listeners: usize,
    #[serde(flatten)]
    pub sink: SinkStats,
}

/// A running pipeline
struct ActivePipeline {
    descriptor: SourceDescriptor,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct SessionInner {
    state: SessionState,
    active: Option<ActivePipeline>,
    /// Bumped per start so a finished task never clears a newer run
    generation: u64,
}

/// Puts the session back to Idle if a `start` or `stop` future is dropped
/// before it finishes its transition.
struct TransitionGuard<'a> {
    inner: &'a Mutex<SessionInner>,
    armed: bool,
}

impl<'a> TransitionGuard<'a> {
    fn new(inner: &'a Mutex<SessionInner>) -> Self {
        Self { inner, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.inner.lock();
        if matches!(inner.state, SessionState::Starting | SessionState::Stopping) {
            tracing::warn!(state = ?inner.state, "Session transition abandoned, returning to idle");
            inner.state = SessionState::Idle;
            if let Some(active) = inner.active.take() {
                active.cancel.cancel();
            }
        }
    }
}

/// The process-wide broadcast session
pub struct StreamingSession {
    inner: Arc<Mutex<SessionInner>>,
    probe: BitrateProbe,
    assets: FileStreamProvider,
    sink: BroadcastSink,
    bitrate_divisor: u64,
    chunk_interval: Duration,
}

impl StreamingSession {
    pub fn new(
        config: &StreamConfig,
        probe: BitrateProbe,
        assets: FileStreamProvider,
        registry: Arc<ClientStreamRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                state: SessionState::Idle,
                active: None,
                generation: 0,
            })),
            probe,
            assets,
            sink: BroadcastSink::new(registry),
            bitrate_divisor: config.bitrate_divisor,
            chunk_interval: config.chunk_interval(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn registry(&self) -> &Arc<ClientStreamRegistry> {
        self.sink.registry()
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.inner.lock();
        let active = inner.active.as_ref();
        SessionStatus {
            state: inner.state,
            source: active.map(|a| a.descriptor.clone()),
            started_at: active.map(|a| a.started_at),
            listeners: self.sink.registry().len(),
            sink: self.sink.stats(),
        }
    }

    /// Probe, open and start broadcasting `source_path`.
    ///
    /// Fails fast with [`SessionError::DoubleStart`] while another run is
    /// active; a source that cannot be opened leaves the session idle.
    pub async fn start(&self, source_path: &str) -> Result<SourceDescriptor, SessionError> {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                SessionState::Idle => inner.state = SessionState::Starting,
                SessionState::Running => return Err(SessionError::DoubleStart),
                other => return Err(SessionError::Busy(other)),
            }
        }
        let guard = TransitionGuard::new(&self.inner);

        tracing::info!(source = source_path, "Starting streaming session");

        let (descriptor, reader) = match self.open_source(source_path).await {
            Ok(opened) => opened,
            Err(e) => {
                // Guard drop returns to Idle
                tracing::error!(source = source_path, error = %e, "Failed to start streaming session");
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let source = RateLimitedSource::new(
            reader,
            descriptor.bytes_per_second,
            chunk_size_for(descriptor.bytes_per_second, self.chunk_interval),
            cancel.clone(),
        );

        let mut inner = self.inner.lock();
        inner.generation += 1;
        let task = tokio::spawn(drive(
            source,
            self.sink.clone(),
            self.inner.clone(),
            inner.generation,
            descriptor.path.clone(),
        ));
        inner.active = Some(ActivePipeline {
            descriptor: descriptor.clone(),
            started_at: Utc::now(),
            cancel,
            task,
        });
        inner.state = SessionState::Running;
        guard.disarm();
        drop(inner);

        tracing::info!(
            source = %descriptor.path,
            bitrate = descriptor.bitrate,
            bytes_per_second = descriptor.bytes_per_second,
            "Streaming session running"
        );

        Ok(descriptor)
    }

    /// Cooperatively end the running pipeline and wait for it to drain
    pub async fn stop(&self) -> Result<(), SessionError> {
        let active = {
            let mut inner = self.inner.lock();
            if inner.state != SessionState::Running {
                return Err(SessionError::NotRunning);
            }
            inner.state = SessionState::Stopping;
            inner.active.take()
        };
        let guard = TransitionGuard::new(&self.inner);

        if let Some(active) = active {
            tracing::info!(source = %active.descriptor.path, "Stopping streaming session");
            active.cancel.cancel();
            if let Err(e) = active.task.await {
                tracing::error!(error = %e, "Pipeline task failed");
            }
        }

        self.inner.lock().state = SessionState::Idle;
        guard.disarm();
        tracing::info!("Streaming session stopped");
        Ok(())
    }

    async fn open_source(&self, source_path: &str) -> Result<(SourceDescriptor, File), SessionError> {
        let info = self
            .assets
            .resolve(source_path)
            .await
            .map_err(SessionError::SourceUnavailable)?;

        let bitrate = self.probe.probe(&info.absolute_path).await;

        let stream = self
            .assets
            .open(info)
            .await
            .map_err(SessionError::SourceUnavailable)?;

        let descriptor = SourceDescriptor {
            path: source_path.to_string(),
            bitrate,
            bytes_per_second: byte_rate(bitrate, self.bitrate_divisor),
        };

        Ok((descriptor, stream.reader))
    }
}

/// Pipeline drive loop: pull paced chunks and fan them out until the
/// source ends, fails, or is cancelled.
async fn drive(
    mut source: RateLimitedSource<File>,
    sink: BroadcastSink,
    inner: Arc<Mutex<SessionInner>>,
    generation: u64,
    path: String,
) {
    loop {
        match source.next_chunk().await {
            Ok(Some(chunk)) => {
                sink.write(chunk);
            }
            Ok(None) => {
                tracing::info!(source = %path, bytes = source.released(), "Source drained");
                break;
            }
            Err(e) => {
                tracing::error!(source = %path, error = %e, "Source read failed");
                break;
            }
        }
    }

    // A stop() in progress owns the transition back to Idle
    let mut inner = inner.lock();
    if inner.generation == generation && inner.state == SessionState::Running {
        inner.state = SessionState::Idle;
        inner.active = None;
    }
}
