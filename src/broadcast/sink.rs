//! Broadcast sink
//!
//! Terminal stage of the pipeline: copies each paced chunk to every live
//! listener. Listener failures are absorbed here and only show up as
//! pruned registry entries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use super::registry::{ClientStreamRegistry, FanOut};

/// Fan-out write endpoint shared by the pipeline task and status queries
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    registry: Arc<ClientStreamRegistry>,
    stats: Arc<SinkCounters>,
}

#[derive(Debug, Default)]
struct SinkCounters {
    chunks: AtomicU64,
    bytes: AtomicU64,
    pruned: AtomicU64,
}

impl BroadcastSink {
    pub fn new(registry: Arc<ClientStreamRegistry>) -> Self {
        Self {
            registry,
            stats: Arc::new(SinkCounters::default()),
        }
    }

    pub fn registry(&self) -> &Arc<ClientStreamRegistry> {
        &self.registry
    }

    /// Deliver one chunk to every registered listener
    pub fn write(&self, chunk: Bytes) -> FanOut {
        let len = chunk.len() as u64;
        let report = self.registry.for_each_live(|channel| channel.write(chunk.clone()));

        self.stats.chunks.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes.fetch_add(len, Ordering::Relaxed);
        if report.pruned > 0 {
            self.stats.pruned.fetch_add(report.pruned as u64, Ordering::Relaxed);
            tracing::debug!(
                pruned = report.pruned,
                remaining = report.delivered,
                "Pruned closed listeners"
            );
        }

        report
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            chunks_broadcast: self.stats.chunks.load(Ordering::Relaxed),
            bytes_broadcast: self.stats.bytes.load(Ordering::Relaxed),
            listeners_pruned: self.stats.pruned.load(Ordering::Relaxed),
        }
    }
}

/// Sink statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SinkStats {
    pub chunks_broadcast: u64,
    pub bytes_broadcast: u64,
    pub listeners_pruned: u64,
}
