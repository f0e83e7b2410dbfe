//! Listener registry
//!
//! Every connected listener owns the draining end of an unbounded channel;
//! the registry keeps the writing end keyed by a random session id. All
//! mutations (register, unregister, prune during fan-out) go through one
//! lock, so a listener joining mid-pass either sees the whole chunk or
//! none of it.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::error::BroadcastError;

/// Writing end of one listener's relay channel
#[derive(Debug, Clone)]
pub struct ClientChannel {
    id: Uuid,
    tx: UnboundedSender<Bytes>,
}

impl ClientChannel {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a chunk for the listener.
    ///
    /// Never blocks: the channel is unbounded, so the only failure is a
    /// listener that has gone away.
    pub fn write(&self, chunk: Bytes) -> Result<(), BroadcastError> {
        self.tx
            .send(chunk)
            .map_err(|_| BroadcastError::ListenerClosed(self.id))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Outcome of one fan-out pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub pruned: usize,
}

/// Registry of live listener channels
#[derive(Debug, Default)]
pub struct ClientStreamRegistry {
    clients: Mutex<HashMap<Uuid, ClientChannel>>,
}

impl ClientStreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener and hand back its draining end
    pub fn register(self: &Arc<Self>) -> ListenerStream {
        let id = Uuid::new_v4();
        let (tx, rx) = unbounded_channel();

        self.clients.lock().insert(id, ClientChannel { id, tx });
        tracing::info!(listener = %id, "Listener registered");

        ListenerStream {
            id,
            rx,
            registry: Arc::downgrade(self),
        }
    }

    /// Remove a listener; unknown ids are ignored
    pub fn unregister(&self, id: Uuid) -> bool {
        let removed = self.clients.lock().remove(&id).is_some();
        if removed {
            tracing::info!(listener = %id, "Listener unregistered");
        }
        removed
    }

    /// Apply `write` to every registered channel.
    ///
    /// A channel whose write fails is dropped from the registry in the same
    /// pass.
    pub fn for_each_live<F>(&self, mut write: F) -> FanOut
    where
        F: FnMut(&ClientChannel) -> Result<(), BroadcastError>,
    {
        let mut report = FanOut::default();
        let mut clients = self.clients.lock();

        clients.retain(|_, channel| match write(channel) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "Pruning listener");
                report.pruned += 1;
                false
            }
        });

        report
    }

    /// Drop every channel, ending all listener streams once drained.
    /// Used at process shutdown so open responses can complete.
    pub fn disconnect_all(&self) -> usize {
        let mut clients = self.clients.lock();
        let count = clients.len();
        clients.clear();
        if count > 0 {
            tracing::info!(listeners = count, "Disconnected all listeners");
        }
        count
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.clients.lock().contains_key(&id)
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.clients.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}

/// Draining end of a listener's channel.
///
/// Yields every chunk broadcast while the listener is registered and
/// unregisters itself when dropped, which is what happens when the
/// transport sees the client disconnect.
#[derive(Debug)]
pub struct ListenerStream {
    id: Uuid,
    rx: UnboundedReceiver<Bytes>,
    registry: Weak<ClientStreamRegistry>,
}

impl ListenerStream {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Close the channel but stay registered until the next fan-out pass
    /// notices and prunes it. Chunks already queued can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Receive the next chunk, `None` once closed and drained
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Take a queued chunk without waiting
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

impl Stream for ListenerStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ListenerStream {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}
