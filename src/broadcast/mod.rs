//! Listener fan-out
//!
//! ```text
//!   RateLimitedSource ──chunk──► BroadcastSink::write()
//!                                       │
//!                       ClientStreamRegistry::for_each_live()
//!                     ┌─────────────────┼─────────────────┐
//!                     ▼                 ▼                 ▼
//!               [ClientChannel]   [ClientChannel]   [ClientChannel]
//!                     │                 │              (closed → pruned)
//!                     ▼                 ▼
//!              ListenerStream    ListenerStream ──► HTTP response body
//! ```
//!
//! `bytes::Bytes` is reference counted, so every listener shares the same
//! allocation for a chunk.

pub mod registry;
pub mod sink;

pub use registry::{ClientChannel, ClientStreamRegistry, FanOut, ListenerStream};
pub use sink::{BroadcastSink, SinkStats};
