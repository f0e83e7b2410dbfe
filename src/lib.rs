//! # Radio Relay
//!
//! Live audio broadcast relay: one source file, paced to real playback
//! speed, fanned out to every connected HTTP listener.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          StreamingSession                            │
//! │                                                                      │
//! │  ┌──────────────┐   ┌──────────────┐   ┌───────────────────────┐    │
//! │  │ BitrateProbe │──►│  byte rate   │──►│   RateLimitedSource   │    │
//! │  │ (sox --i -B) │   │ bitrate / 8  │   │ (paced file reader)   │    │
//! │  └──────────────┘   └──────────────┘   └───────────┬───────────┘    │
//! │         ▲                                          │                │
//! │         │            ┌──────────────────┐          ▼                │
//! │         └────────────│FileStreamProvider│   ┌──────────────┐        │
//! │                      └──────────────────┘   │BroadcastSink │        │
//! │                                             └──────┬───────┘        │
//! └────────────────────────────────────────────────────┼────────────────┘
//!                                                      │
//!                               ClientStreamRegistry::for_each_live
//!                          ┌───────────────┬───────────┴───┬───────────────┐
//!                          ▼               ▼               ▼               ▼
//!                     [Listener]      [Listener]      [Listener]      [Listener]
//!                          │               │               │               │
//!                          └─────── GET /stream (audio/mpeg, chunked) ─────┘
//! ```
//!
//! Listeners connect and disconnect independently of the pipeline; only the
//! registry is shared between the two sides.

pub mod assets;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod stream;
pub mod ui;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 3000;

    /// Bitrate assumed when the probe fails, in bits per second
    pub const DEFAULT_FALLBACK_BITRATE: u64 = 128_000;

    /// Bits per byte
    pub const DEFAULT_BITRATE_DIVISOR: u64 = 8;

    /// Playback time covered by one broadcast chunk
    pub const DEFAULT_CHUNK_INTERVAL_MS: u64 = 100;

    /// Public asset root
    pub const DEFAULT_PUBLIC_DIR: &str = "public";

    pub const DEFAULT_HOME_PAGE: &str = "home/index.html";

    pub const DEFAULT_CONTROLLER_PAGE: &str = "controller/index.html";

    /// Source streamed at boot, relative to the public root
    pub const DEFAULT_SOURCE: &str = "audio/songs/conversation.mp3";

    pub const DEFAULT_PROBE_PROGRAM: &str = "sox";

    /// `--i -B`: print the average bitrate only
    pub const DEFAULT_PROBE_ARGS: &[&str] = &["--i", "-B"];

    pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

    /// Redirect target for `/`
    pub const HOME_LOCATION: &str = "/home";
}
