//! Broadcast pipeline
//!
//! Bitrate detection, real-time pacing, and the session that ties them to
//! the listener fan-out.

pub mod probe;
pub mod session;
pub mod throttle;

pub use probe::{parse_bitrate, BitrateProbe};
pub use session::{SessionState, SessionStatus, SourceDescriptor, StreamingSession};
pub use throttle::{byte_rate, chunk_size_for, RateLimitedSource};
