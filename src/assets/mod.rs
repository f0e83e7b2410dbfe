//! Public asset access
//!
//! Resolves request paths against the public root and opens plain
//! sequential read streams, both for static pages and for the broadcast
//! source file.

pub mod provider;

pub use provider::{content_type_for, FileInfo, FileStream, FileStreamProvider};
