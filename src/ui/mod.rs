//! HTTP surface: pages, control endpoint, and the listener stream

pub mod server;
pub mod handlers;

pub use server::{AppState, WebServer};
