//! Transport layer: the axum server, HTTP handlers and WebSocket connections.

pub mod connection;
mod handler;
mod server;
mod signal;
pub mod state;

pub use server::{Server, ServerError};
