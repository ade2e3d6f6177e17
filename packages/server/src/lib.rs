//! kaiwa: a room-based WebSocket fan-out relay.
//!
//! Connections join rooms, claim a nick and exchange chat messages, typing
//! indicators and point-to-point signaling payloads through a single hub task
//! that owns all membership state.

pub mod config;
pub mod domain;
pub mod hub;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
