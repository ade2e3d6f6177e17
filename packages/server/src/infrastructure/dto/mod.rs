//! Data Transfer Objects (DTOs) for the relay.
//!
//! DTOs are organized by protocol:
//! - `websocket`: the `{event, data}` envelope and every server event
//! - `http`: HTTP API response DTOs

pub mod conversion;
pub mod http;
pub mod websocket;
