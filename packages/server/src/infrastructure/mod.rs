//! Infrastructure layer: wire formats and adapters to the outside world.

pub mod credential;
pub mod dto;
pub mod static_files;
