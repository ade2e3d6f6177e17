//! Utilities shared by the kaiwa binaries and their tests.

pub mod logger;
pub mod time;
