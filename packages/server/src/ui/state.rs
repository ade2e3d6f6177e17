//! Shared application state.

use crate::{config::ServerConfig, hub::HubHandle, usecase::DispatchTable};

/// Everything a request or connection needs, shared behind an `Arc`.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    /// Handle to the registry/broadcaster loop.
    pub hub: HubHandle,
    /// Built once at start-up, read-only afterwards.
    pub dispatch: DispatchTable,
}
