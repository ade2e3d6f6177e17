//! Relay-credential collaborator.
//!
//! Signaling clients ask for a short list of ICE (STUN/TURN) servers. Where
//! those come from is deployment specific, so the handlers only see this trait.

use async_trait::async_trait;
use serde_json::Value;

use super::error::CredentialError;

/// Produces the ICE server entries handed to signaling clients.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IceServerProvider: Send + Sync {
    /// Fetch the current list of ICE server objects.
    async fn ice_servers(&self) -> Result<Vec<Value>, CredentialError>;
}
