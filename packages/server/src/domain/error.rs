//! Error types for the domain layer.
//!
//! The `Display` text of [`LoginRejection`] and [`RoomRejection`] is sent to
//! the client verbatim inside `force-login` / `force-room` events.

use std::time::Duration;

use thiserror::Error;

/// Validation errors raised while building value objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("Connection id can't be empty.")]
    EmptyConnectionId,

    #[error("Nick can't be empty.")]
    EmptyNick,

    #[error("Room name can't be empty.")]
    EmptyRoomName,

    #[error("Room name can be at most {max} characters.")]
    RoomNameTooLong { max: usize },

    #[error("Room name contains invalid characters.")]
    InvalidRoomName,
}

/// Reasons a login is refused. The session keeps its previous state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginRejection {
    #[error("Nick can't be empty.")]
    EmptyNick,

    #[error("This nick is already in chat.")]
    NickTaken,

    #[error("You are already logged in.")]
    AlreadyLoggedIn,

    /// Rooms are enabled and the connection has not joined one yet.
    #[error("Select a room before logging in.")]
    RoomRequired,
}

impl LoginRejection {
    /// `RoomRequired` is answered with `force-room`, everything else with `force-login`.
    pub fn needs_room(&self) -> bool {
        matches!(self, LoginRejection::RoomRequired)
    }
}

/// Reasons an explicit room selection is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomRejection {
    #[error("Room selection is disabled on this server.")]
    Disabled,

    #[error("Rooms can only be changed before logging in.")]
    AlreadyLoggedIn,

    #[error("{0}")]
    InvalidName(#[from] ValueObjectError),
}

/// Failures of the relay-credential collaborator.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read command file: {0}")]
    ReadCommand(#[source] std::io::Error),

    #[error("command file is empty")]
    EmptyCommand,

    #[error("failed to spawn credential command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("credential command timed out after {0:?}")]
    Timeout(Duration),

    #[error("credential command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    #[error("credential command printed invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
