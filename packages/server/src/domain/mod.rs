//! Domain layer for the relay.
//!
//! Value objects, entities and the collaborator traits the rest of the crate
//! depends on. Nothing in here knows about sockets or JSON framing.

pub mod credential;
pub mod entity;
pub mod error;
pub mod value_object;

pub use credential::IceServerProvider;
pub use entity::{Briefing, ChatMessage, Departure, MemberDetail, MessageId, ReplayBuffer, RoomDetail, RoomSummary};
pub use error::{CredentialError, LoginRejection, RoomRejection, ValueObjectError};
pub use value_object::{ConnectionId, Nick, RoomName};
