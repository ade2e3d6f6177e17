//! UseCase layer: the protocol handlers and the table that routes to them.

pub mod context;
pub mod disconnect;
pub mod dispatch;
pub mod login;
pub mod ping;
pub mod room;
pub mod send_message;
pub mod signaling;
pub mod typing;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

pub use context::{ConnectionContext, Session};
pub use disconnect::DisconnectHandler;
pub use dispatch::{DispatchTable, EventHandler};
pub use login::LoginHandler;
pub use ping::PingHandler;
pub use room::{JoinRoomHandler, ListRoomsHandler};
pub use send_message::SendMessageHandler;
pub use signaling::{ReadyHandler, SignalHandler, SignalingEnabledHandler};
pub use typing::TypingHandler;

use crate::{domain::IceServerProvider, infrastructure::dto::websocket::tag};

/// Switches that change which events do anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Features {
    pub rooms: bool,
    pub signaling: bool,
}

/// Build the table used by every connection.
pub fn build_dispatch_table(
    features: Features,
    ice_servers: Arc<dyn IceServerProvider>,
) -> DispatchTable {
    DispatchTable::new()
        .on(tag::LOGIN, LoginHandler)
        .on(tag::SEND_MESSAGE, SendMessageHandler)
        .on(tag::TYPING, TypingHandler)
        .on(tag::PING, PingHandler)
        .on(tag::DISCONNECT, DisconnectHandler)
        .on(tag::JOIN_ROOM, JoinRoomHandler::new(features.rooms))
        .on(tag::LIST_ROOMS, ListRoomsHandler)
        .on(
            tag::SIGNALING_ENABLED,
            SignalingEnabledHandler::new(features.signaling, ice_servers),
        )
        .on(tag::READY, ReadyHandler::new(features.signaling))
        .on(tag::SIGNAL, SignalHandler::new(features.signaling))
}
