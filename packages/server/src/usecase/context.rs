//! Per-connection state handed to every event handler.

use crate::{
    domain::{ConnectionId, Nick, RoomName},
    hub::{Audience, HubHandle, Outbound},
    infrastructure::dto::websocket::ServerEvent,
};

/// Session fields of one connection.
///
/// Only the connection's own read loop touches these, so no locking is needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Empty until a login succeeds.
    pub nick: Option<Nick>,
    /// Empty until the connection is placed in a room.
    pub room: Option<RoomName>,
}

pub struct ConnectionContext {
    pub id: ConnectionId,
    pub session: Session,
    pub outbound: Outbound,
    pub hub: HubHandle,
}

impl ConnectionContext {
    pub fn new(id: ConnectionId, outbound: Outbound, hub: HubHandle) -> Self {
        Self {
            id,
            session: Session::default(),
            outbound,
            hub,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.nick.is_some()
    }

    /// Enqueue an event on this connection's own outbound buffer.
    pub fn send(&self, event: &ServerEvent) {
        let Some(frame) = event.encode() else {
            return;
        };
        if let Err(e) = self.outbound.push(frame) {
            tracing::debug!("Could not queue '{}' for '{}': {}", event.name(), self.id, e);
        }
    }

    /// Ask the hub to deliver an event to this connection's room.
    ///
    /// Does nothing while the connection is not in a room.
    pub async fn broadcast(&self, event: &ServerEvent, audience: Audience) {
        let Some(room) = self.session.room.clone() else {
            tracing::debug!("'{}' is not in a room, dropping '{}'", self.id, event.name());
            return;
        };
        if let Some(frame) = event.encode() {
            self.hub.broadcast(room, frame, audience).await;
        }
    }
}
