//! Requests accepted by the hub loop.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::domain::{
    Briefing, ConnectionId, Departure, LoginRejection, Nick, RoomDetail, RoomName, RoomSummary,
};

use super::{outbound::Frame, registry::Audience};

pub type LoginReply = oneshot::Sender<Result<Briefing, LoginRejection>>;

#[derive(Debug)]
pub enum HubCommand {
    Register {
        id: ConnectionId,
        outbound: mpsc::Sender<Frame>,
    },
    Join {
        id: ConnectionId,
        room: RoomName,
    },
    Leave {
        id: ConnectionId,
        reply: oneshot::Sender<Option<Departure>>,
    },
    Broadcast {
        room: RoomName,
        frame: Frame,
        audience: Audience,
    },
    Login {
        id: ConnectionId,
        nick: Nick,
        reply: LoginReply,
    },
    Publish {
        id: ConnectionId,
        body: Value,
    },
    Relay {
        target: ConnectionId,
        frame: Frame,
    },
    Rooms {
        reply: oneshot::Sender<Vec<RoomSummary>>,
    },
    Room {
        name: RoomName,
        reply: oneshot::Sender<Option<RoomDetail>>,
    },
}
