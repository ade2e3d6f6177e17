//! Room selection and discovery.

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    domain::{RoomName, RoomRejection},
    infrastructure::dto::websocket::{
        JoinRoomData, RoomInfoDto, RoomJoinedData, RoomsAvailableData, ServerEvent,
    },
};

use super::{context::ConnectionContext, dispatch::EventHandler};

/// `join-room {room}`. Only honoured while rooms are enabled and before login.
#[derive(Debug, Clone, Copy)]
pub struct JoinRoomHandler {
    rooms_enabled: bool,
}

impl JoinRoomHandler {
    pub fn new(rooms_enabled: bool) -> Self {
        Self { rooms_enabled }
    }

    fn check(&self, ctx: &ConnectionContext) -> Result<(), RoomRejection> {
        if !self.rooms_enabled {
            return Err(RoomRejection::Disabled);
        }
        if ctx.is_logged_in() {
            return Err(RoomRejection::AlreadyLoggedIn);
        }
        Ok(())
    }

    fn reject(ctx: &ConnectionContext, rejection: RoomRejection) {
        tracing::debug!("Room selection of '{}' rejected: {}", ctx.id, rejection);
        ctx.send(&ServerEvent::force_room(&rejection));
    }
}

#[async_trait]
impl EventHandler for JoinRoomHandler {
    async fn handle(&self, ctx: &mut ConnectionContext, data: Value) {
        if let Err(rejection) = self.check(ctx) {
            return Self::reject(ctx, rejection);
        }
        let request: JoinRoomData = match serde_json::from_value(data) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Failed to parse join-room data from '{}': {}", ctx.id, e);
                return;
            }
        };
        let room = match RoomName::new(&request.room) {
            Ok(room) => room,
            Err(e) => return Self::reject(ctx, e.into()),
        };

        tracing::debug!("'{}' selected room '{}'", ctx.id, room);
        ctx.hub.join(ctx.id.clone(), room.clone()).await;
        ctx.send(&ServerEvent::RoomJoined {
            data: RoomJoinedData {
                room: room.as_str().to_string(),
            },
        });
        ctx.session.room = Some(room);
    }
}

/// `list-rooms` → `rooms-available`, sorted by room name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListRoomsHandler;

#[async_trait]
impl EventHandler for ListRoomsHandler {
    async fn handle(&self, ctx: &mut ConnectionContext, _data: Value) {
        let rooms = ctx.hub.rooms().await;
        ctx.send(&ServerEvent::RoomsAvailable {
            data: RoomsAvailableData {
                rooms: rooms.iter().map(RoomInfoDto::from).collect(),
            },
        });
    }
}
