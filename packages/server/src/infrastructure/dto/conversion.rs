//! Conversion logic from domain entities to DTOs.

use kaiwa_shared::time::timestamp_to_rfc3339;

use crate::domain::{ChatMessage, MemberDetail, RoomDetail, RoomSummary};
use crate::infrastructure::dto::{http, websocket as ws};

// ========================================
// Domain Entity → WebSocket DTO
// ========================================

impl From<&ChatMessage> for ws::ChatMessageDto {
    fn from(model: &ChatMessage) -> Self {
        Self {
            f: model.from.as_str().to_string(),
            id: model.id.to_string(),
            m: model.body.clone(),
        }
    }
}

impl From<&RoomSummary> for ws::RoomInfoDto {
    fn from(model: &RoomSummary) -> Self {
        Self {
            name: model.name.as_str().to_string(),
            users: model.users,
        }
    }
}

// ========================================
// Domain Entity → HTTP DTO
// ========================================

impl From<RoomSummary> for http::RoomSummaryDto {
    fn from(model: RoomSummary) -> Self {
        Self {
            name: model.name.into_string(),
            users: model.users,
            connections: model.connections,
        }
    }
}

impl From<MemberDetail> for http::MemberDetailDto {
    fn from(model: MemberDetail) -> Self {
        Self {
            id: model.id.into_string(),
            nick: model.nick.map(|nick| nick.into_string()),
            connected_at: timestamp_to_rfc3339(model.connected_at),
        }
    }
}

impl From<RoomDetail> for http::RoomDetailDto {
    fn from(model: RoomDetail) -> Self {
        Self {
            name: model.name.into_string(),
            members: model.members.into_iter().map(Into::into).collect(),
            retained_messages: model.retained_messages,
        }
    }
}
