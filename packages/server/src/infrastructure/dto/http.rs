//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// Room summary for the room list API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub name: String,
    /// Members that have logged in.
    pub users: usize,
    pub connections: usize,
}

/// Member detail for the room detail API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDetailDto {
    pub id: String,
    pub nick: Option<String>,
    /// RFC 3339, UTC
    pub connected_at: Option<String>,
}

/// Room detail for the room detail API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub name: String,
    pub members: Vec<MemberDetailDto>,
    pub retained_messages: usize,
}
