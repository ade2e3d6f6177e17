//! Domain entities and the read models the hub hands out.

use std::{collections::VecDeque, fmt};

use serde_json::Value;

use super::value_object::{ConnectionId, Nick, RoomName};

/// Identifier assigned to an accepted chat message, rendered as `msg_<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(u64);

impl MessageId {
    pub fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    #[cfg(test)]
    pub(crate) fn sequence(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg_{}", self.0)
    }
}

/// A chat message accepted by the hub.
///
/// `body` is the client supplied `m` object and is relayed untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub from: Nick,
    pub body: Value,
}

impl ChatMessage {
    pub fn new(id: MessageId, from: Nick, body: Value) -> Self {
        Self { id, from, body }
    }
}

/// Bounded FIFO of the most recent chat messages of a room.
///
/// A capacity of zero disables retention entirely.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    capacity: usize,
    messages: VecDeque<ChatMessage>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Append a message, evicting the oldest entries beyond capacity.
    pub fn push(&mut self, message: ChatMessage) {
        if self.capacity == 0 {
            return;
        }
        self.messages.push_back(message);
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    /// Messages in submission order, oldest first.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// What a newly named member is told about the room it entered.
#[derive(Debug, Clone, PartialEq)]
pub struct Briefing {
    pub room: RoomName,
    /// Named members in login order, including the new member.
    pub roster: Vec<Nick>,
    pub history: Vec<ChatMessage>,
}

/// Where a connection was, and under which nick, when the hub forgot it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Departure {
    pub room: Option<RoomName>,
    pub nick: Option<Nick>,
}

/// Room listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub name: RoomName,
    /// Number of named members.
    pub users: usize,
    /// Number of connections in the room, named or not.
    pub connections: usize,
}

/// One connection as seen from a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDetail {
    pub id: ConnectionId,
    pub nick: Option<Nick>,
    /// Unix timestamp in milliseconds.
    pub connected_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomDetail {
    pub name: RoomName,
    /// Members in join order.
    pub members: Vec<MemberDetail>,
    pub retained_messages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(sequence: u64) -> ChatMessage {
        ChatMessage::new(
            MessageId::new(sequence),
            Nick::new("alice").unwrap(),
            json!({ "text": format!("hello {sequence}") }),
        )
    }

    #[test]
    fn test_message_id_display() {
        // テスト項目: メッセージ ID が msg_<n> 形式で表示される
        // given (前提条件):
        let id = MessageId::new(42);

        // when (操作):
        let rendered = id.to_string();

        // then (期待する結果):
        assert_eq!(rendered, "msg_42");
    }

    #[test]
    fn test_replay_buffer_keeps_most_recent_in_order() {
        // テスト項目: 容量 + 1 件追加すると最新の capacity 件が送信順で残る
        // given (前提条件):
        let capacity = 3;
        let mut buffer = ReplayBuffer::new(capacity);

        // when (操作):
        for sequence in 1..=(capacity as u64 + 1) {
            buffer.push(message(sequence));
        }

        // then (期待する結果):
        let ids: Vec<u64> = buffer.snapshot().iter().map(|m| m.id.sequence()).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(buffer.len(), capacity);
    }

    #[test]
    fn test_replay_buffer_never_exceeds_capacity() {
        // テスト項目: 何件追加しても容量を超えない
        // given (前提条件):
        let mut buffer = ReplayBuffer::new(5);

        // when (操作) / then (期待する結果):
        for sequence in 1..=50 {
            buffer.push(message(sequence));
            assert!(buffer.len() <= buffer.capacity());
        }
    }

    #[test]
    fn test_replay_buffer_with_zero_capacity_retains_nothing() {
        // テスト項目: 容量 0 の場合は何も保持せず、スナップショットは空配列
        // given (前提条件):
        let mut buffer = ReplayBuffer::new(0);

        // when (操作):
        buffer.push(message(1));
        buffer.push(message(2));

        // then (期待する結果):
        assert!(buffer.is_empty());
        assert_eq!(buffer.snapshot(), Vec::<ChatMessage>::new());
    }
}
