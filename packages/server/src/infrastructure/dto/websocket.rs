//! WebSocket message DTOs.
//!
//! Every frame in both directions is a JSON object with an `event` tag. Inbound
//! frames carry their payload under `data`; outbound frames mostly do too, with
//! `previous-msg` as the exception (`msgs` sits next to `event`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{ChatMessage, Nick},
    hub::Frame,
};

/// Inbound event tags understood by the dispatch table.
pub mod tag {
    pub const LOGIN: &str = "login";
    pub const SEND_MESSAGE: &str = "send-msg";
    pub const TYPING: &str = "typing";
    pub const PING: &str = "ping";
    pub const DISCONNECT: &str = "disconnect";
    pub const JOIN_ROOM: &str = "join-room";
    pub const LIST_ROOMS: &str = "list-rooms";
    pub const SIGNALING_ENABLED: &str = "signaling-enabled";
    pub const READY: &str = "ready";
    pub const SIGNAL: &str = "signal";
}

/// Inbound frame: `{ "event": <tag>, "data": <anything> }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginData {
    #[serde(default)]
    pub nick: String,
}

/// `m` is required; an explicit `null` is still relayed as is.
#[derive(Debug, Deserialize)]
pub struct SendMessageData {
    pub m: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinRoomData {
    #[serde(default)]
    pub room: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignalData {
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub signal: Value,
}

/// Chat message as it appears in `new-msg` and `previous-msg`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageDto {
    /// Sender nick.
    pub f: String,
    /// `msg_<n>`
    pub id: String,
    pub m: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsersData {
    pub users: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NickData {
    pub nick: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLeftData {
    pub nick: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingData {
    pub status: bool,
    pub nick: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalingAvailableData {
    pub enabled: bool,
    #[serde(rename = "iceServers")]
    pub ice_servers: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRelayData {
    pub from: String,
    pub signal: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomJoinedData {
    pub room: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfoDto {
    pub name: String,
    pub users: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomsAvailableData {
    pub rooms: Vec<RoomInfoDto>,
}

/// Outbound event catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Room roster sent to a member right after its login.
    Start { data: UsersData },
    #[serde(rename = "ue")]
    UserEntered { data: NickData },
    #[serde(rename = "ul")]
    UserLeft { data: UserLeftData },
    NewMsg { data: ChatMessageDto },
    PreviousMsg { msgs: Vec<ChatMessageDto> },
    Typing { data: TypingData },
    ForceLogin { data: String },
    ForceRoom { data: String },
    Pong,
    SignalingAvailable { data: SignalingAvailableData },
    /// Carries the connection id of the peer that is ready.
    UserReady { data: String },
    Signal { data: SignalRelayData },
    RoomJoined { data: RoomJoinedData },
    RoomsAvailable { data: RoomsAvailableData },
}

impl ServerEvent {
    pub fn start(roster: &[Nick]) -> Self {
        ServerEvent::Start {
            data: UsersData {
                users: roster.iter().map(|nick| nick.as_str().to_string()).collect(),
            },
        }
    }

    pub fn user_entered(nick: &Nick) -> Self {
        ServerEvent::UserEntered {
            data: NickData {
                nick: nick.as_str().to_string(),
            },
        }
    }

    pub fn new_message(message: &ChatMessage) -> Self {
        ServerEvent::NewMsg {
            data: message.into(),
        }
    }

    pub fn previous_messages(history: &[ChatMessage]) -> Self {
        ServerEvent::PreviousMsg {
            msgs: history.iter().map(ChatMessageDto::from).collect(),
        }
    }

    pub fn force_login(reason: impl ToString) -> Self {
        ServerEvent::ForceLogin {
            data: reason.to_string(),
        }
    }

    pub fn force_room(reason: impl ToString) -> Self {
        ServerEvent::ForceRoom {
            data: reason.to_string(),
        }
    }

    /// Tag of this event as written on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Start { .. } => "start",
            ServerEvent::UserEntered { .. } => "ue",
            ServerEvent::UserLeft { .. } => "ul",
            ServerEvent::NewMsg { .. } => "new-msg",
            ServerEvent::PreviousMsg { .. } => "previous-msg",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::ForceLogin { .. } => "force-login",
            ServerEvent::ForceRoom { .. } => "force-room",
            ServerEvent::Pong => "pong",
            ServerEvent::SignalingAvailable { .. } => "signaling-available",
            ServerEvent::UserReady { .. } => "user-ready",
            ServerEvent::Signal { .. } => "signal",
            ServerEvent::RoomJoined { .. } => "room-joined",
            ServerEvent::RoomsAvailable { .. } => "rooms-available",
        }
    }

    /// Serialize into a frame ready for an outbound buffer.
    ///
    /// A failure is logged and yields `None`; the event is simply not sent.
    pub fn encode(&self) -> Option<Frame> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Frame::from(json)),
            Err(e) => {
                tracing::error!("Failed to encode '{}' event: {}", self.name(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageId;
    use serde_json::json;

    fn to_json(event: &ServerEvent) -> Value {
        serde_json::from_str(&event.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_envelope_without_data_defaults_to_null() {
        // テスト項目: data の無いエンベロープは data が null になる
        // given (前提条件):
        let raw = br#"{"event":"ping"}"#;

        // when (操作):
        let envelope = Envelope::decode(raw).unwrap();

        // then (期待する結果):
        assert_eq!(envelope.event, "ping");
        assert_eq!(envelope.data, Value::Null);
    }

    #[test]
    fn test_envelope_without_event_is_rejected() {
        // テスト項目: event タグの無いフレームはデコードエラーになる
        // given (前提条件):
        let raw = br#"{"data":{"nick":"alice"}}"#;

        // when (操作):
        let result = Envelope::decode(raw);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_send_message_data_requires_m() {
        // テスト項目: send-msg のデータは m が無い・オブジェクトでない場合にデコードエラーになる
        // given (前提条件):
        let inputs = [json!({}), json!("hello"), json!(42), Value::Null];

        for data in inputs {
            // when (操作):
            let result = serde_json::from_value::<SendMessageData>(data);

            // then (期待する結果):
            assert!(result.is_err());
        }
        let ok: SendMessageData = serde_json::from_value(json!({ "m": "hi" })).unwrap();
        assert_eq!(ok.m, json!("hi"));
    }

    #[test]
    fn test_new_msg_wire_shape() {
        // テスト項目: new-msg は {event, data: {f, id, m}} の形で送られる
        // given (前提条件):
        let message = ChatMessage::new(
            MessageId::new(7),
            Nick::new("alice").unwrap(),
            json!({ "text": "hi" }),
        );

        // when (操作):
        let value = to_json(&ServerEvent::new_message(&message));

        // then (期待する結果):
        assert_eq!(
            value,
            json!({
                "event": "new-msg",
                "data": { "f": "alice", "id": "msg_7", "m": { "text": "hi" } }
            })
        );
    }

    #[test]
    fn test_previous_msg_places_msgs_beside_event() {
        // テスト項目: previous-msg は msgs をトップレベルに置き、空でも配列になる
        // given (前提条件):
        let event = ServerEvent::previous_messages(&[]);

        // when (操作):
        let value = to_json(&event);

        // then (期待する結果):
        assert_eq!(value, json!({ "event": "previous-msg", "msgs": [] }));
    }

    #[test]
    fn test_pong_has_no_data() {
        // テスト項目: pong はイベント名だけを持つ
        // given (前提条件):
        let event = ServerEvent::Pong;

        // when (操作):
        let value = to_json(&event);

        // then (期待する結果):
        assert_eq!(value, json!({ "event": "pong" }));
    }

    #[test]
    fn test_presence_and_signaling_tags() {
        // テスト項目: ue / ul / signaling-available / user-ready のタグとペイロード形
        // given (前提条件):
        let entered = ServerEvent::UserEntered {
            data: NickData {
                nick: "bob".to_string(),
            },
        };
        let left = ServerEvent::UserLeft {
            data: UserLeftData {
                nick: "bob".to_string(),
                id: "c-1".to_string(),
            },
        };
        let available = ServerEvent::SignalingAvailable {
            data: SignalingAvailableData {
                enabled: true,
                ice_servers: vec![json!({ "urls": "stun:example.org" })],
            },
        };
        let ready = ServerEvent::UserReady {
            data: "c-1".to_string(),
        };

        // when (操作):
        let values: Vec<Value> = [entered, left, available, ready].iter().map(to_json).collect();

        // then (期待する結果):
        assert_eq!(values[0], json!({ "event": "ue", "data": { "nick": "bob" } }));
        assert_eq!(
            values[1],
            json!({ "event": "ul", "data": { "nick": "bob", "id": "c-1" } })
        );
        assert_eq!(
            values[2],
            json!({
                "event": "signaling-available",
                "data": { "enabled": true, "iceServers": [{ "urls": "stun:example.org" }] }
            })
        );
        assert_eq!(values[3], json!({ "event": "user-ready", "data": "c-1" }));
    }

    #[test]
    fn test_name_matches_serialized_tag() {
        // テスト項目: name() がシリアライズ後の event タグと一致する
        // given (前提条件):
        let events = vec![
            ServerEvent::force_login("x"),
            ServerEvent::force_room("x"),
            ServerEvent::RoomsAvailable {
                data: RoomsAvailableData { rooms: vec![] },
            },
            ServerEvent::Typing {
                data: TypingData {
                    status: true,
                    nick: "a".to_string(),
                },
            },
        ];

        for event in events {
            // when (操作):
            let value = to_json(&event);

            // then (期待する結果):
            assert_eq!(value["event"], event.name());
        }
    }
}
