//! Room membership state owned by the hub loop.
//!
//! Everything here is synchronous and lock free: the only caller is the hub's
//! control loop, which applies one command at a time. Rooms are created on the
//! first join and removed as soon as their last member leaves.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::{
    Briefing, ChatMessage, ConnectionId, Departure, LoginRejection, MemberDetail, MessageId,
    Nick, ReplayBuffer, RoomDetail, RoomName, RoomSummary,
};

use super::outbound::{Frame, PushError, try_deliver};

/// Result of a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
    /// The connection was never registered or has already left.
    UnknownConnection,
}

/// Result of a point-to-point delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    UnknownTarget,
    Undeliverable(PushError),
}

/// Which members of a room receive a broadcast.
///
/// The hub does not decide who should be skipped; callers pick the audience.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Audience {
    /// Skip members that have not logged in yet.
    pub named_only: bool,
    /// Skip this connection (usually the sender).
    pub except: Option<ConnectionId>,
}

impl Audience {
    pub fn everyone() -> Self {
        Self::default()
    }

    pub fn named() -> Self {
        Self {
            named_only: true,
            except: None,
        }
    }

    pub fn named_except(id: ConnectionId) -> Self {
        Self {
            named_only: true,
            except: Some(id),
        }
    }

    fn admits(&self, id: &ConnectionId, member: &Member) -> bool {
        if self.except.as_ref() == Some(id) {
            return false;
        }
        !self.named_only || member.nick.is_some()
    }
}

struct Member {
    /// Strong half of the connection's outbound buffer. Dropping it closes the buffer.
    outbound: mpsc::Sender<Frame>,
    room: Option<RoomName>,
    nick: Option<Nick>,
    login_seq: u64,
    connected_at: i64,
}

struct Room {
    /// Join order.
    members: Vec<ConnectionId>,
    history: ReplayBuffer,
}

pub struct Registry {
    members: HashMap<ConnectionId, Member>,
    rooms: HashMap<RoomName, Room>,
    replay_capacity: usize,
    last_message_id: u64,
    last_login_seq: u64,
}

impl Registry {
    pub fn new(replay_capacity: usize) -> Self {
        Self {
            members: HashMap::new(),
            rooms: HashMap::new(),
            replay_capacity,
            last_message_id: 0,
            last_login_seq: 0,
        }
    }

    /// Track a freshly upgraded connection. Returns `false` on a duplicate id.
    pub fn register(
        &mut self,
        id: ConnectionId,
        outbound: mpsc::Sender<Frame>,
        connected_at: i64,
    ) -> bool {
        if self.members.contains_key(&id) {
            return false;
        }
        self.members.insert(
            id,
            Member {
                outbound,
                room: None,
                nick: None,
                login_seq: 0,
                connected_at,
            },
        );
        true
    }

    #[cfg(test)]
    fn is_registered(&self, id: &ConnectionId) -> bool {
        self.members.contains_key(id)
    }

    /// Put a connection into `room`, moving it out of any previous room.
    ///
    /// Moving a named member clears its nick; it has to log in again.
    pub fn join(&mut self, id: &ConnectionId, room: RoomName) -> JoinOutcome {
        let previous = match self.members.get(id) {
            None => return JoinOutcome::UnknownConnection,
            Some(member) if member.room.as_ref() == Some(&room) => {
                return JoinOutcome::AlreadyMember;
            }
            Some(member) => member.room.clone(),
        };

        if let Some(previous) = previous {
            self.detach(id, &previous);
        }

        let replay_capacity = self.replay_capacity;
        self.rooms
            .entry(room.clone())
            .or_insert_with(|| Room {
                members: Vec::new(),
                history: ReplayBuffer::new(replay_capacity),
            })
            .members
            .push(id.clone());

        if let Some(member) = self.members.get_mut(id) {
            member.room = Some(room);
            member.nick = None;
        }
        JoinOutcome::Joined
    }

    /// Forget a connection entirely and close its outbound buffer.
    ///
    /// Returns `None` if the connection was not registered.
    pub fn leave(&mut self, id: &ConnectionId) -> Option<Departure> {
        self.evict(id).map(|member| Departure {
            room: member.room,
            nick: member.nick,
        })
    }

    /// Claim `nick` for a connection, scoped to the connection's room.
    ///
    /// Returns `None` when the connection is unknown.
    pub fn login(
        &mut self,
        id: &ConnectionId,
        nick: Nick,
    ) -> Option<Result<Briefing, LoginRejection>> {
        let member = self.members.get(id)?;
        if member.nick.is_some() {
            return Some(Err(LoginRejection::AlreadyLoggedIn));
        }
        let Some(room_name) = member.room.clone() else {
            return Some(Err(LoginRejection::RoomRequired));
        };
        if self.roster(&room_name).contains(&nick) {
            return Some(Err(LoginRejection::NickTaken));
        }

        self.last_login_seq += 1;
        let login_seq = self.last_login_seq;
        if let Some(member) = self.members.get_mut(id) {
            member.nick = Some(nick);
            member.login_seq = login_seq;
        }

        let history = self
            .rooms
            .get(&room_name)
            .map(|room| room.history.snapshot())
            .unwrap_or_default();
        Some(Ok(Briefing {
            roster: self.roster(&room_name),
            room: room_name,
            history,
        }))
    }

    /// Accept a chat message from a named member and retain it in its room.
    ///
    /// Returns `None` when the sender is unknown, anonymous or roomless.
    pub fn publish(&mut self, id: &ConnectionId, body: Value) -> Option<(RoomName, ChatMessage)> {
        let member = self.members.get(id)?;
        let nick = member.nick.clone()?;
        let room_name = member.room.clone()?;
        let room = self.rooms.get_mut(&room_name)?;

        self.last_message_id += 1;
        let message = ChatMessage::new(MessageId::new(self.last_message_id), nick, body);
        room.history.push(message.clone());
        Some((room_name, message))
    }

    /// Deliver `frame` to the room without ever waiting on a member.
    ///
    /// Members whose buffer is full or closed are evicted; their ids are returned.
    pub fn broadcast(
        &mut self,
        room: &RoomName,
        frame: &Frame,
        audience: &Audience,
    ) -> Vec<ConnectionId> {
        let Some(target_room) = self.rooms.get(room) else {
            return Vec::new();
        };

        let mut unresponsive = Vec::new();
        for id in &target_room.members {
            let Some(member) = self.members.get(id) else {
                continue;
            };
            if !audience.admits(id, member) {
                continue;
            }
            if try_deliver(&member.outbound, frame.clone()).is_err() {
                unresponsive.push(id.clone());
            }
        }

        for id in &unresponsive {
            self.evict(id);
        }
        unresponsive
    }

    /// Deliver `frame` to a single connection, wherever it is.
    pub fn relay(&self, target: &ConnectionId, frame: Frame) -> RelayOutcome {
        match self.members.get(target) {
            None => RelayOutcome::UnknownTarget,
            Some(member) => match try_deliver(&member.outbound, frame) {
                Ok(()) => RelayOutcome::Delivered,
                Err(e) => RelayOutcome::Undeliverable(e),
            },
        }
    }

    /// Named members of `room` in login order.
    pub fn roster(&self, room: &RoomName) -> Vec<Nick> {
        let Some(room) = self.rooms.get(room) else {
            return Vec::new();
        };
        let mut named: Vec<(u64, &Nick)> = room
            .members
            .iter()
            .filter_map(|id| self.members.get(id))
            .filter_map(|member| member.nick.as_ref().map(|nick| (member.login_seq, nick)))
            .collect();
        named.sort_by_key(|(seq, _)| *seq);
        named.into_iter().map(|(_, nick)| nick.clone()).collect()
    }

    /// All rooms sorted by name.
    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        let mut summaries: Vec<RoomSummary> = self
            .rooms
            .iter()
            .map(|(name, room)| RoomSummary {
                name: name.clone(),
                users: self.roster(name).len(),
                connections: room.members.len(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    pub fn room_detail(&self, name: &RoomName) -> Option<RoomDetail> {
        let room = self.rooms.get(name)?;
        let members = room
            .members
            .iter()
            .filter_map(|id| {
                self.members.get(id).map(|member| MemberDetail {
                    id: id.clone(),
                    nick: member.nick.clone(),
                    connected_at: member.connected_at,
                })
            })
            .collect();
        Some(RoomDetail {
            name: name.clone(),
            members,
            retained_messages: room.history.len(),
        })
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.members.len()
    }

    #[cfg(test)]
    fn has_room(&self, name: &RoomName) -> bool {
        self.rooms.contains_key(name)
    }

    /// The caller drops the returned member, which closes its buffer.
    fn evict(&mut self, id: &ConnectionId) -> Option<Member> {
        let member = self.members.remove(id)?;
        if let Some(room) = &member.room {
            self.detach(id, room);
        }
        Some(member)
    }

    fn detach(&mut self, id: &ConnectionId, room_name: &RoomName) {
        let now_empty = match self.rooms.get_mut(room_name) {
            Some(room) => {
                room.members.retain(|member| member != id);
                room.members.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.rooms.remove(room_name);
        }
    }

    #[cfg(test)]
    fn assert_no_empty_rooms(&self) {
        for (name, room) in &self.rooms {
            assert!(!room.members.is_empty(), "room '{name}' is empty");
            for id in &room.members {
                let member = self.members.get(id).expect("room member is registered");
                assert_eq!(member.room.as_ref(), Some(name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::outbound::channel;
    use serde_json::json;

    fn id(value: &str) -> ConnectionId {
        ConnectionId::new(value.to_string()).unwrap()
    }

    fn room(value: &str) -> RoomName {
        RoomName::new(value).unwrap()
    }

    fn nick(value: &str) -> Nick {
        Nick::new(value).unwrap()
    }

    fn register(registry: &mut Registry, name: &str, capacity: usize) -> mpsc::Receiver<Frame> {
        let (tx, rx) = channel(capacity);
        assert!(registry.register(id(name), tx, 1000));
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame.to_string());
        }
        frames
    }

    #[test]
    fn test_join_creates_room_and_leave_deletes_it() {
        // テスト項目: 最初の参加でルームが作られ、最後の退出でルームが消える
        // given (前提条件):
        let mut registry = Registry::new(0);
        let _rx = register(&mut registry, "a", 4);

        // when (操作):
        let outcome = registry.join(&id("a"), room("r1"));

        // then (期待する結果):
        assert_eq!(outcome, JoinOutcome::Joined);
        assert!(registry.has_room(&room("r1")));

        // when (操作):
        assert!(registry.leave(&id("a")).is_some());

        // then (期待する結果):
        assert!(!registry.has_room(&room("r1")));
        assert_eq!(registry.room_count(), 0);
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_join_twice_is_idempotent() {
        // テスト項目: 同じルームへの二重参加は一回の参加と同じ状態になる
        // given (前提条件):
        let mut registry = Registry::new(0);
        let _rx = register(&mut registry, "a", 4);
        registry.join(&id("a"), room("r1"));
        let before = registry.room_detail(&room("r1"));

        // when (操作):
        let outcome = registry.join(&id("a"), room("r1"));

        // then (期待する結果):
        assert_eq!(outcome, JoinOutcome::AlreadyMember);
        assert_eq!(registry.room_detail(&room("r1")), before);
        assert_eq!(registry.room_detail(&room("r1")).unwrap().members.len(), 1);
    }

    #[test]
    fn test_join_unknown_connection_is_noop() {
        // テスト項目: 未登録（切断済み）の接続の参加要求は何もしない
        // given (前提条件):
        let mut registry = Registry::new(0);

        // when (操作):
        let outcome = registry.join(&id("ghost"), room("r1"));

        // then (期待する結果):
        assert_eq!(outcome, JoinOutcome::UnknownConnection);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn test_moving_between_rooms_prunes_the_old_room() {
        // テスト項目: 別ルームへ移動すると空になった元のルームは削除される
        // given (前提条件):
        let mut registry = Registry::new(0);
        let _rx = register(&mut registry, "a", 4);
        registry.join(&id("a"), room("r1"));

        // when (操作):
        registry.join(&id("a"), room("r2"));

        // then (期待する結果):
        assert!(!registry.has_room(&room("r1")));
        assert!(registry.has_room(&room("r2")));
        registry.assert_no_empty_rooms();
    }

    #[test]
    fn test_no_empty_rooms_after_any_join_leave_sequence() {
        // テスト項目: 任意の参加・退出の列の後でも空のルームは残らない
        // given (前提条件):
        let mut registry = Registry::new(0);
        let names = ["a", "b", "c", "d"];
        let rooms = ["r1", "r2", "r3"];
        let mut receivers = Vec::new();
        for name in names {
            receivers.push(register(&mut registry, name, 4));
        }

        // when (操作) / then (期待する結果):
        // 決定的な擬似乱数で操作列を生成する
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..500 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let who = names[(state % names.len() as u64) as usize];
            let target = rooms[((state >> 8) % rooms.len() as u64) as usize];
            match (state >> 16) % 3 {
                0 | 1 => {
                    if !registry.is_registered(&id(who)) {
                        let (tx, rx) = channel(4);
                        registry.register(id(who), tx, 0);
                        receivers.push(rx);
                    }
                    registry.join(&id(who), room(target));
                }
                _ => {
                    registry.leave(&id(who));
                }
            }
            registry.assert_no_empty_rooms();
        }
    }

    #[test]
    fn test_leave_reports_room_and_nick() {
        // テスト項目: 退出時に接続が居たルームと名前が返り、未登録なら None になる
        // given (前提条件):
        let mut registry = Registry::new(0);
        let _rx = register(&mut registry, "a", 4);
        registry.join(&id("a"), room("r1"));
        registry.login(&id("a"), nick("alice")).unwrap().unwrap();

        // when (操作):
        let departure = registry.leave(&id("a"));
        let again = registry.leave(&id("a"));

        // then (期待する結果):
        assert_eq!(
            departure,
            Some(Departure {
                room: Some(room("r1")),
                nick: Some(nick("alice")),
            })
        );
        assert_eq!(again, None);
    }

    #[test]
    fn test_leave_closes_outbound_buffer() {
        // テスト項目: 退出すると接続の送信バッファが閉じられる
        // given (前提条件):
        let mut registry = Registry::new(0);
        let mut rx = register(&mut registry, "a", 4);
        registry.join(&id("a"), room("r1"));

        // when (操作):
        registry.leave(&id("a"));

        // then (期待する結果):
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_broadcast_drops_saturated_member() {
        // テスト項目: {A,B,C} のうち B のバッファが満杯の場合、A と C は受信し B はルームから外される
        // given (前提条件):
        let mut registry = Registry::new(0);
        let mut rx_a = register(&mut registry, "a", 4);
        let mut rx_b = register(&mut registry, "b", 1);
        let mut rx_c = register(&mut registry, "c", 4);
        for name in ["a", "b", "c"] {
            registry.join(&id(name), room("r1"));
        }
        registry.relay(&id("b"), Frame::from("filler"));

        // when (操作):
        let dropped = registry.broadcast(&room("r1"), &Frame::from("payload"), &Audience::everyone());

        // then (期待する結果):
        assert_eq!(dropped, vec![id("b")]);
        assert_eq!(drain(&mut rx_a), vec!["payload"]);
        assert_eq!(drain(&mut rx_c), vec!["payload"]);
        assert_eq!(drain(&mut rx_b), vec!["filler"]);
        assert!(matches!(
            rx_b.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        let detail = registry.room_detail(&room("r1")).unwrap();
        let remaining: Vec<&str> = detail.members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(remaining, vec!["a", "c"]);
        assert_eq!(registry.room_summaries()[0].connections, 2);
    }

    #[test]
    fn test_broadcast_respects_audience() {
        // テスト項目: 未ログインの接続と除外指定された接続には配信されない
        // given (前提条件):
        let mut registry = Registry::new(0);
        let mut rx_a = register(&mut registry, "a", 4);
        let mut rx_b = register(&mut registry, "b", 4);
        let mut rx_anon = register(&mut registry, "anon", 4);
        for name in ["a", "b", "anon"] {
            registry.join(&id(name), room("r1"));
        }
        registry.login(&id("a"), nick("alice")).unwrap().unwrap();
        registry.login(&id("b"), nick("bob")).unwrap().unwrap();

        // when (操作):
        registry.broadcast(
            &room("r1"),
            &Frame::from("typing"),
            &Audience::named_except(id("a")),
        );

        // then (期待する結果):
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec!["typing"]);
        assert!(drain(&mut rx_anon).is_empty());
    }

    #[test]
    fn test_broadcast_is_scoped_to_room() {
        // テスト項目: 他のルームの参加者には配信されない
        // given (前提条件):
        let mut registry = Registry::new(0);
        let mut rx_a = register(&mut registry, "a", 4);
        let mut rx_b = register(&mut registry, "b", 4);
        registry.join(&id("a"), room("r1"));
        registry.join(&id("b"), room("r2"));

        // when (操作):
        registry.broadcast(&room("r1"), &Frame::from("hi"), &Audience::everyone());

        // then (期待する結果):
        assert_eq!(drain(&mut rx_a), vec!["hi"]);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_login_rejects_duplicate_nick_in_same_room_only() {
        // テスト項目: 同じルーム内でのみニックネームの重複が拒否される
        // given (前提条件):
        let mut registry = Registry::new(0);
        let _rx_a = register(&mut registry, "a", 4);
        let _rx_b = register(&mut registry, "b", 4);
        let _rx_c = register(&mut registry, "c", 4);
        registry.join(&id("a"), room("r1"));
        registry.join(&id("b"), room("r1"));
        registry.join(&id("c"), room("r2"));
        registry.login(&id("a"), nick("alice")).unwrap().unwrap();

        // when (操作):
        let same_room = registry.login(&id("b"), nick("alice")).unwrap();
        let other_room = registry.login(&id("c"), nick("alice")).unwrap();

        // then (期待する結果):
        assert_eq!(same_room, Err(LoginRejection::NickTaken));
        assert!(other_room.is_ok());
        assert_eq!(registry.roster(&room("r1")), vec![nick("alice")]);
        let detail = registry.room_detail(&room("r1")).unwrap();
        assert_eq!(detail.members[1].nick, None);
    }

    #[test]
    fn test_login_requires_room_and_single_login() {
        // テスト項目: ルーム未参加のログインと二重ログインは拒否される
        // given (前提条件):
        let mut registry = Registry::new(0);
        let _rx = register(&mut registry, "a", 4);

        // when (操作):
        let without_room = registry.login(&id("a"), nick("alice")).unwrap();
        registry.join(&id("a"), room("r1"));
        let first = registry.login(&id("a"), nick("alice")).unwrap();
        let second = registry.login(&id("a"), nick("alicia")).unwrap();

        // then (期待する結果):
        assert_eq!(without_room, Err(LoginRejection::RoomRequired));
        assert!(first.is_ok());
        assert_eq!(second, Err(LoginRejection::AlreadyLoggedIn));
        assert_eq!(registry.roster(&room("r1")), vec![nick("alice")]);
    }

    #[test]
    fn test_login_briefing_lists_roster_in_login_order() {
        // テスト項目: ブリーフィングの参加者一覧がログイン順で本人を含む
        // given (前提条件):
        let mut registry = Registry::new(2);
        let _rx_a = register(&mut registry, "a", 4);
        let _rx_b = register(&mut registry, "b", 4);
        registry.join(&id("b"), room("r1"));
        registry.join(&id("a"), room("r1"));
        registry.login(&id("a"), nick("alice")).unwrap().unwrap();
        registry.publish(&id("a"), json!({ "text": "first" }));

        // when (操作):
        let briefing = registry.login(&id("b"), nick("bob")).unwrap().unwrap();

        // then (期待する結果):
        assert_eq!(briefing.room, room("r1"));
        assert_eq!(briefing.roster, vec![nick("alice"), nick("bob")]);
        assert_eq!(briefing.history.len(), 1);
        assert_eq!(briefing.history[0].id.to_string(), "msg_1");
    }

    #[test]
    fn test_login_unknown_connection_returns_none() {
        // テスト項目: 未登録の接続のログインは None を返す
        // given (前提条件):
        let mut registry = Registry::new(0);

        // when (操作):
        let result = registry.login(&id("ghost"), nick("alice"));

        // then (期待する結果):
        assert!(result.is_none());
    }

    #[test]
    fn test_publish_assigns_increasing_ids_and_caps_history() {
        // テスト項目: メッセージ ID は単調増加し、履歴は容量を超えない
        // given (前提条件):
        let mut registry = Registry::new(2);
        let _rx = register(&mut registry, "a", 4);
        registry.join(&id("a"), room("r1"));
        registry.login(&id("a"), nick("alice")).unwrap().unwrap();

        // when (操作):
        let ids: Vec<u64> = (0..3)
            .filter_map(|n| registry.publish(&id("a"), json!({ "text": n })))
            .map(|(_, message)| message.id.sequence())
            .collect();

        // then (期待する結果):
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(registry.room_detail(&room("r1")).unwrap().retained_messages, 2);
    }

    #[test]
    fn test_publish_requires_login() {
        // テスト項目: 未ログインの接続のメッセージは受け付けられない
        // given (前提条件):
        let mut registry = Registry::new(2);
        let _rx = register(&mut registry, "a", 4);
        registry.join(&id("a"), room("r1"));

        // when (操作):
        let result = registry.publish(&id("a"), json!({ "text": "hi" }));

        // then (期待する結果):
        assert!(result.is_none());
    }

    #[test]
    fn test_relay_to_unknown_target() {
        // テスト項目: 存在しない接続への個別送信は UnknownTarget になる
        // given (前提条件):
        let registry = Registry::new(0);

        // when (操作):
        let outcome = registry.relay(&id("ghost"), Frame::from("signal"));

        // then (期待する結果):
        assert_eq!(outcome, RelayOutcome::UnknownTarget);
    }

    #[test]
    fn test_register_rejects_duplicate_id() {
        // テスト項目: 同じ接続 ID の二重登録は拒否される
        // given (前提条件):
        let mut registry = Registry::new(0);
        let _rx = register(&mut registry, "a", 4);
        let (tx, _rx2) = channel(4);

        // when (操作):
        let result = registry.register(id("a"), tx, 0);

        // then (期待する結果):
        assert!(!result);
        assert_eq!(registry.connection_count(), 1);
    }
}
