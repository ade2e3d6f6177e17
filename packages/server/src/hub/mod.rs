//! Registry/broadcaster ("hub").
//!
//! One task owns the [`Registry`] and applies [`HubCommand`]s one at a time in
//! arrival order. Everything else talks to it through a cloneable
//! [`HubHandle`]; nothing outside this task ever touches room membership.
//!
//! The command channel is bounded, so a caller waits for room in the queue
//! when the hub falls behind. Deliveries to members never wait: each one is a
//! non-blocking enqueue, and a member whose buffer is full when a broadcast
//! arrives is unregistered on the spot.

pub mod command;
pub mod outbound;
pub mod registry;

use std::sync::Arc;

use kaiwa_shared::time::Clock;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{
    domain::{
        Briefing, ConnectionId, Departure, LoginRejection, Nick, RoomDetail, RoomName,
        RoomSummary,
    },
    infrastructure::dto::websocket::ServerEvent,
};

pub use command::HubCommand;
pub use outbound::{Frame, Outbound, PushError};
pub use registry::{Audience, JoinOutcome, Registry, RelayOutcome};

/// Requests the hub may have queued before submitters start waiting.
pub const COMMAND_CAPACITY: usize = 1024;

/// Cloneable handle used by connections and HTTP handlers to reach the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Spawn the hub loop on the current Tokio runtime.
    ///
    /// The loop runs until every handle has been dropped.
    pub fn spawn(replay_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let (handle, receiver) = Self::bounded(COMMAND_CAPACITY);
        let hub = Hub {
            registry: Registry::new(replay_capacity),
            clock,
            commands: receiver,
        };
        tokio::spawn(hub.run());
        handle
    }

    fn bounded(capacity: usize) -> (Self, mpsc::Receiver<HubCommand>) {
        let (commands, receiver) = mpsc::channel(capacity);
        (Self { commands }, receiver)
    }

    async fn submit(&self, command: HubCommand) {
        if self.commands.send(command).await.is_err() {
            tracing::debug!("Hub loop has stopped, dropping request");
        }
    }

    pub async fn register(&self, id: ConnectionId, outbound: mpsc::Sender<Frame>) {
        self.submit(HubCommand::Register { id, outbound }).await;
    }

    pub async fn join(&self, id: ConnectionId, room: RoomName) {
        self.submit(HubCommand::Join { id, room }).await;
    }

    /// Unregister a connection.
    ///
    /// Resolves to the room and nick the hub held for it, which may include a
    /// login whose reply never reached the connection. `None` if the hub had
    /// already forgotten the connection.
    pub async fn leave(&self, id: ConnectionId) -> Option<Departure> {
        let (reply, response) = oneshot::channel();
        self.submit(HubCommand::Leave { id, reply }).await;
        response.await.ok().flatten()
    }

    pub async fn broadcast(&self, room: RoomName, frame: Frame, audience: Audience) {
        self.submit(HubCommand::Broadcast {
            room,
            frame,
            audience,
        })
        .await;
    }

    /// Assign an id to a chat message, retain it and deliver `new-msg` to the room.
    pub async fn publish(&self, id: ConnectionId, body: Value) {
        self.submit(HubCommand::Publish { id, body }).await;
    }

    pub async fn relay(&self, target: ConnectionId, frame: Frame) {
        self.submit(HubCommand::Relay { target, frame }).await;
    }

    /// Claim a nick in the connection's room.
    ///
    /// Returns `None` if the connection is no longer registered or the hub is gone.
    pub async fn login(
        &self,
        id: ConnectionId,
        nick: Nick,
    ) -> Option<Result<Briefing, LoginRejection>> {
        let (reply, response) = oneshot::channel();
        self.submit(HubCommand::Login { id, nick, reply }).await;
        response.await.ok()
    }

    pub async fn rooms(&self) -> Vec<RoomSummary> {
        let (reply, response) = oneshot::channel();
        self.submit(HubCommand::Rooms { reply }).await;
        response.await.unwrap_or_default()
    }

    pub async fn room(&self, name: RoomName) -> Option<RoomDetail> {
        let (reply, response) = oneshot::channel();
        self.submit(HubCommand::Room { name, reply }).await;
        response.await.ok().flatten()
    }
}

struct Hub {
    registry: Registry,
    clock: Arc<dyn Clock>,
    commands: mpsc::Receiver<HubCommand>,
}

impl Hub {
    async fn run(mut self) {
        tracing::debug!("Hub loop started");
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }
        tracing::debug!("Hub loop stopped");
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { id, outbound } => {
                let connected_at = self.clock.now_millis();
                if self.registry.register(id.clone(), outbound, connected_at) {
                    tracing::debug!(
                        "Connection '{}' registered (total={})",
                        id,
                        self.registry.connection_count()
                    );
                } else {
                    tracing::warn!("Connection '{}' is already registered", id);
                }
            }
            HubCommand::Join { id, room } => match self.registry.join(&id, room.clone()) {
                JoinOutcome::Joined => {
                    tracing::debug!("Connection '{}' joined room '{}'", id, room);
                }
                JoinOutcome::AlreadyMember => {
                    tracing::debug!("Connection '{}' is already in room '{}'", id, room);
                }
                JoinOutcome::UnknownConnection => {
                    tracing::debug!("Ignoring join of departed connection '{}'", id);
                }
            },
            HubCommand::Leave { id, reply } => {
                let departure = self.registry.leave(&id);
                if departure.is_some() {
                    tracing::debug!(
                        "Connection '{}' unregistered (total={}, rooms={})",
                        id,
                        self.registry.connection_count(),
                        self.registry.room_count()
                    );
                }
                let _ = reply.send(departure);
            }
            HubCommand::Broadcast {
                room,
                frame,
                audience,
            } => self.broadcast(&room, &frame, &audience),
            HubCommand::Login { id, nick, reply } => {
                let Some(result) = self.registry.login(&id, nick.clone()) else {
                    return;
                };
                if let Ok(briefing) = &result {
                    self.welcome(&id, &nick, briefing);
                }
                if reply.send(result).is_err() {
                    tracing::debug!("Login requester '{}' went away", id);
                }
            }
            HubCommand::Publish { id, body } => {
                let Some((room, message)) = self.registry.publish(&id, body) else {
                    tracing::debug!("Ignoring message from connection '{}' outside a room", id);
                    return;
                };
                let event = ServerEvent::new_message(&message);
                if let Some(frame) = event.encode() {
                    tracing::debug!("Delivering {} from '{}' to room '{}'", message.id, message.from, room);
                    self.broadcast(&room, &frame, &Audience::named());
                }
            }
            HubCommand::Relay { target, frame } => self.send_to(&target, frame),
            HubCommand::Rooms { reply } => {
                let _ = reply.send(self.registry.room_summaries());
            }
            HubCommand::Room { name, reply } => {
                let _ = reply.send(self.registry.room_detail(&name));
            }
        }
    }

    /// Greet a member that just logged in.
    ///
    /// Runs inside the same step as the login itself so no chat message can
    /// slip in between the roster and the replayed history.
    fn welcome(&mut self, id: &ConnectionId, nick: &Nick, briefing: &Briefing) {
        if let Some(frame) = ServerEvent::start(&briefing.roster).encode() {
            self.send_to(id, frame);
        }
        if let Some(frame) = ServerEvent::user_entered(nick).encode() {
            self.broadcast(&briefing.room, &frame, &Audience::named_except(id.clone()));
        }
        if let Some(frame) = ServerEvent::previous_messages(&briefing.history).encode() {
            self.send_to(id, frame);
        }
    }

    fn send_to(&mut self, target: &ConnectionId, frame: Frame) {
        match self.registry.relay(target, frame) {
            RelayOutcome::Delivered => {}
            RelayOutcome::UnknownTarget => {
                tracing::warn!("Delivery target '{}' not found", target);
            }
            RelayOutcome::Undeliverable(e) => {
                tracing::warn!("Failed to deliver to '{}': {}", target, e);
            }
        }
    }

    fn broadcast(&mut self, room: &RoomName, frame: &Frame, audience: &Audience) {
        for id in self.registry.broadcast(room, frame, audience) {
            tracing::warn!(
                "Dropped unresponsive connection '{}' from room '{}'",
                id,
                room
            );
        }
    }
}
