//! Helpers for exercising handlers against a live hub.

use std::sync::Arc;

use kaiwa_shared::time::FixedClock;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, RoomName},
    hub::{Frame, HubHandle, Outbound, outbound},
    usecase::{ConnectionContext, EventHandler, LoginHandler},
};

pub(crate) fn spawn_hub(replay_capacity: usize) -> HubHandle {
    HubHandle::spawn(replay_capacity, Arc::new(FixedClock::new(1_700_000_000_000)))
}

/// One registered connection plus the receiving end of its outbound buffer.
pub(crate) struct Harness {
    pub ctx: ConnectionContext,
    pub rx: mpsc::Receiver<Frame>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_hub(spawn_hub(10), "self").await
    }

    pub async fn with_hub(hub: HubHandle, id: &str) -> Self {
        let id = ConnectionId::new(id.to_string()).unwrap();
        let (tx, rx) = outbound::channel(32);
        let ctx = ConnectionContext::new(id.clone(), Outbound::new(&tx), hub.clone());
        hub.register(id, tx).await;
        Self { ctx, rx }
    }

    /// Another connection on the same hub.
    pub async fn peer(&self, id: &str) -> Self {
        Self::with_hub(self.ctx.hub.clone(), id).await
    }

    pub async fn join(&mut self, room: &str) {
        let room = RoomName::new(room).unwrap();
        self.ctx.hub.join(self.ctx.id.clone(), room.clone()).await;
        self.ctx.session.room = Some(room);
    }

    pub async fn login(&mut self, nick: &str) {
        LoginHandler
            .handle(&mut self.ctx, json!({ "nick": nick }))
            .await;
        assert!(self.ctx.is_logged_in(), "login as '{nick}' failed");
    }

    /// Everything queued for this connection once the hub has caught up.
    pub async fn received(&mut self) -> Vec<Value> {
        self.ctx.hub.rooms().await;
        let mut events = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            events.push(serde_json::from_str(&frame).unwrap());
        }
        events
    }

    /// Events received, filtered down to one tag.
    pub async fn received_named(&mut self, event: &str) -> Vec<Value> {
        self.received()
            .await
            .into_iter()
            .filter(|value| value["event"] == event)
            .collect()
    }
}
