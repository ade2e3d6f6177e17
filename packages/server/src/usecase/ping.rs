//! Application-level liveness probe.

use async_trait::async_trait;
use serde_json::Value;

use crate::infrastructure::dto::websocket::ServerEvent;

use super::{context::ConnectionContext, dispatch::EventHandler};

#[derive(Debug, Clone, Copy, Default)]
pub struct PingHandler;

#[async_trait]
impl EventHandler for PingHandler {
    async fn handle(&self, ctx: &mut ConnectionContext, _data: Value) {
        ctx.send(&ServerEvent::Pong);
    }
}
