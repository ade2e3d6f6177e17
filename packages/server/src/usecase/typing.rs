//! Typing indicator relay.

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    hub::Audience,
    infrastructure::dto::websocket::{ServerEvent, TypingData},
};

use super::{context::ConnectionContext, dispatch::EventHandler};

#[derive(Debug, Clone, Copy, Default)]
pub struct TypingHandler;

#[async_trait]
impl EventHandler for TypingHandler {
    async fn handle(&self, ctx: &mut ConnectionContext, data: Value) {
        let Some(nick) = ctx.session.nick.clone() else {
            return;
        };
        let Value::Bool(status) = data else {
            tracing::warn!("Invalid typing payload from '{}': {}", ctx.id, data);
            return;
        };

        let event = ServerEvent::Typing {
            data: TypingData {
                status,
                nick: nick.into_string(),
            },
        };
        ctx.broadcast(&event, Audience::named_except(ctx.id.clone())).await;
    }
}
