//! UseCase: メッセージ送信処理
//!
//! ID の採番・履歴への追加・配信はハブが一度に行う。ここではログイン済みかを確認して
//! 本文をそのまま渡すだけ。

use async_trait::async_trait;
use serde_json::Value;

use crate::infrastructure::dto::websocket::{SendMessageData, ServerEvent};

use super::{context::ConnectionContext, dispatch::EventHandler};

pub const LOGIN_REQUIRED: &str = "You need to be logged in to send a message.";

#[derive(Debug, Clone, Copy, Default)]
pub struct SendMessageHandler;

#[async_trait]
impl EventHandler for SendMessageHandler {
    async fn handle(&self, ctx: &mut ConnectionContext, data: Value) {
        if !ctx.is_logged_in() {
            tracing::debug!("'{}' tried to send a message before logging in", ctx.id);
            ctx.send(&ServerEvent::force_login(LOGIN_REQUIRED));
            return;
        }

        let request: SendMessageData = match serde_json::from_value(data) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Failed to parse message data from '{}': {}", ctx.id, e);
                return;
            }
        };
        ctx.hub.publish(ctx.id.clone(), request.m).await;
    }
}
