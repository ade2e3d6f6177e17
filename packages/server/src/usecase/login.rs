//! UseCase: ログイン処理
//!
//! 名前の検証はここで、ルーム内での重複チェックと入室通知はハブで行う。
//! ハブ側で `start` / `ue` / `previous-msg` をまとめて送るため、
//! ログインの直後にチャットメッセージが割り込むことはない。

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    domain::{LoginRejection, Nick},
    infrastructure::dto::websocket::{LoginData, ServerEvent},
};

use super::{context::ConnectionContext, dispatch::EventHandler};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoginHandler;

impl LoginHandler {
    fn reject(ctx: &ConnectionContext, rejection: LoginRejection) {
        tracing::debug!("Login of '{}' rejected: {}", ctx.id, rejection);
        let event = if rejection.needs_room() {
            ServerEvent::force_room(&rejection)
        } else {
            ServerEvent::force_login(&rejection)
        };
        ctx.send(&event);
    }
}

#[async_trait]
impl EventHandler for LoginHandler {
    async fn handle(&self, ctx: &mut ConnectionContext, data: Value) {
        if ctx.is_logged_in() {
            return Self::reject(ctx, LoginRejection::AlreadyLoggedIn);
        }

        let request: LoginData = match serde_json::from_value(data) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Failed to parse login data from '{}': {}", ctx.id, e);
                return;
            }
        };
        let Ok(nick) = Nick::new(&request.nick) else {
            return Self::reject(ctx, LoginRejection::EmptyNick);
        };
        if ctx.session.room.is_none() {
            return Self::reject(ctx, LoginRejection::RoomRequired);
        }

        match ctx.hub.login(ctx.id.clone(), nick.clone()).await {
            Some(Ok(briefing)) => {
                tracing::info!(
                    "'{}' logged in as '{}' in room '{}'",
                    ctx.id,
                    nick,
                    briefing.room
                );
                ctx.session.nick = Some(nick);
            }
            Some(Err(rejection)) => Self::reject(ctx, rejection),
            None => tracing::debug!("'{}' left before its login completed", ctx.id),
        }
    }
}
