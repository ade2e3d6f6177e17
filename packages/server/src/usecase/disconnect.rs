//! UseCase: 切断処理
//!
//! 接続の後始末で一度だけ呼ばれる。ハブからの登録解除は呼び出し側が先に済ませているので、
//! ここではログイン済みだった場合にルームへ `ul` を送るだけ。

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    hub::Audience,
    infrastructure::dto::websocket::{ServerEvent, UserLeftData},
};

use super::{context::ConnectionContext, dispatch::EventHandler};

#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectHandler;

#[async_trait]
impl EventHandler for DisconnectHandler {
    async fn handle(&self, ctx: &mut ConnectionContext, _data: Value) {
        let Some(nick) = ctx.session.nick.take() else {
            return;
        };

        tracing::info!("'{}' ({}) left", nick, ctx.id);
        let event = ServerEvent::UserLeft {
            data: UserLeftData {
                nick: nick.into_string(),
                id: ctx.id.as_str().to_string(),
            },
        };
        ctx.broadcast(&event, Audience::named_except(ctx.id.clone())).await;
        ctx.session.room = None;
    }
}
