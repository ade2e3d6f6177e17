//! One WebSocket connection: setup, the read/write loop pair and teardown.

pub mod reader;
pub mod writer;

use std::sync::Arc;

use axum::extract::ws::WebSocket;
use futures_util::StreamExt;
use serde_json::Value;

use crate::{
    domain::ConnectionId,
    hub::{Outbound, outbound},
    infrastructure::dto::websocket::tag,
    ui::state::AppState,
    usecase::ConnectionContext,
};

use reader::read_loop;
use writer::write_loop;

/// Drive an upgraded socket until either loop stops, then clean up.
///
/// The hub holds the only strong handle on the outbound buffer. Once it lets
/// go (on leave or eviction) the write loop flushes, sends a close frame and
/// exits.
pub async fn serve_connection(socket: WebSocket, state: Arc<AppState>) {
    let id = ConnectionId::generate();
    let (buffer, frames) = outbound::channel(state.config.outbound_capacity);
    let mut ctx = ConnectionContext::new(id.clone(), Outbound::new(&buffer), state.hub.clone());
    state.hub.register(id.clone(), buffer).await;

    if !state.config.rooms {
        let room = state.config.default_room.clone();
        state.hub.join(id.clone(), room.clone()).await;
        ctx.session.room = Some(room);
    }
    tracing::info!("Connection '{}' opened", id);

    let keepalive = state.config.keepalive;
    let (sink, stream) = socket.split();
    let mut write_task = tokio::spawn(write_loop(sink, frames, keepalive));

    {
        let reading = read_loop(stream, &mut ctx, &state.dispatch, keepalive.pong_wait());
        tokio::select! {
            end = reading => tracing::debug!("Reader of '{}' stopped: {}", id, end),
            end = &mut write_task => match end {
                Ok(end) => tracing::debug!("Writer of '{}' stopped: {}", id, end),
                Err(e) => tracing::error!("Writer of '{}' panicked: {}", id, e),
            },
        }
    }

    // The reader may have been dropped while a login was in flight, so the
    // hub's record of the nick and room wins over the session's.
    if let Some(departure) = state.hub.leave(id.clone()).await {
        ctx.session.nick = departure.nick;
        ctx.session.room = departure.room;
    }
    if let Some(handler) = state.dispatch.get(tag::DISCONNECT) {
        handler.handle(&mut ctx, Value::Null).await;
    }

    if !write_task.is_finished() {
        match tokio::time::timeout(keepalive.write_wait(), &mut write_task).await {
            Ok(Ok(end)) => tracing::debug!("Writer of '{}' stopped: {}", id, end),
            Ok(Err(e)) => tracing::error!("Writer of '{}' panicked: {}", id, e),
            Err(_) => write_task.abort(),
        }
    }
    tracing::info!("Connection '{}' closed", id);
}
