//! Read loop: the only code that reads from the transport.

use std::{fmt, time::Duration};

use axum::extract::ws::Message;
use futures_util::{Stream, StreamExt};
use tokio::time::Instant;

use crate::{
    infrastructure::dto::websocket::{Envelope, tag},
    usecase::{ConnectionContext, DispatchTable},
};

/// Why the read loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEnd {
    /// Close frame or end of stream.
    Closed,
    /// The client sent the `disconnect` event.
    Disconnect,
    /// No pong within the pong wait.
    DeadlineExceeded,
    Failed(String),
}

impl fmt::Display for ReadEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadEnd::Closed => f.write_str("closed by peer"),
            ReadEnd::Disconnect => f.write_str("disconnect requested"),
            ReadEnd::DeadlineExceeded => f.write_str("pong deadline exceeded"),
            ReadEnd::Failed(e) => write!(f, "read failed: {e}"),
        }
    }
}

/// Decode frames one at a time and run the matching handler inline.
///
/// The liveness deadline is pushed back only when a pong arrives.
pub async fn read_loop<S, E>(
    mut stream: S,
    ctx: &mut ConnectionContext,
    dispatch: &DispatchTable,
    pong_wait: Duration,
) -> ReadEnd
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let mut deadline = Instant::now() + pong_wait;
    loop {
        let message = match tokio::time::timeout_at(deadline, stream.next()).await {
            Err(_) => return ReadEnd::DeadlineExceeded,
            Ok(None) => return ReadEnd::Closed,
            Ok(Some(Err(e))) => return ReadEnd::Failed(e.to_string()),
            Ok(Some(Ok(message))) => message,
        };

        let envelope = match &message {
            Message::Text(text) => Envelope::decode(text.as_str().as_bytes()),
            Message::Binary(bytes) => Envelope::decode(bytes),
            Message::Pong(_) => {
                deadline = Instant::now() + pong_wait;
                continue;
            }
            Message::Ping(_) => continue,
            Message::Close(_) => return ReadEnd::Closed,
        };

        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Discarding malformed frame from '{}': {}", ctx.id, e);
                continue;
            }
        };

        if envelope.event == tag::DISCONNECT {
            return ReadEnd::Disconnect;
        }
        if !dispatch.dispatch(&envelope.event, ctx, envelope.data).await {
            tracing::debug!("Unknown event '{}' from '{}'", envelope.event, ctx.id);
        }
    }
}
