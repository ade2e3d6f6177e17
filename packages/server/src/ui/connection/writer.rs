//! Write loop: the only code that writes to the transport.

use std::{fmt, time::Duration};

use axum::{body::Bytes, extract::ws::Message};
use futures_util::{Sink, SinkExt};
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior},
};

use crate::{config::Keepalive, hub::Frame};

/// Why the write loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEnd {
    /// The outbound buffer was closed and everything queued was flushed.
    Drained,
    TimedOut,
    Failed(String),
}

impl fmt::Display for WriteEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteEnd::Drained => f.write_str("outbound buffer closed"),
            WriteEnd::TimedOut => f.write_str("write deadline exceeded"),
            WriteEnd::Failed(e) => write!(f, "write failed: {e}"),
        }
    }
}

async fn write_with_deadline<S>(sink: &mut S, message: Message, wait: Duration) -> Result<(), WriteEnd>
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    match tokio::time::timeout(wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(WriteEnd::Failed(e.to_string())),
        Err(_) => Err(WriteEnd::TimedOut),
    }
}

/// Drain `frames` into `sink` and keep the peer alive with periodic pings.
///
/// Every write, pings included, must finish within the keepalive write wait.
/// When the buffer is closed a close frame is sent before returning.
pub async fn write_loop<S>(
    mut sink: S,
    mut frames: mpsc::Receiver<Frame>,
    keepalive: Keepalive,
) -> WriteEnd
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let wait = keepalive.write_wait();
    let mut ping = tokio::time::interval_at(
        Instant::now() + keepalive.ping_period(),
        keepalive.ping_period(),
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    // Best effort: the peer may already be gone.
                    let _ = write_with_deadline(&mut sink, Message::Close(None), wait).await;
                    return WriteEnd::Drained;
                };
                if let Err(end) = write_with_deadline(&mut sink, Message::Text(frame.to_string().into()), wait).await {
                    return end;
                }
            }
            _ = ping.tick() => {
                if let Err(end) = write_with_deadline(&mut sink, Message::Ping(Bytes::new()), wait).await {
                    return end;
                }
            }
        }
    }
}
