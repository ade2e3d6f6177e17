//! Per-connection outbound buffer.
//!
//! The hub holds the only strong [`mpsc::Sender`] of a connection's buffer.
//! The connection itself keeps an [`Outbound`] built on a weak sender, so
//! once the hub drops its entry the buffer closes and the write loop sees
//! the end of the stream.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

/// One encoded text frame, shared between all recipients of a broadcast.
pub type Frame = Arc<str>;

/// Create a bounded outbound buffer.
pub fn channel(capacity: usize) -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
    mpsc::channel(capacity.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("outbound buffer is closed")]
    Closed,

    #[error("outbound buffer is full")]
    Full,
}

/// Non-blocking enqueue used for every delivery.
pub fn try_deliver(sender: &mpsc::Sender<Frame>, frame: Frame) -> Result<(), PushError> {
    sender.try_send(frame).map_err(|e| match e {
        TrySendError::Full(_) => PushError::Full,
        TrySendError::Closed(_) => PushError::Closed,
    })
}

/// A connection's handle on its own outbound buffer.
#[derive(Debug, Clone)]
pub struct Outbound {
    sender: mpsc::WeakSender<Frame>,
}

impl Outbound {
    pub fn new(sender: &mpsc::Sender<Frame>) -> Self {
        Self {
            sender: sender.downgrade(),
        }
    }

    pub fn push(&self, frame: Frame) -> Result<(), PushError> {
        let sender = self.sender.upgrade().ok_or(PushError::Closed)?;
        try_deliver(&sender, frame)
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .upgrade()
            .is_none_or(|sender| sender.is_closed())
    }
}
