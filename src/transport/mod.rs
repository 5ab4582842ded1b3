//! Streaming transport for server-pushed progress.
//!
//! A [`Channel`] reports exactly four kinds of events and carries no business logic. It never
//! reconnects: once closed, observability of the current run is gone and a new run needs a new
//! channel.

mod websocket;

pub use websocket::WebSocketTransport;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::{mpsc, oneshot};

/// Events of one channel, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Message(String),
    /// Transport-level failure. Always followed by `Close`.
    Error(String),
    Close { code: Option<u16> },
}

/// Handle to one streaming connection. Dropping the handle closes the connection.
pub struct Channel {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    open: Arc<AtomicBool>,
    close_tx: Option<oneshot::Sender<()>>,
}

impl Channel {
    pub fn new(
        events: mpsc::UnboundedReceiver<ChannelEvent>,
        open: Arc<AtomicBool>,
        close_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            events,
            open,
            close_tx: Some(close_tx),
        }
    }

    /// Whether the connection is currently open (not merely whether it ever was).
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Next event; `None` once the connection task has finished.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Ask the connection to close. Idempotent.
    pub fn close(&mut self) {
        self.open.store(false, Ordering::Release);
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Factory for progress channels. The returned channel reports `Open` or `Error` first.
pub trait Transport: Send + Sync {
    fn connect(&self) -> Channel;
}
