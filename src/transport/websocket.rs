use super::{Channel, ChannelEvent, Transport};
use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

/// WebSocket progress channel at the server's `/api/ws`.
pub struct WebSocketTransport {
    url: Url,
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(url: Url, connect_timeout: Duration) -> Self {
        Self {
            url,
            connect_timeout,
        }
    }
}

impl Transport for WebSocketTransport {
    fn connect(&self) -> Channel {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ChannelEvent>();
        let (close_tx, close_rx) = oneshot::channel::<()>();
        let open = Arc::new(AtomicBool::new(false));
        tokio::spawn(run_socket(
            self.url.clone(),
            self.connect_timeout,
            event_tx,
            open.clone(),
            close_rx,
        ));
        Channel::new(event_rx, open, close_tx)
    }
}

/// Own one connection: connect, forward frames as events, honour close requests.
async fn run_socket(
    url: Url,
    connect_timeout: Duration,
    event_tx: mpsc::UnboundedSender<ChannelEvent>,
    open: Arc<AtomicBool>,
    mut close_rx: oneshot::Receiver<()>,
) {
    debug!("connecting to {url}");
    let stream = match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            warn!("progress channel connect failed: {e}");
            let _ = event_tx.send(ChannelEvent::Error(format!("connect failed: {e}")));
            let _ = event_tx.send(ChannelEvent::Close { code: None });
            return;
        }
        Err(_) => {
            warn!("progress channel connect timed out after {connect_timeout:?}");
            let _ = event_tx.send(ChannelEvent::Error(format!(
                "connect timed out after {connect_timeout:?}"
            )));
            let _ = event_tx.send(ChannelEvent::Close { code: None });
            return;
        }
    };

    open.store(true, Ordering::Release);
    let _ = event_tx.send(ChannelEvent::Open);

    let (mut write, mut read) = stream.split();
    let mut close_code = None;
    let mut closing = false;

    loop {
        tokio::select! {
            // A dropped sender counts as a close request as well.
            _ = &mut close_rx, if !closing => {
                closing = true;
                open.store(false, Ordering::Release);
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!("close frame not sent: {e}");
                    break;
                }
            }
            next = read.next() => match next {
                Some(Ok(Message::Text(text))) => {
                    let _ = event_tx.send(ChannelEvent::Message(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    close_code = frame.map(|f| u16::from(f.code));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    if !closing {
                        let _ = event_tx.send(ChannelEvent::Error(e.to_string()));
                    }
                    break;
                }
                None => break,
            }
        }
    }

    open.store(false, Ordering::Release);
    let _ = event_tx.send(ChannelEvent::Close { code: close_code });
    debug!("progress channel closed (code {close_code:?})");
}
