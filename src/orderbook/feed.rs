//! Depth stream feed adapter.
//!
//! Owns the WebSocket connection lifecycle (exponential backoff
//! reconnect, ping/pong handling) and hands raw text frames to the
//! Ingress Dispatcher rather than parsing them itself, the dispatcher
//! owns parsing, not the transport adapter.
//!
//! Exposes a `connected()` status bit for operational visibility; this is
//! purely observational and never a protocol input.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Maximum reconnection delay.
const MAX_RECONNECT_DELAY_SECS: u64 = 30;

/// Depth-stream feed for a single symbol. Reconnects with exponential
/// backoff (1s, 2s, 4s, ... capped at 30s) and forwards each text frame
/// verbatim over an unbounded channel for the dispatcher to parse.
pub struct DepthFeed {
    symbol: String,
    base_url: String,
    connected: Arc<AtomicBool>,
}

impl DepthFeed {
    /// Creates a feed for `symbol` against `base_url`. WS stream names
    /// are lowercased.
    pub fn new(symbol: String, base_url: String) -> Self {
        Self {
            symbol,
            base_url,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Spawns the background task that owns the connection loop, and
    /// returns a receiver of raw text frames for the dispatcher to
    /// parse, plus a cheap `connected()` handle the caller can poll
    /// after `self` has been consumed.
    pub fn start(self) -> (tokio::task::JoinHandle<()>, mpsc::UnboundedReceiver<String>, Arc<AtomicBool>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connected = Arc::clone(&self.connected);
        let handle = tokio::spawn(async move {
            let mut retry_count = 0u32;

            loop {
                match self.connect_and_process(&sender).await {
                    Ok(()) => {
                        info!(symbol = %self.symbol, "Depth feed closed normally");
                        break;
                    }
                    Err(err) => {
                        self.connected.store(false, Ordering::Release);
                        let delay_secs = std::cmp::min(2_u64.pow(retry_count), MAX_RECONNECT_DELAY_SECS);
                        warn!(
                            symbol = %self.symbol,
                            error = %err,
                            retry_count,
                            delay_secs,
                            "Depth feed disconnected, retrying with exponential backoff"
                        );
                        sleep(Duration::from_secs(delay_secs)).await;
                        retry_count = if retry_count >= 10 { 0 } else { retry_count + 1 };
                    }
                }
            }
        });
        (handle, receiver, connected)
    }

    async fn connect_and_process(
        &self,
        sender: &mpsc::UnboundedSender<String>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let stream_name = format!("{}@depth@100ms", self.symbol.to_lowercase());
        let url = format!("{}/{}", self.base_url, stream_name);

        info!(symbol = %self.symbol, url = %url, "Connecting to depth stream");
        let (ws_stream, _) = connect_async(&url).await?;
        self.connected.store(true, Ordering::Release);
        info!(symbol = %self.symbol, "Depth stream connected");

        let (mut write, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if sender.send(text.to_string()).is_err() {
                        info!(symbol = %self.symbol, "Dispatcher channel closed, stopping feed");
                        break;
                    }
                }
                Ok(Message::Ping(data)) => {
                    debug!(symbol = %self.symbol, "Received ping, sending pong");
                    if write.send(Message::Pong(data)).await.is_err() {
                        warn!(symbol = %self.symbol, "Failed to send pong");
                        break;
                    }
                }
                Ok(Message::Pong(_)) => {}
                Ok(Message::Close(frame)) => {
                    info!(symbol = %self.symbol, frame = ?frame, "Depth stream close frame received");
                    break;
                }
                Ok(Message::Binary(_)) => {
                    warn!(symbol = %self.symbol, "Received unexpected binary message");
                }
                Ok(Message::Frame(_)) => {}
                Err(err) => {
                    error!(symbol = %self.symbol, error = %err, "Depth stream read error");
                    break;
                }
            }
        }

        self.connected.store(false, Ordering::Release);
        Err("depth stream disconnected".into())
    }
}
