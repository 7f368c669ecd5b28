//! Relay connection for the viewer
//!
//! The viewer-to-relay leg reconnects with exponential backoff (doubling per
//! failed attempt, capped), unlike the relay's fixed-interval upstream leg.
//! Incoming frames are parsed here; malformed frames are logged and
//! discarded, never fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use vigil_common::{Error, RelayMessage, Result};

use crate::correlator::FeedbackSink;

const BASE_DELAY: Duration = Duration::from_secs(1);

/// Maximum reconnect delay for the viewer leg
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Reconnect delay for a given failed-attempt count: doubles per attempt
/// from one second, capped at [`MAX_RECONNECT_DELAY`].
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    BASE_DELAY
        .checked_mul(factor.min(u32::MAX as u64) as u32)
        .map_or(MAX_RECONNECT_DELAY, |d| d.min(MAX_RECONNECT_DELAY))
}

/// Handle to the viewer's relay connection.
///
/// Sending succeeds only while the connection is up; a failed send is
/// surfaced so the caller can keep its correlation state for retry.
#[derive(Clone)]
pub struct ViewerConnection {
    outbound: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
}

impl ViewerConnection {
    /// Spawn the connection task. Returns the send handle and the stream of
    /// parsed broadcast messages.
    pub fn spawn(url: String) -> (Self, mpsc::UnboundedReceiver<RelayMessage>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel::<RelayMessage>();
        let connected = Arc::new(AtomicBool::new(false));

        tokio::spawn(run(url, outbound_rx, incoming_tx, connected.clone()));

        (
            Self {
                outbound: outbound_tx,
                connected,
            },
            incoming_rx,
        )
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl FeedbackSink for ViewerConnection {
    fn send_frame(&mut self, frame: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::Transport("not connected to relay".into()));
        }
        self.outbound
            .send(frame.to_string())
            .map_err(|_| Error::Transport("relay connection task ended".into()))
    }
}

async fn run(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<String>,
    incoming: mpsc::UnboundedSender<RelayMessage>,
    connected: Arc<AtomicBool>,
) {
    let mut attempts: u32 = 0;
    loop {
        info!("Connecting to relay: {}", url);
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                info!("Relay connected");
                attempts = 0;
                connected.store(true, Ordering::SeqCst);

                let (mut sink, mut source) = stream.split();
                loop {
                    tokio::select! {
                        frame = outbound.recv() => match frame {
                            Some(text) => {
                                if let Err(e) = sink.send(Message::Text(text)).await {
                                    warn!("Relay send failed: {}", e);
                                    break;
                                }
                            }
                            None => return,
                        },
                        msg = source.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                match RelayMessage::parse(&text) {
                                    Ok(message) => {
                                        debug!("Received {} frame", message.kind());
                                        if incoming.send(message).is_err() {
                                            return;
                                        }
                                    }
                                    Err(e) => {
                                        // Malformed frames are discarded
                                        warn!("Discarding unparseable frame: {}", e);
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!("Relay closed the connection");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("Relay transport error: {}", e);
                                break;
                            }
                        },
                    }
                }

                connected.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                warn!("Relay connect failed: {}", e);
            }
        }

        let delay = backoff_delay(attempts);
        attempts = attempts.saturating_add(1);
        info!("Reconnecting in {:?} (attempt {})", delay, attempts);
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(4), Duration::from_secs(16));
    }

    #[test]
    fn backoff_caps_at_maximum() {
        assert_eq!(backoff_delay(5), Duration::from_secs(30));
        assert_eq!(backoff_delay(10), MAX_RECONNECT_DELAY);
        assert_eq!(backoff_delay(63), MAX_RECONNECT_DELAY);
        assert_eq!(backoff_delay(u32::MAX), MAX_RECONNECT_DELAY);
    }

    #[test]
    fn send_fails_while_disconnected() {
        let (outbound, _rx) = mpsc::unbounded_channel();
        let mut conn = ViewerConnection {
            outbound,
            connected: Arc::new(AtomicBool::new(false)),
        };
        assert!(conn.send_frame("frame").is_err());

        conn.connected.store(true, Ordering::SeqCst);
        assert!(conn.send_frame("frame").is_ok());
    }
}
