//! Upstream connector
//!
//! Owns the single connection to the analysis process. A lone supervision
//! task drives connect / relay / reconnect, so at most one reconnect attempt
//! is ever pending and a stale connection handle is never used to send:
//! the outbound sender is replaced atomically on every (re)connect and
//! cleared on loss.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::registry::ConsumerRegistry;

/// Fixed reconnect interval for the server-to-upstream leg.
///
/// Deliberately not exponential: upstream outages are assumed brief, and
/// the consumer leg carries its own exponential backoff.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Upstream connection state, readable for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamState {
    Disconnected,
    Connecting,
    Connected,
}

impl UpstreamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamState::Disconnected => "disconnected",
            UpstreamState::Connecting => "connecting",
            UpstreamState::Connected => "connected",
        }
    }
}

/// Connector for the single upstream analysis process
pub struct UpstreamConnector {
    url: String,
    state: Mutex<UpstreamState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl UpstreamConnector {
    pub fn new(url: String) -> Self {
        Self {
            url,
            state: Mutex::new(UpstreamState::Disconnected),
            outbound: Mutex::new(None),
        }
    }

    /// Current connection state
    pub fn state(&self) -> UpstreamState {
        *self.state.lock().expect("upstream state lock poisoned")
    }

    fn set_state(&self, state: UpstreamState) {
        *self.state.lock().expect("upstream state lock poisoned") = state;
    }

    /// Forward a text frame to the upstream process.
    ///
    /// Returns false when disconnected: the frame is silently dropped with
    /// no buffering. At-most-once, by design.
    pub fn send(&self, text: String) -> bool {
        let outbound = self.outbound.lock().expect("upstream outbound lock poisoned");
        match outbound.as_ref() {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        }
    }

    fn install_outbound(&self, tx: mpsc::UnboundedSender<String>) {
        *self.outbound.lock().expect("upstream outbound lock poisoned") = Some(tx);
    }

    fn clear_outbound(&self) {
        *self.outbound.lock().expect("upstream outbound lock poisoned") = None;
    }

    /// Supervision loop: connect, relay until the transport drops, then
    /// retry on a fixed interval. Runs for the life of the process.
    pub async fn run(self: Arc<Self>, registry: Arc<ConsumerRegistry>) {
        loop {
            self.set_state(UpstreamState::Connecting);
            info!("Connecting to upstream: {}", self.url);

            match connect_async(self.url.as_str()).await {
                Ok((stream, _response)) => {
                    info!("Upstream connected");
                    self.set_state(UpstreamState::Connected);

                    let (mut sink, mut source) = stream.split();
                    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
                    self.install_outbound(tx);

                    loop {
                        tokio::select! {
                            frame = rx.recv() => match frame {
                                Some(text) => {
                                    if let Err(e) = sink.send(Message::Text(text)).await {
                                        warn!("Upstream send failed: {}", e);
                                        break;
                                    }
                                }
                                // Sender replaced or dropped; connection torn down
                                None => break,
                            },
                            incoming = source.next() => match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    // Opaque passthrough: broadcast verbatim in receipt order
                                    registry.broadcast(&text);
                                }
                                Some(Ok(Message::Close(_))) => {
                                    info!("Upstream sent close frame");
                                    break;
                                }
                                Some(Ok(other)) => {
                                    debug!("Ignoring non-text upstream frame: {:?}", other);
                                }
                                Some(Err(e)) => {
                                    warn!("Upstream transport error: {}", e);
                                    break;
                                }
                                None => {
                                    info!("Upstream stream ended");
                                    break;
                                }
                            },
                        }
                    }

                    self.clear_outbound();
                    self.set_state(UpstreamState::Disconnected);
                    warn!(
                        "Upstream disconnected, reconnecting in {}s",
                        RECONNECT_INTERVAL.as_secs()
                    );
                }
                Err(e) => {
                    self.set_state(UpstreamState::Disconnected);
                    warn!(
                        "Upstream connect failed: {}, retrying in {}s",
                        e,
                        RECONNECT_INTERVAL.as_secs()
                    );
                }
            }

            tokio::time::sleep(RECONNECT_INTERVAL).await;
        }
    }
}
