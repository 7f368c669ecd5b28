//! Consumer connection registry and liveness monitoring
//!
//! The registry is the single shared resource mutated from multiple call
//! sites (accept, close, liveness sweep). All mutation happens under one
//! mutex with no await inside the critical section.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Liveness sweep period. A peer that never answers a probe is detected
/// within two periods.
pub const LIVENESS_PERIOD: Duration = Duration::from_secs(30);

/// Outbound frame for one consumer connection.
///
/// The registry never touches the socket directly; each consumer owns a
/// writer task draining these frames into its WebSocket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping,
    Close,
}

struct Consumer {
    tx: mpsc::UnboundedSender<Frame>,
    /// Set by a pong, cleared before each probe
    alive: bool,
}

/// Registry of live consumer connections
#[derive(Default)]
pub struct ConsumerRegistry {
    inner: Mutex<HashMap<Uuid, Consumer>>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a consumer on accept. Returns its opaque identifier.
    pub fn register(&self, tx: mpsc::UnboundedSender<Frame>) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.insert(id, Consumer { tx, alive: true });
        info!("Consumer {} connected ({} total)", id, inner.len());
        id
    }

    /// Remove a consumer on transport close
    pub fn remove(&self, id: Uuid) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if inner.remove(&id).is_some() {
            info!("Consumer {} disconnected ({} total)", id, inner.len());
        }
    }

    /// Record a probe acknowledgment (pong) from a consumer
    pub fn mark_alive(&self, id: Uuid) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if let Some(consumer) = inner.get_mut(&id) {
            consumer.alive = true;
        }
    }

    /// Broadcast a text frame to every consumer whose channel is still open.
    ///
    /// Best-effort: a consumer that is not open at broadcast time never
    /// receives the frame (no replay). Consumers whose writer task has gone
    /// away are dropped here. Returns the number of deliveries.
    pub fn broadcast(&self, text: &str) -> usize {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let mut gone = Vec::new();
        let mut delivered = 0;
        for (id, consumer) in inner.iter() {
            if consumer.tx.send(Frame::Text(text.to_string())).is_ok() {
                delivered += 1;
            } else {
                gone.push(*id);
            }
        }
        for id in gone {
            inner.remove(&id);
            warn!("Consumer {} dropped during broadcast (channel closed)", id);
        }
        debug!("Broadcast frame to {} consumers", delivered);
        delivered
    }

    /// One liveness pass: terminate consumers whose flag was never refreshed
    /// since the previous pass, then clear flags and probe the rest.
    pub fn sweep(&self) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let dead: Vec<Uuid> = inner
            .iter()
            .filter(|(_, c)| !c.alive)
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            if let Some(consumer) = inner.remove(&id) {
                let _ = consumer.tx.send(Frame::Close);
                warn!("Consumer {} failed liveness probe, terminated", id);
            }
        }
        for (id, consumer) in inner.iter_mut() {
            consumer.alive = false;
            if consumer.tx.send(Frame::Ping).is_err() {
                debug!("Consumer {} probe not sent (channel closed)", id);
            }
        }
    }

    /// Current number of registered consumers
    pub fn count(&self) -> usize {
        self.inner.lock().expect("registry lock poisoned").len()
    }
}

/// Spawn the background liveness monitor
pub fn spawn_liveness_monitor(
    registry: std::sync::Arc<ConsumerRegistry>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // First tick fires immediately; skip it so new consumers get a full period
        interval.tick().await;
        info!("Liveness monitor started ({:?} period)", period);
        loop {
            interval.tick().await;
            registry.sweep();
        }
    })
}
