//! Consumer WebSocket endpoint
//!
//! Each viewer holds a `/ws` connection. Broadcast frames arrive through the
//! registry-owned channel and a writer task drains them into the socket;
//! viewer-originated frames are funneled upstream verbatim.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::registry::Frame;
use crate::AppState;

/// GET /ws - consumer WebSocket upgrade
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
    let id = state.registry.register(outbound_tx);

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: registry frames -> socket. A Close frame (failed liveness
    // probe) ends the task, which closes the transport.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let result = match frame {
                Frame::Text(text) => ws_tx.send(Message::Text(text)).await,
                Frame::Ping => ws_tx.send(Message::Ping(Vec::new())).await,
                Frame::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            };
            if result.is_err() {
                debug!("Consumer socket send failed, writer exiting");
                break;
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => {
                // Funnel to upstream; dropped silently when disconnected
                if !state.upstream.send(text) {
                    debug!("Upstream disconnected, consumer frame dropped");
                }
            }
            Ok(Message::Pong(_)) => {
                state.registry.mark_alive(id);
            }
            Ok(Message::Close(_)) => {
                info!("Consumer {} sent close frame", id);
                break;
            }
            // Client Pings are answered with a Pong by the transport layer;
            // binary frames are not part of the protocol
            Ok(_) => {}
            Err(e) => {
                warn!("Consumer {} transport error: {}", id, e);
                break;
            }
        }
    }

    state.registry.remove(id);
    send_task.abort();
}
