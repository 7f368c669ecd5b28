//! Event relay server (vigil-relay) - Main entry point
//!
//! Relays real-time sensor events from the analysis process to viewer
//! connections, funnels viewer feedback upstream, and serves recorded clips.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_common::config::{ensure_root_folder, resolve_root_folder};
use vigil_relay::{build_router, registry, AppState};

/// Command-line arguments for vigil-relay
#[derive(Parser, Debug)]
#[command(name = "vigil-relay")]
#[command(about = "Event relay server for Vigil")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "9090", env = "VIGIL_PORT")]
    port: u16,

    /// WebSocket URL of the upstream analysis process
    #[arg(
        short,
        long,
        default_value = "ws://127.0.0.1:8765",
        env = "VIGIL_UPSTREAM_URL"
    )]
    upstream_url: String,

    /// Root folder for recordings and profile data
    #[arg(short, long)]
    root_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting Vigil relay v{} on port {}",
        env!("CARGO_PKG_VERSION"),
        args.port
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), "VIGIL_ROOT_FOLDER")
        .context("Failed to resolve root folder")?;
    let video_dir = ensure_root_folder(&root_folder).context("Failed to prepare root folder")?;
    let profile_path = root_folder.join("user_data.json");

    info!("Upstream: {}", args.upstream_url);
    info!("Video directory: {}", video_dir.display());

    let state = AppState::new(args.upstream_url, video_dir, profile_path);

    // Upstream supervision: connect, relay, reconnect on a fixed interval
    tokio::spawn(state.upstream.clone().run(state.registry.clone()));

    // Liveness monitor: probe consumers, drop the unresponsive
    registry::spawn_liveness_monitor(state.registry.clone(), registry::LIVENESS_PERIOD);

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("vigil-relay listening on http://{}", addr);
    info!("Consumer WebSocket: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
