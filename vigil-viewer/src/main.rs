//! Headless viewer (vigil-viewer) - Main entry point
//!
//! Connects to the relay, prints broadcast events, and records feedback
//! requests so a verdict can be submitted for a clip later, including after
//! a restart. Commands on stdin:
//!
//!   list                      outstanding feedback requests
//!   feedback <video> <0|1>    submit a verdict for a clip
//!   clear                     drop all outstanding requests
//!   quit

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_common::config::resolve_root_folder;
use vigil_common::RelayMessage;
use vigil_viewer::{FeedbackCorrelator, JsonFileStore, ViewerConnection};

/// Command-line arguments for vigil-viewer
#[derive(Parser, Debug)]
#[command(name = "vigil-viewer")]
#[command(about = "Headless event viewer for Vigil")]
#[command(version)]
struct Args {
    /// WebSocket URL of the relay
    #[arg(
        short,
        long,
        default_value = "ws://127.0.0.1:9090/ws",
        env = "VIGIL_RELAY_URL"
    )]
    relay_url: String,

    /// Root folder for persisted viewer state
    #[arg(short = 'f', long)]
    root_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil_viewer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting Vigil viewer v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), "VIGIL_ROOT_FOLDER")
        .context("Failed to resolve root folder")?;
    std::fs::create_dir_all(&root_folder).context("Failed to create root folder")?;
    let state_path = root_folder.join("viewer_state.json");

    let store = JsonFileStore::open(state_path);
    let mut correlator = FeedbackCorrelator::new(store);

    let outstanding = correlator.pending();
    if !outstanding.is_empty() {
        // Restore is read-only: nothing is re-sent
        info!("Restored {} outstanding feedback requests", outstanding.len());
    }

    let (mut connection, mut incoming) = ViewerConnection::spawn(args.relay_url);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            message = incoming.recv() => match message {
                Some(message) => handle_message(&mut correlator, message),
                None => break,
            },
            line = stdin.next_line() => match line? {
                Some(line) => {
                    if !handle_command(&mut correlator, &mut connection, line.trim()) {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    info!("Viewer shutting down");
    Ok(())
}

fn handle_message(correlator: &mut FeedbackCorrelator<JsonFileStore>, message: RelayMessage) {
    match &message {
        RelayMessage::Probability { probab, time } => {
            println!("[{}] intrusion probability {:.1}%", time, probab * 100.0);
        }
        RelayMessage::Log { event, time } => {
            println!("[{}] {}", time, event);
        }
        RelayMessage::FeedbackRequest { video, trigger, probability, .. } => {
            println!(
                "feedback requested: {} (trigger {}, probability {:.1}%)",
                video,
                trigger,
                probability * 100.0
            );
            correlator.observe_message(&message);
        }
        RelayMessage::FeedbackResponse { .. } => {
            // Upstream-bound only; not expected on the broadcast stream
        }
    }
}

/// Returns false when the viewer should exit
fn handle_command(
    correlator: &mut FeedbackCorrelator<JsonFileStore>,
    connection: &mut ViewerConnection,
    line: &str,
) -> bool {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("list") => {
            let pending = correlator.pending();
            if pending.is_empty() {
                println!("no outstanding feedback requests");
            }
            for p in pending {
                println!(
                    "{}  trigger={} mode={} probability={:.1}%",
                    p.video,
                    p.trigger,
                    p.operation_mode,
                    p.probability * 100.0
                );
            }
        }
        Some("feedback") => {
            let (Some(video), Some(label)) = (parts.next(), parts.next()) else {
                println!("usage: feedback <video> <0|1>");
                return true;
            };
            let Ok(label) = label.parse::<u8>() else {
                println!("label must be 0 or 1");
                return true;
            };
            match correlator.submit(video, label, connection) {
                Ok(request_id) => println!("feedback sent (requestId {})", request_id),
                Err(e) => println!("feedback not sent: {}", e),
            }
        }
        Some("clear") => {
            correlator.clear_pending();
            println!("outstanding feedback requests cleared");
        }
        Some("quit") | Some("exit") => return false,
        Some(other) => println!("unknown command: {}", other),
        None => {}
    }
    true
}
