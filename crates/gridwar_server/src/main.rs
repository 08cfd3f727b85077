//! Gridwar headless server.
//!
//! Reads inbound messages as JSON, one per line, from stdin and runs them
//! through the command stage at a fixed tick rate.
//!
//! # Usage
//!
//! ```bash
//! # Run until stdin closes
//! cargo run -p gridwar_server < session.jsonl
//!
//! # Start from a snapshot and record a replay
//! cargo run -p gridwar_server -- --snapshot start.bin --replay out.replay
//! ```
//!
//! Input (stdin): `{"connection_id": "P1", "commands": [...]}` per line.
//! Without `--player` stdin is a trusted development input and each line
//! names its own sender; with `--player P1` every line is attributed to
//! `P1` and any `connection_id` in it is ignored.
//! Output (stdout): one JSON summary line on shutdown
//! Logs (stderr): `RUST_LOG` filter, or `--verbose`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gridwar_core::components::PlayerId;
use gridwar_server::data_loader::build_simulation;
use gridwar_server::error::{Result, ServerError};
use gridwar_server::inbox::{inbox, InboxSender, LineIdentity};
use gridwar_server::runner::{RunSummary, TickRunner};
use gridwar_server::ServerConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "gridwar_server")]
#[command(about = "Headless command server fed with JSON lines on stdin")]
#[command(version)]
struct Cli {
    /// Ticks per second
    #[arg(long, default_value_t = gridwar_core::simulation::TICK_RATE)]
    tick_rate: u32,

    /// Messages buffered before the reader waits
    #[arg(long, default_value_t = 1024)]
    inbox_capacity: usize,

    /// Map width when no snapshot is given
    #[arg(long, default_value_t = 32)]
    width: u32,

    /// Map height when no snapshot is given
    #[arg(long, default_value_t = 32)]
    height: u32,

    /// Bincode snapshot to start from
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// RON simulation config
    #[arg(long)]
    config: Option<PathBuf>,

    /// RON unit catalog
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Write a replay here on shutdown
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Attribute every stdin line to this connection
    #[arg(long)]
    player: Option<String>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            tick_rate: cli.tick_rate,
            inbox_capacity: cli.inbox_capacity,
            map_width: cli.width,
            map_height: cli.height,
            snapshot: cli.snapshot,
            sim_config: cli.config,
            catalog: cli.catalog,
            max_ticks: cli.max_ticks,
            replay_out: cli.replay,
            stdin_player: cli.player.map(PlayerId::new),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr (stdout carries the summary)
    let fallback = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match serve(ServerConfig::from(cli)).await {
        Ok(summary) => {
            let line = serde_json::json!({
                "ticks": summary.ticks,
                "applied": summary.applied,
                "rejected": summary.rejected,
                "state_hash": summary.state_hash,
            });
            println!("{line}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Server failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: ServerConfig) -> Result<RunSummary> {
    let sim = build_simulation(&config)?;
    tracing::info!(
        tick = sim.get_tick(),
        width = sim.map().width(),
        height = sim.map().height(),
        tick_rate = config.tick_rate,
        "Starting Gridwar server"
    );

    let identity = config.stdin_identity();
    if identity == LineIdentity::Trusted {
        tracing::warn!("stdin lines name their own sender; use --player for untrusted input");
    }
    let (tx, rx) = inbox(config.inbox_capacity);
    let reader = tokio::spawn(read_stdin(tx, identity));

    let mut runner = TickRunner::new(sim, rx);
    if config.replay_out.is_some() {
        runner = runner.record_replay("stdin")?;
    }
    let (_sim, replay, summary) = runner
        .run(config.tick_duration(), config.max_ticks)
        .await?;
    reader.abort();

    if let (Some(replay), Some(path)) = (replay, &config.replay_out) {
        replay.save(path)?;
        tracing::info!(path = %path.display(), ticks = replay.duration(), "Replay saved");
    }
    Ok(summary)
}

/// Feed stdin lines into the inbox until EOF, then drop the sender.
async fn read_stdin(tx: InboxSender, identity: LineIdentity) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match identity.decode(&line) {
                Ok(message) => {
                    if let Err(ServerError::InboxClosed) = tx.send(message).await {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Dropping undecodable message: {e}"),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("stdin read failed: {e}");
                break;
            }
        }
    }
}
