//! Bandcast Server
//!
//! Relays per-process bandwidth samples from the measurement engine to
//! WebSocket viewers.
//!
//! # Configuration
//!
//! Environment variables:
//! - `BANDCAST_HOST`: Host to bind to (default: 127.0.0.1)
//! - `BANDCAST_PORT`: Port to listen on (default: 8765)
//! - `BANDCAST_SOURCE_CMD`: External measurement command
//! - `BANDCAST_LOG_LEVEL` / `BANDCAST_LOG_FORMAT`: Logging
//! - `RUST_LOG`: Overrides the log filter entirely

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bandcast::bridge::SampleQueue;
use bandcast::config::{generate_default_config, Config, LoggingConfig};
use bandcast::hub::{ConnectionRegistry, Dispatcher};
use bandcast::server::{serve, AppState};
use bandcast::source::{spawn_source, CommandSource};

#[derive(Parser)]
#[command(
    name = "bandcast",
    version,
    about = "Per-process network bandwidth broadcast hub"
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listener host
    #[arg(long)]
    host: Option<String>,

    /// Override the listener port
    #[arg(long)]
    port: Option<u16>,

    /// Override the measurement command
    #[arg(long = "source-cmd")]
    source_cmd: Option<String>,

    /// Skip the root privilege check (for replayed or pre-captured sources)
    #[arg(long)]
    allow_unprivileged: bool,

    /// Print a commented default config file and exit
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_default_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(command) = cli.source_cmd {
        config.source.command = Some(command);
    }

    init_tracing(&config.logging);

    tracing::info!("bandcast v{}", env!("CARGO_PKG_VERSION"));

    // Observing system-wide per-process traffic needs root; refuse early
    // rather than start a hub the engine cannot feed.
    if !cli.allow_unprivileged {
        ensure_root()?;
    }

    let (sample_tx, sample_rx) = SampleQueue::channel(config.queue.high_water);

    // The source thread owns the push half; when the engine exits, the
    // queue closes and the dispatcher stops. Without a configured engine,
    // keep a sender alive so the hub idles instead of shutting down.
    let mut standby_tx = None;
    match config.source.command.clone() {
        Some(program) => {
            let source = CommandSource::new(program, config.source.args.clone());
            // Detached; the engine signals through queue closure, not the handle
            let _ = spawn_source(source, sample_tx).context("failed to spawn source thread")?;
        }
        None => {
            tracing::warn!("no measurement engine configured, hub will idle");
            standby_tx = Some(sample_tx);
        }
    }

    let registry = Arc::new(ConnectionRegistry::new(config.server.max_connections));

    let dispatcher = Dispatcher::new(sample_rx, Arc::clone(&registry));
    let dispatcher_alive = Arc::new(AtomicBool::new(true));
    let alive_flag = Arc::clone(&dispatcher_alive);
    let mut dispatcher_task = tokio::spawn(async move {
        dispatcher.run().await;
        alive_flag.store(false, Ordering::SeqCst);
    });

    let state = AppState::new(registry, config.server.clone(), dispatcher_alive);

    tokio::select! {
        result = serve(state, &config.server) => {
            result?;
            tracing::info!("bandcast stopped");
        }
        _ = &mut dispatcher_task => {
            anyhow::bail!("sample queue closed; no samples can be delivered");
        }
    }

    drop(standby_tx);
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("bandcast={}", logging.level)));

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(unix)]
fn ensure_root() -> anyhow::Result<()> {
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        anyhow::bail!(
            "bandcast must run as root to observe system-wide traffic \
             (pass --allow-unprivileged to skip this check)"
        );
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_root() -> anyhow::Result<()> {
    Ok(())
}
