use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use skinbridge_bridge::bridge;
use skinbridge_connector::{
    init_tracing, spawn_stdin_commands, ConnectorConfig, OverlayRuntime, SnapshotHost,
};
use skinbridge_overlay::Overlay;

#[derive(Parser, Debug)]
#[command(name = "skinbridge-connector", version, about = "Headless skinbridge overlay runtime")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Controller bridge URL (ws:// or wss://).
    #[arg(long)]
    url: Option<String>,

    /// JSON snapshot of the host tree to watch.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long)]
    log_level: Option<String>,

    /// Do not read commands from stdin.
    #[arg(long)]
    no_stdin: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConnectorConfig::load(cli.config.as_deref()).context("loading config")?;
    if let Some(url) = cli.url {
        config.bridge.url = url;
    }
    if let Some(snapshot) = cli.snapshot {
        config.host.snapshot = Some(snapshot);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.no_stdin {
        config.host.stdin_commands = false;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: ConnectorConfig) -> anyhow::Result<()> {
    let (client, handle, inbound_rx) =
        bridge(config.bridge.to_bridge_config()).context("invalid bridge configuration")?;
    init_tracing(&config.logging, Some(handle.clone()));

    tracing::info!(
        url = %config.bridge.url,
        snapshot = ?config.host.snapshot,
        "Starting skinbridge connector"
    );
    tokio::spawn(client.run());

    let host = match &config.host.snapshot {
        Some(path) => SnapshotHost::watching(path),
        None => SnapshotHost::empty(),
    };

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    if config.host.stdin_commands {
        spawn_stdin_commands(commands_tx.clone());
    }

    let overlay = Overlay::new(config.overlay.clone());
    let poll_interval = Duration::from_millis(config.host.poll_interval_ms);
    let runtime = OverlayRuntime::new(overlay, host, handle, inbound_rx, poll_interval);

    tokio::select! {
        _ = runtime.run(commands_rx) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for ctrl-c")?;
            tracing::info!("Interrupted");
        }
    }
    // Held until here so closing stdin does not end the loop.
    drop(commands_tx);
    Ok(())
}
