//! Rally node entry point.
//!
//! A headless node that either browses for sessions or hosts one.
//!
//! # Usage
//!
//! ```text
//! rally-node [--config <PATH>] browse [--for <SECS>]
//! rally-node [--config <PATH>] host [--mode lan|lobby] [--name <NAME>]
//! ```
//!
//! `browse` refreshes discovery every `discovery.probe_interval_secs` and
//! prints the live session list after each cycle. `host` hosts a session until
//! Ctrl-C, then stops it (tearing down any lobby advertisement).
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load NodeSettings        -- --config path or platform config dir
//!  └─ SessionNodeBuilder
//!       ├─ TcpTransport         (registered backend)
//!       ├─ InMemoryLobbyService (when lobby.backend = "in-process")
//!       └─ build()              -- arbitrator, controller, discovery, observers
//!  └─ browse loop / host until Ctrl-C
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rally_core::SessionMode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use rally_node::infrastructure::lobby::memory::InMemoryLobbyService;
use rally_node::infrastructure::network::broadcast::ProbeReport;
use rally_node::infrastructure::storage::config::{
    load_config, load_config_from, LobbyBackendKind, NodeSettings,
};
use rally_node::infrastructure::transport::tcp::{TcpTransport, TcpTransportConfig};
use rally_node::{SessionNode, SessionNodeBuilder};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Rally session node.
#[derive(Debug, Parser)]
#[command(
    name = "rally-node",
    about = "Discover, host and join Rally multiplayer sessions",
    version
)]
struct Cli {
    /// Configuration file to use instead of the platform default.
    #[arg(long, global = true, env = "RALLY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refresh discovery periodically and print the session list.
    Browse {
        /// Stop after this many seconds instead of waiting for Ctrl-C.
        #[arg(long = "for", value_name = "SECS")]
        duration: Option<u64>,
    },
    /// Host a session until Ctrl-C.
    Host {
        #[arg(long, value_enum, default_value_t = ModeArg::Lan)]
        mode: ModeArg,

        /// Display name advertised to browsers. Overrides `node.display_name`.
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Lan,
    Lobby,
}

impl From<ModeArg> for SessionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Lan => SessionMode::LocalNetwork,
            ModeArg::Lobby => SessionMode::LobbyService,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => load_config_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => load_config().context("failed to load config")?,
    };

    // `RUST_LOG` overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.node.log_level)),
        )
        .init();

    if let Command::Host {
        name: Some(name), ..
    } = &cli.command
    {
        settings.node.display_name = name.clone();
    }

    let node = build_node(settings).context("invalid configuration")?;

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    match cli.command {
        Command::Browse { duration } => {
            let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
            browse(&node, &running, deadline).await;
        }
        Command::Host { mode, .. } => host(&node, &running, mode.into()).await?,
    }

    info!("rally-node stopped");
    Ok(())
}

fn build_node(settings: NodeSettings) -> anyhow::Result<SessionNode> {
    let tcp = TcpTransport::new(TcpTransportConfig {
        bind_address: settings.bind_address(),
        game_port: settings.transport.game_port,
        ..TcpTransportConfig::default()
    });

    let lobby_backend = settings.lobby.backend;
    let mut builder = SessionNodeBuilder::new(settings).backend(Arc::new(tcp));
    if lobby_backend == LobbyBackendKind::InProcess {
        builder = builder.lobby_service(Arc::new(InMemoryLobbyService::new()));
    }
    Ok(builder.build()?)
}

async fn browse(node: &SessionNode, running: &AtomicBool, deadline: Option<Instant>) {
    if !node.start_browsing().await {
        info!("LAN discovery unavailable; browsing lobby service only");
    }
    let interval = node.settings().discovery.probe_interval();

    while running.load(Ordering::Relaxed) && deadline.map_or(true, |d| Instant::now() < d) {
        let outcome = node.refresh().await;
        if let Some(summary) = probe_summary(&outcome.probe) {
            debug!("{summary}");
        }
        wait(running, interval).await;
        // The listing lands in the registry on its own; only log a lost query.
        if outcome.lobby_query.is_finished() && matches!(outcome.lobby_query.await, Ok(false)) {
            debug!("lobby listing was not applied this cycle");
        }

        let sessions = node.snapshot();
        println!("{} session(s)", sessions.len());
        for session in &sessions {
            println!(
                "  [{}] {:<24} {}",
                session.source,
                session.label(),
                session.descriptor.connect_uri()
            );
        }
    }
    node.stop_browsing();
}

/// Log line for a probe with failed targets, `None` when every send worked.
fn probe_summary(report: &ProbeReport) -> Option<String> {
    if report.failures.is_empty() {
        return None;
    }
    let attempted = report.sent.len() + report.failures.len();
    Some(format!(
        "{} of {attempted} discovery probes failed",
        report.failures.len()
    ))
}

async fn host(node: &SessionNode, running: &AtomicBool, mode: SessionMode) -> anyhow::Result<()> {
    node.watch_for_abnormal_end();
    node.host(mode)
        .await
        .with_context(|| format!("failed to host in {mode} mode"))?;
    info!("hosting; press Ctrl-C to stop");

    while running.load(Ordering::Relaxed) && node.state().is_active() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    node.stop().await;
    Ok(())
}

/// Sleeps for `period`, returning early once `running` is cleared.
async fn wait(running: &AtomicBool, period: Duration) {
    let until = Instant::now() + period;
    while running.load(Ordering::Relaxed) && Instant::now() < until {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
