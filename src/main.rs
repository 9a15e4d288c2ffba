//! Pool balancer daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file ──▶ loader/validation ──▶ reconcile ──┐
//!                        ▲                            ▼
//!                    watcher            ┌──────────────────────────┐
//!                                       │          Engine          │
//!   traffic layer ── select_member ────▶│  pools (one lock each)   │
//!   telemetry ────── report_telemetry ─▶│  ├─ strategy dispatch    │
//!   load observer ── set_overloaded ───▶│  └─ member state         │
//!                                       │  heartbeat monitor       │
//!                                       │  └─ task per member      │
//!                                       └──────────────────────────┘
//! ```
//!
//! The daemon hosts the engine, applies configuration changes and reports
//! pool state. Flow admission and telemetry come from the embedding layers.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use pool_balancer::config::{self, BalancerConfig, ConfigWatcher};
use pool_balancer::lifecycle::{signals, startup, Shutdown};
use pool_balancer::observability::{logging, metrics};
use pool_balancer::Engine;

#[derive(Parser)]
#[command(name = "pool-balancer")]
#[command(about = "Member selection and health engine for load-balanced pools", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload pools and members when the configuration file changes.
    #[arg(short, long, requires = "config")]
    watch: bool,

    /// Seconds between pool summary log lines (0 disables).
    #[arg(long, default_value_t = 30)]
    summary_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => BalancerConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pool-balancer starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = Arc::new(startup::build_engine(&config)?);
    tracing::info!(
        pools = engine.pool_ids().len(),
        members = engine.member_count(),
        "Engine ready"
    );

    let shutdown = Shutdown::new();

    // The watcher stops when dropped, so it lives until main returns.
    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            tokio::spawn(reload_loop(Arc::clone(&engine), updates, shutdown.subscribe()));
            Some(handle)
        }
        _ => None,
    };

    if cli.summary_secs > 0 {
        tokio::spawn(summary_loop(
            Arc::clone(&engine),
            Duration::from_secs(cli.summary_secs),
            shutdown.subscribe(),
        ));
    }

    signals::shutdown_signal().await;

    shutdown.trigger();
    engine.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn reload_loop(
    engine: Arc<Engine>,
    mut updates: mpsc::UnboundedReceiver<BalancerConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            Some(new_config) = updates.recv() => {
                if let Err(e) = config::apply_config(&engine, &new_config) {
                    tracing::error!(error = %e, "Failed to apply reloaded config");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn summary_loop(engine: Arc<Engine>, every: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for pool in engine.snapshots() {
                    tracing::info!(
                        pool = %pool.id,
                        name = %pool.name,
                        strategy = %pool.strategy,
                        members = pool.members.len(),
                        eligible = pool.eligible_count(),
                        "Pool summary"
                    );
                    if tracing::enabled!(tracing::Level::DEBUG) {
                        match serde_json::to_string(&pool) {
                            Ok(state) => tracing::debug!(pool = %pool.id, %state, "Pool state"),
                            Err(e) => tracing::warn!(pool = %pool.id, error = %e, "Failed to encode pool state"),
                        }
                    }
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
