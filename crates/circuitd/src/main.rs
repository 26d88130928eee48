//! circuitd: the Circuit daemon.
//!
//! Single binary that assembles the release control plane:
//! - State store (redb)
//! - Release pipeline with the scope authorizer
//! - Event relay
//! - REST API
//!
//! # Usage
//!
//! ```text
//! circuitd serve --config /etc/circuit/circuit.toml --listen 0.0.0.0:8443
//! circuitd config --config /etc/circuit/circuit.toml
//! ```

mod relay;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use circuit_core::{ChannelBus, CircuitConfig, ScopeAuthorizer};
use circuit_release::ReleaseService;
use circuit_state::StateStore;

const DEFAULT_LOG_FILTER: &str = "info,circuitd=debug,circuit=debug";

#[derive(Parser)]
#[command(name = "circuitd", about = "Circuit release control plane daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the release API.
    Serve {
        /// Path to circuit.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Address to listen on (overrides `[server] listen`).
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Directory for the state database (overrides `[store] path`).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Disable duplicate in-flight release detection.
        #[arg(long)]
        no_dedup: bool,
    },
    /// Print the effective configuration as TOML.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve {
            config,
            listen,
            data_dir,
            no_dedup,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            if let Some(dir) = data_dir {
                config.store.path = dir.join("circuit.redb");
            }
            if no_dedup {
                config.release.dedup_in_flight = false;
            }
            serve(config).await
        }
        Command::Config { config } => {
            print!("{}", load_config(config.as_deref())?.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CircuitConfig> {
    match path {
        Some(path) => CircuitConfig::from_file(path),
        None => Ok(CircuitConfig::default()),
    }
}

async fn serve(config: CircuitConfig) -> anyhow::Result<()> {
    info!("Circuit daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    if let Some(parent) = config.store.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = StateStore::open(&config.store.path)?;
    info!(path = ?config.store.path, "state store opened");

    let (bus, events) = ChannelBus::channel();
    let releases = Arc::new(ReleaseService::new(
        store,
        Arc::new(ScopeAuthorizer),
        Arc::new(bus),
        config.release.clone(),
    ));
    info!(dedup = config.release.dedup_in_flight, "release pipeline initialized");

    // ── Start background tasks ─────────────────────────────────

    let relay_handle = tokio::spawn(relay::run(events));

    // ── Start API server ───────────────────────────────────────

    let router = circuit_api::build_router(releases);
    let addr = config.server.listen;
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;

    // The router owned the last bus sender; the relay drains and exits.
    let relayed = relay_handle.await?;
    info!(relayed, "Circuit daemon stopped");
    Ok(())
}
