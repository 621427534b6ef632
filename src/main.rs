use std::path::PathBuf;
use std::sync::Arc;

use axum::{routing::get, Router};
use clap::Parser;
use tokio::signal;
use tracing::{info, Level};

use gatekeeper::admission::{AdmissionController, Clock, MonotonicClock, WindowStore};
use gatekeeper::config::GatekeeperConfig;
use gatekeeper::http::HttpServer;

/// HTTP admission-control gateway.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Gatekeeper Admission Gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    // Load and validate configuration; an invalid limiter is fatal and
    // the process must not begin serving.
    let config = match &args.config {
        Some(path) => GatekeeperConfig::from_file(path)?,
        None => GatekeeperConfig::default(),
    };
    config.validate()?;
    info!(
        listen_addr = %config.server.listen_addr,
        capacity = config.limiter.capacity,
        refill_rate_per_sec = config.limiter.refill_rate_per_sec,
        key_strategy = ?config.limiter.key_strategy,
        "Configuration loaded"
    );

    // Construct the limiter explicitly: clock, store, controller.
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock);
    let store = Arc::new(WindowStore::new());
    let controller = Arc::new(AdmissionController::new(
        config.limiter.clone(),
        store.clone(),
        clock.clone(),
    ));
    info!("Admission controller initialized");

    // Background eviction sweep, stopped by abort on shutdown.
    let sweeper = store.spawn_sweeper(
        clock,
        config.limiter.sweep_interval(),
        config.limiter.idle_eviction_after(),
    );

    // Business routes are mounted by the surrounding pipeline; the
    // gateway itself only exposes a health endpoint.
    let routes = Router::new().route("/healthz", get(healthz));

    let server = HttpServer::new(config.server.listen_addr, controller);
    server.serve_with_shutdown(routes, shutdown_signal()).await?;

    sweeper.abort();
    info!("Gatekeeper Admission Gateway stopped");
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
