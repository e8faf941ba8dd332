//! Vector robot handler.
//!
//! Run with: cargo run -p vector-server
//!
//! Reads `config.yml` (or the file named by `VECTOR_CONFIG`), connects to the
//! robot and serves the action API.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vector_executor::ActionExecutor;
use vector_session::{DeviceSession, driver::SimulatedRobot};
use vector_transport::http::create_router;

use crate::config::AppConfig;

const DEFAULT_CONFIG: &str = "config.yml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var("VECTOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let cfg = AppConfig::load(&path)?;

    init_tracing(cfg.main.debug);
    tracing::info!(
        serial = %cfg.vector.serial,
        ip = %cfg.vector.ip,
        "VECTOR Robot Handler v{}",
        env!("CARGO_PKG_VERSION")
    );

    let robot = SimulatedRobot::new().with_action_delay(cfg.simulator_latency());
    let session = Arc::new(DeviceSession::new(Arc::new(robot), cfg.session_settings()));

    tracing::info!("Initializing Vector...");
    if let Err(e) = session.register().await {
        tracing::warn!("Robot not connected ({e}); LEAVECHARGER will retry");
    }

    let executor = Arc::new(ActionExecutor::new(Arc::clone(&session)));
    let app = create_router(executor).layer(CorsLayer::permissive());

    let addr = (cfg.server.host.as_str(), cfg.server.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}:{}", addr.0, addr.1))?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    session.shutdown().await;
    Ok(())
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();
}

async fn shutdown_signal() {
    wait_for_signal(tokio::signal::ctrl_c()).await;
}

/// Resolves when `signal` fires. If the handler cannot be installed the
/// server keeps running rather than stopping straight away.
async fn wait_for_signal(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
