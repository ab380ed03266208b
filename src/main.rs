//! tracker-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints and the
//! background sweeper, heartbeat, and persistence tasks.

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use tracker_gateway::app_state::AppState;
use tracker_gateway::config::{GatewayConfig, LogFormat};
use tracker_gateway::persistence::{LogSink, PostgresPersistence};
use tracker_gateway::server::{build_app, spawn_background_tasks};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting tracker-gateway");

    // Build persistence layer
    let persistence = if config.persistence_enabled {
        let pg = PostgresPersistence::connect(&config)
            .await
            .context("failed to connect to PostgreSQL")?;
        tracing::info!("persistence enabled");
        Some(pg)
    } else {
        tracing::warn!("persistence disabled, queued events will only be logged");
        None
    };

    // Build application state
    let app_state = AppState::new(&config, persistence.clone());

    // Start background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = match persistence {
        Some(pg) => spawn_background_tasks(&app_state, &config, pg, &shutdown_rx),
        None => spawn_background_tasks(&app_state, &config, LogSink, &shutdown_rx),
    };

    // Build router
    let app = build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    for task in tasks {
        if let Err(err) = task.await {
            tracing::error!(error = %err, "background task failed");
        }
    }
    tracing::info!("tracker-gateway stopped");

    Ok(())
}
