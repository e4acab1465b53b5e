//! DingRelay Web Server - DingTalk callback receiver.
//!
//! This binary:
//! - Registers tenant callback configurations
//! - Receives, verifies and decrypts DingTalk callbacks
//! - Relays plaintext to tenant endpoints when configured
//! - Answers with the encrypted acknowledgement

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dingrelay::web::router;
use dingrelay::{AppState, Config, ConfigStore, MemoryConfigStore, PgConfigStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        database_configured = config.database_url.is_some(),
        forward_timeout_ms = config.forward_timeout_ms,
        "config_loaded"
    );

    // Connect the configuration store
    let pg_store = match &config.database_url {
        Some(url) => Some(
            PgConfigStore::connect(url, config.db_max_connections)
                .await
                .context("Failed to initialize PostgreSQL store")?,
        ),
        None => {
            warn!("database_not_configured_using_memory_store");
            None
        }
    };

    let store: Arc<dyn ConfigStore> = match &pg_store {
        Some(pg) => Arc::new(pg.clone()),
        None => Arc::new(MemoryConfigStore::new()),
    };

    // Shared HTTP client for forwarding
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to create HTTP client")?;

    let state = AppState::new(&config, store, client);
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(pg) = pg_store {
        pg.close().await;
    }

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
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
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
