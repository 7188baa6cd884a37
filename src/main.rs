//! Signal Bridge - Entry Point
//!
//! 1. Loads environment (.env) and initializes logging
//! 2. Loads configuration (YAML + environment overrides)
//! 3. Starts the bridge and logs its status periodically
//! 4. Stops gracefully on Ctrl+C

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use signal_bridge::config::{self, constants, AppConfig};
use signal_bridge::core::{init_logging, Bridge};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();

    init_logging();

    info!("[BRIDGE] Signal bridge starting...");

    let config = load_configuration()?;
    constants::log_configuration(&config);

    let bridge = Arc::new(Bridge::new(&config));
    let addr = bridge
        .start()
        .await
        .context("Failed to start signal bridge")?;
    info!(address = %addr, "[BRIDGE] Ready for execution agent");

    // Create shutdown broadcast channel
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    // Spawn SIGINT handler task
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("[SHUTDOWN] Graceful shutdown initiated");
                let _ = shutdown_signal.send(());
            }
            Err(err) => {
                error!(error = %err, "[SHUTDOWN] Failed to listen for Ctrl+C signal");
            }
        }
    });

    let mut status_ticker = tokio::time::interval(config.bridge.heartbeat_interval());
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = status_ticker.tick() => {
                let status = bridge.get_status();
                info!(
                    connection_status = %status.connection_status,
                    queue_size = status.queue_size,
                    signals_sent = status.stats.signals_sent,
                    signals_received = status.stats.signals_received,
                    errors = status.stats.errors,
                    reconnections = status.stats.reconnections,
                    last_contact = status.last_contact.as_deref().unwrap_or("never"),
                    "[BRIDGE] Status"
                );
            }
        }
    }

    bridge.stop().await;
    info!("[SHUTDOWN] Clean exit");
    Ok(())
}

/// Missing file → defaults; unreadable or invalid file → fatal
fn load_configuration() -> anyhow::Result<AppConfig> {
    let path = constants::config_path();

    let mut config = if path.exists() {
        info!(path = %path.display(), "[CONFIG] Loading configuration");
        config::load_config(&path)
            .with_context(|| format!("Configuration failed: {}", path.display()))?
    } else {
        warn!(path = %path.display(), "[CONFIG] Configuration file not found, using defaults");
        AppConfig::default()
    };

    constants::apply_env_overrides(&mut config);
    config
        .validate()
        .context("Configuration invalid after environment overrides")?;

    Ok(config)
}
