//! Environment overrides and startup configuration dump
//!
//! Values here can be overridden via environment variables so a deployed
//! bridge can be moved without editing its YAML file.

use std::path::PathBuf;

use super::types::AppConfig;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

// =============================================================================
// Environment Overrides
// =============================================================================

/// Configuration file path (default: `config.yaml`)
///
/// Environment variable: `BRIDGE_CONFIG`
pub fn config_path() -> PathBuf {
    std::env::var("BRIDGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Bind host override
///
/// Environment variable: `BRIDGE_HOST`
pub fn host_override() -> Option<String> {
    std::env::var("BRIDGE_HOST")
        .ok()
        .filter(|h| !h.trim().is_empty())
}

/// Bind port override (ignored when not a valid port number)
///
/// Environment variable: `BRIDGE_PORT`
pub fn port_override() -> Option<u16> {
    std::env::var("BRIDGE_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
}

/// Apply every environment override to a loaded configuration
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Some(host) = host_override() {
        config.bridge.host = host;
    }
    if let Some(port) = port_override() {
        config.bridge.port = port;
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Print all configuration values (for startup logs)
pub fn log_configuration(config: &AppConfig) {
    tracing::info!("=== Bridge Configuration ===");
    tracing::info!("Transport:");
    tracing::info!("  - Address: {}", config.bridge.address());
    tracing::info!("  - Poll interval: {:?}", config.bridge.poll_interval());
    tracing::info!("  - Max frame: {} bytes", config.bridge.max_frame_bytes);
    tracing::info!("  - Max peers: {}", config.bridge.max_peers);
    tracing::info!("  - Peer idle timeout: {:?}", config.bridge.peer_idle_timeout());

    tracing::info!("Heartbeat:");
    tracing::info!("  - Check interval: {:?}", config.bridge.heartbeat_interval());
    tracing::info!("  - Timeout: {:?}", config.bridge.heartbeat_timeout());

    tracing::info!("Store:");
    tracing::info!("  - Max queue size: {}", config.store.max_queue_size);
    tracing::info!("  - Max history: {}", config.store.max_history);
    match config.store.dedup_window() {
        Some(window) => tracing::info!("  - Dedup window: {:?}", window),
        None => tracing::info!("  - Dedup window: unbounded"),
    }

    tracing::info!("Pipeline:");
    tracing::info!("  - Min confidence: {}", config.pipeline.min_confidence);
    tracing::info!("  - Default broker: {}", config.pipeline.default_broker);
    tracing::info!("  - Strategies: {:?}", config.pipeline.strategies);
    tracing::info!("============================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial(env)]
    fn test_default_config_path() {
        std::env::remove_var("BRIDGE_CONFIG");
        assert_eq!(config_path(), PathBuf::from("config.yaml"));
    }

    #[test]
    #[serial(env)]
    fn test_env_overrides_applied() {
        std::env::set_var("BRIDGE_HOST", "0.0.0.0");
        std::env::set_var("BRIDGE_PORT", "7000");

        let mut config = AppConfig::default();
        apply_env_overrides(&mut config);
        assert_eq!(config.bridge.host, "0.0.0.0");
        assert_eq!(config.bridge.port, 7000);

        std::env::remove_var("BRIDGE_HOST");
        std::env::remove_var("BRIDGE_PORT");
    }

    #[test]
    #[serial(env)]
    fn test_invalid_port_override_ignored() {
        std::env::set_var("BRIDGE_PORT", "not-a-port");
        assert_eq!(port_override(), None);

        let mut config = AppConfig::default();
        apply_env_overrides(&mut config);
        assert_eq!(config.bridge.port, 5555);

        std::env::remove_var("BRIDGE_PORT");
    }
}
