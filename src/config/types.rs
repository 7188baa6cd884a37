//! Configuration types for the bridge
//!
//! Every struct here is loaded from YAML and every field has a default,
//! so an empty document yields a runnable configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ============================================================================
// Configuration Structs
// ============================================================================

/// Transport and liveness settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Address to bind (e.g., "127.0.0.1")
    pub host: String,
    /// Port to bind; 0 picks a free port
    pub port: u16,
    /// Receive poll timeout. Bounds how long a stop request can go unnoticed.
    pub poll_interval_ms: u64,
    /// How often the heartbeat monitor checks for peer silence
    pub heartbeat_interval_ms: u64,
    /// Silence after which the peer is considered disconnected
    pub heartbeat_timeout_ms: u64,
    /// Largest accepted request line in bytes
    pub max_frame_bytes: usize,
    /// Connections served at once; further connects are closed on accept
    pub max_peers: usize,
    /// A connection with no request for this long is closed
    pub peer_idle_timeout_ms: u64,
}

impl BridgeConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn peer_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_idle_timeout_ms)
    }

    /// Validate bridge configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if self.host.trim().is_empty() {
            return Err(AppError::Config("Bridge host cannot be empty".to_string()));
        }

        if self.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "Bridge poll_interval_ms must be > 0".to_string(),
            ));
        }

        if self.heartbeat_interval_ms == 0 {
            return Err(AppError::Config(
                "Bridge heartbeat_interval_ms must be > 0".to_string(),
            ));
        }

        // Rule: timeout > check interval, otherwise every check would see a stale peer
        if self.heartbeat_timeout_ms <= self.heartbeat_interval_ms {
            return Err(AppError::Config(format!(
                "Bridge heartbeat_timeout_ms ({}) must be > heartbeat_interval_ms ({})",
                self.heartbeat_timeout_ms, self.heartbeat_interval_ms
            )));
        }

        if self.max_frame_bytes == 0 {
            return Err(AppError::Config(
                "Bridge max_frame_bytes must be > 0".to_string(),
            ));
        }

        if self.max_peers == 0 {
            return Err(AppError::Config("Bridge max_peers must be > 0".to_string()));
        }

        if self.peer_idle_timeout_ms == 0 {
            return Err(AppError::Config(
                "Bridge peer_idle_timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5555,
            poll_interval_ms: 100,
            heartbeat_interval_ms: 5_000,
            heartbeat_timeout_ms: 30_000,
            max_frame_bytes: 64 * 1024,
            max_peers: 8,
            peer_idle_timeout_ms: 60_000,
        }
    }
}

/// Signal queue sizing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Pending queue capacity
    pub max_queue_size: usize,
    /// Delivered-signal history capacity
    pub max_history: usize,
    /// How long an admitted id blocks re-submission; `None` = forever
    pub dedup_window_secs: Option<f64>,
}

impl StoreConfig {
    pub fn dedup_window(&self) -> Option<Duration> {
        self.dedup_window_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Validate store configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_queue_size == 0 {
            return Err(AppError::Config(
                "Store max_queue_size must be > 0".to_string(),
            ));
        }

        if self.max_history == 0 {
            return Err(AppError::Config(
                "Store max_history must be > 0".to_string(),
            ));
        }

        if let Some(secs) = self.dedup_window_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(AppError::Config(format!(
                    "Store dedup_window_secs must be > 0 when set (got {})",
                    secs
                )));
            }
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1_000,
            max_history: 10_000,
            dedup_window_secs: Some(86_400.0),
        }
    }
}

/// Producer-side signal pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Decisions below this confidence are dropped (0.0 - 1.0)
    pub min_confidence: f64,
    /// Broker stamped on generated signals
    pub default_broker: String,
    /// Strategy names to enable, resolved through the registry
    pub strategies: Vec<String>,
}

impl PipelineConfig {
    /// Validate pipeline configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(AppError::Config(format!(
                "Pipeline min_confidence must be within 0-1 (got {})",
                self.min_confidence
            )));
        }

        if self.default_broker.trim().is_empty() {
            return Err(AppError::Config(
                "Pipeline default_broker cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            default_broker: "EXNESS".to_string(),
            strategies: Vec::new(),
        }
    }
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub bridge: BridgeConfig,
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        self.bridge.validate()?;
        self.store.validate()?;
        self.pipeline.validate()?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
