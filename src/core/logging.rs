//! Structured logging for the signal bridge
//!
//! Output goes through `tracing`; events carry a short tag in the message
//! so the bridge can be followed in a mixed log stream:
//!
//! | Tag           | Emitted by                                   |
//! |---------------|----------------------------------------------|
//! | `[BRIDGE]`    | lifecycle, bind, request handling             |
//! | `[HEARTBEAT]` | connection lost / restored                    |
//! | `[SIGNAL]`    | signal accepted, refused, delivered           |
//! | `[PIPELINE]`  | strategy decisions and risk outcomes          |
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | `signal_bridge=info` | Level filter (standard tracing syntax) |
//! | `LOG_FORMAT` | `json` | `json` or `pretty` |

use std::env;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{fmt as ts_fmt, prelude::*, EnvFilter};

/// Flag to track if logging has been initialized (prevents double-init)
static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Default log level when RUST_LOG is not set
pub const DEFAULT_LOG_LEVEL: &str = "signal_bridge=info";

/// Output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event, for log shippers
    #[default]
    Json,
    /// Human-readable multi-line output
    Pretty,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    /// Anything other than `pretty` selects JSON
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("pretty") {
            Ok(LogFormat::Pretty)
        } else {
            Ok(LogFormat::Json)
        }
    }
}

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Level filter, e.g. `signal_bridge=debug,signal_bridge::core::protocol=trace`
    pub level_filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level_filter: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LoggingConfig {
    /// Read `RUST_LOG` and `LOG_FORMAT`
    pub fn from_env() -> Self {
        let level_filter = env::var("RUST_LOG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let format = env::var("LOG_FORMAT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        Self {
            level_filter,
            format,
        }
    }
}

/// Initialize logging from the environment.
///
/// Subsequent calls are no-ops.
pub fn init_logging() {
    let _ = init_logging_with_config(LoggingConfig::from_env());
}

/// Initialize logging with an explicit configuration.
///
/// Returns `false` if logging was already initialized (by this function
/// or by another global subscriber).
pub fn init_logging_with_config(config: LoggingConfig) -> bool {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return false;
    }

    let env_filter = EnvFilter::try_new(&config.level_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let result = match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                ts_fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                ts_fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .with(env_filter)
            .try_init(),
    };

    result.is_ok()
}

/// Route logs to the test harness writer. Safe to call from many tests.
#[cfg(test)]
pub fn init_test_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level_filter, DEFAULT_LOG_LEVEL);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(" PRETTY ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("xml".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }

    #[test]
    #[serial(env)]
    fn test_config_from_env() {
        env::set_var("RUST_LOG", "signal_bridge=debug");
        env::set_var("LOG_FORMAT", "pretty");

        let config = LoggingConfig::from_env();
        assert_eq!(config.level_filter, "signal_bridge=debug");
        assert_eq!(config.format, LogFormat::Pretty);

        env::remove_var("RUST_LOG");
        env::remove_var("LOG_FORMAT");

        assert_eq!(LoggingConfig::from_env(), LoggingConfig::default());
    }

    #[test]
    fn test_default_log_level_targets_crate() {
        assert!(DEFAULT_LOG_LEVEL.starts_with("signal_bridge"));
        assert!(DEFAULT_LOG_LEVEL.contains("info"));
    }

    #[test]
    fn test_test_logging_is_reentrant() {
        init_test_logging("debug");
        init_test_logging("debug");
        tracing::debug!("[BRIDGE] test logging active");
    }
}
