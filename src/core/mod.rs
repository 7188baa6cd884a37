//! Core module - signals, store, session, wire protocol, bridge, logging
//!
//! This module uses **explicit re-exports** instead of glob exports
//! (`pub use module::*`) so the public API only grows deliberately.
//!
//! ## Usage
//! Prefer importing from `crate::core`:
//! ```ignore
//! use signal_bridge::core::{Bridge, Signal, TradeAction};
//! ```

pub mod bridge;
pub mod heartbeat;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod signal;
pub mod store;

// Explicit re-exports for signal module
pub use signal::{timestamp_format, Signal, SignalBuilder, TradeAction, ValidationError, MIN_SYMBOL_LEN};

// Explicit re-exports for store module
pub use store::{AdmissionError, SignalStore};

// Explicit re-exports for session module
pub use session::{lock_session, BridgeSession, BridgeStats, ConnectionStatus, SharedSession, StatusReport};

// Explicit re-exports for protocol module
pub use protocol::{
    BridgeRequest, BridgeResponse, RequestError, RequestHandler, ResponseBody, ResponseStatus,
};

// Explicit re-exports for bridge module
pub use bridge::Bridge;

// Explicit re-exports for heartbeat module
pub use heartbeat::{heartbeat_monitor_task, HeartbeatConfig};

// Explicit re-exports for logging module
pub use logging::{init_logging, init_logging_with_config, LogFormat, LoggingConfig, DEFAULT_LOG_LEVEL};
