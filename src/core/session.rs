//! Bridge session state
//!
//! Connection status, last peer contact and counters for one bridge run.
//! Shared between the request loop, the heartbeat monitor and local
//! callers as `Arc<Mutex<BridgeSession>>`; every access is a short
//! critical section that never spans I/O.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::signal::timestamp_format;

/// Type alias for session state shared across tasks
pub type SharedSession = Arc<Mutex<BridgeSession>>;

/// Lock a shared session, recovering from poisoning.
///
/// Session updates are single field writes, so a panicking holder cannot
/// leave it inconsistent.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, BridgeSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Peer connection status as reported to callers and over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Not started, or peer went silent past the heartbeat timeout
    #[default]
    Disconnected,
    /// Bound and waiting for the first request
    Listening,
    /// Peer made contact within the heartbeat timeout
    Connected,
    /// Bind or transport failure
    Error,
    /// Stopped by the owner
    Stopped,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Listening => "listening",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
            ConnectionStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Bridge counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStats {
    /// Signals handed to the peer via GET_SIGNALS
    pub signals_sent: u64,
    /// Signals accepted from the local producer
    pub signals_received: u64,
    /// Malformed requests, unknown actions and transport failures
    pub errors: u64,
    /// Times a disconnected peer came back
    pub reconnections: u64,
}

/// Snapshot returned by `get_status()` and GET_BRIDGE_STATUS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub connection_status: ConnectionStatus,
    pub queue_size: usize,
    pub stats: BridgeStats,
    #[serde(default)]
    pub last_contact: Option<String>,
}

/// Mutable state of one bridge run
#[derive(Debug, Default)]
pub struct BridgeSession {
    status: ConnectionStatus,
    last_contact: Option<DateTime<Utc>>,
    /// Monotonic twin of `last_contact`, used for staleness checks
    last_contact_at: Option<Instant>,
    stats: BridgeStats,
}

impl BridgeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    pub fn last_contact(&self) -> Option<DateTime<Utc>> {
        self.last_contact
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Record an inbound request from the peer and mark it connected.
    ///
    /// Returns `true` when this contact restored a connection that had been
    /// marked lost, either by the heartbeat monitor or by a transport failure.
    pub fn record_contact(&mut self) -> bool {
        self.record_contact_at(Utc::now(), Instant::now())
    }

    pub fn record_contact_at(&mut self, wall: DateTime<Utc>, mono: Instant) -> bool {
        let lost = matches!(
            self.status,
            ConnectionStatus::Disconnected | ConnectionStatus::Error
        );
        let restored = lost && self.last_contact_at.is_some();
        if restored {
            self.stats.reconnections += 1;
        }
        self.last_contact = Some(wall);
        self.last_contact_at = Some(mono);
        self.status = ConnectionStatus::Connected;
        restored
    }

    /// Degrade a `connected` or `error` session whose peer has been silent
    /// longer than `timeout`.
    ///
    /// Edge-triggered: returns the silence duration only on the call that
    /// performs the transition; later calls return `None` until the peer
    /// reconnects.
    pub fn check_stale(&mut self, now: Instant, timeout: Duration) -> Option<Duration> {
        if !matches!(self.status, ConnectionStatus::Connected | ConnectionStatus::Error) {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.last_contact_at?);
        if elapsed > timeout {
            self.status = ConnectionStatus::Disconnected;
            Some(elapsed)
        } else {
            None
        }
    }

    pub fn record_sent(&mut self, count: usize) {
        self.stats.signals_sent += count as u64;
    }

    pub fn record_received(&mut self) {
        self.stats.signals_received += 1;
    }

    pub fn record_error(&mut self) {
        self.stats.errors += 1;
    }

    pub fn report(&self, queue_size: usize) -> StatusReport {
        StatusReport {
            connection_status: self.status,
            queue_size,
            stats: self.stats.clone(),
            last_contact: self.last_contact.as_ref().map(timestamp_format::format),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
