//! Heartbeat monitor
//!
//! Periodically checks the session and degrades it to `disconnected` once
//! the peer has been silent longer than the heartbeat timeout. The warning
//! is logged once per transition; the next inbound request restores the
//! session and counts a reconnection.

use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::core::session::{lock_session, SharedSession};

/// Heartbeat monitor settings
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// How often the session is checked
    pub check_interval: Duration,
    /// Silence after which a connected peer is considered lost
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Periodically degrades the session to `disconnected` when the peer has
/// been silent longer than the timeout.
///
/// Warns once per transition. Contact from the peer (handled by the
/// request loop) restores `connected`. Exits on shutdown signal.
pub async fn heartbeat_monitor_task(
    session: SharedSession,
    config: HeartbeatConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!(
        interval_ms = config.check_interval.as_millis() as u64,
        timeout_ms = config.timeout.as_millis() as u64,
        "[HEARTBEAT] Monitor started"
    );

    let mut ticker = tokio::time::interval(config.check_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let silent_for = lock_session(&session).check_stale(Instant::now(), config.timeout);
                if let Some(elapsed) = silent_for {
                    warn!(
                        silent_ms = elapsed.as_millis() as u64,
                        "[HEARTBEAT] Connection lost - no contact from peer"
                    );
                }
            },
            _ = shutdown_rx.recv() => {
                info!("[HEARTBEAT] Monitor shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{BridgeSession, ConnectionStatus};

    fn fast_config() -> HeartbeatConfig {
        HeartbeatConfig {
            check_interval: Duration::from_millis(10),
            timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_monitor_marks_silent_peer_disconnected() {
        let session = BridgeSession::new().into_shared();
        lock_session(&session).record_contact();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(heartbeat_monitor_task(session.clone(), fast_config(), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(lock_session(&session).status(), ConnectionStatus::Disconnected);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_monitor_leaves_listening_session_alone() {
        let session = BridgeSession::new().into_shared();
        lock_session(&session).set_status(ConnectionStatus::Listening);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(heartbeat_monitor_task(session.clone(), fast_config(), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(lock_session(&session).status(), ConnectionStatus::Listening);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_contact_restores_connection() {
        let session = BridgeSession::new().into_shared();
        lock_session(&session).record_contact();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(heartbeat_monitor_task(session.clone(), fast_config(), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(lock_session(&session).record_contact());
        {
            let session = lock_session(&session);
            assert_eq!(session.status(), ConnectionStatus::Connected);
            assert_eq!(session.stats().reconnections, 1);
        }

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
