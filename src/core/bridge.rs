//! Signal bridge server
//!
//! Owns the signal store and session, serves the line-delimited JSON
//! protocol over TCP from a single worker, and runs the heartbeat monitor
//! alongside. Connected peers are interleaved request by request; a peer
//! that stays silent past `peer_idle_timeout_ms` is closed.
//!
//! Lifecycle: `new` → `start` (bind, listening) → `stop` (stopped).
//! A stopped bridge can be started again; it gets a fresh session while
//! the store keeps its contents.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_util::stream::{self, SelectAll, Stream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, BridgeConfig};
use crate::core::heartbeat::{heartbeat_monitor_task, HeartbeatConfig};
use crate::core::protocol::{RequestError, RequestHandler};
use crate::core::session::{lock_session, BridgeSession, ConnectionStatus, SharedSession, StatusReport};
use crate::core::signal::Signal;
use crate::core::store::{AdmissionError, SignalStore};
use crate::error::{AppError, Result};

/// Inter-process signal bridge
#[derive(Debug)]
pub struct Bridge {
    config: BridgeConfig,
    store: Arc<SignalStore>,
    session: SharedSession,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Bridge {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_store(
            config.bridge.clone(),
            Arc::new(SignalStore::new(&config.store)),
        )
    }

    /// Build a bridge around an existing store
    pub fn with_store(config: BridgeConfig, store: Arc<SignalStore>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            store,
            session: BridgeSession::new().into_shared(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
            local_addr: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<SignalStore> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Bound address while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind the listener and spawn the request loop and heartbeat monitor.
    ///
    /// Returns the bound address (useful with port 0). A bind failure
    /// leaves the bridge in `error` status and is returned to the caller.
    pub async fn start(&self) -> Result<SocketAddr> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::Bridge("Bridge is already running".to_string()));
        }

        {
            let mut session = lock_session(&self.session);
            *session = BridgeSession::new();
        }

        let address = self.config.address();
        info!(address = %address, "[BRIDGE] Binding");

        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(e) => return Err(self.fail_start(&address, e)),
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => return Err(self.fail_start(&address, e)),
        };

        lock_session(&self.session).set_status(ConnectionStatus::Listening);
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(local_addr);

        let handler = RequestHandler::new(self.store.clone(), self.session.clone());
        let serve = tokio::spawn(serve_loop(
            listener,
            handler,
            self.session.clone(),
            self.running.clone(),
            ServeSettings::from_config(&self.config),
        ));
        let heartbeat = tokio::spawn(heartbeat_monitor_task(
            self.session.clone(),
            HeartbeatConfig {
                check_interval: self.config.heartbeat_interval(),
                timeout: self.config.heartbeat_timeout(),
            },
            self.shutdown_tx.subscribe(),
        ));
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([serve, heartbeat]);

        info!(address = %local_addr, "[BRIDGE] Listening");
        Ok(local_addr)
    }

    fn fail_start(&self, address: &str, e: std::io::Error) -> AppError {
        self.running.store(false, Ordering::Release);
        {
            let mut session = lock_session(&self.session);
            session.set_status(ConnectionStatus::Error);
            session.record_error();
        }
        error!(address = %address, error = %e, "[BRIDGE] Failed to bind");
        AppError::Transport(format!("Failed to bind {}: {}", address, e))
    }

    /// Stop serving and wait for background tasks to exit.
    ///
    /// No-op on a bridge that is not running.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            debug!("[BRIDGE] Stop requested on idle bridge");
            return;
        }
        info!("[BRIDGE] Stopping");

        // No receivers only means the monitor already exited
        let _ = self.shutdown_tx.send(());

        let handles = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "[BRIDGE] Background task ended abnormally");
            }
        }

        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = None;
        lock_session(&self.session).set_status(ConnectionStatus::Stopped);

        let stats = lock_session(&self.session).stats().clone();
        info!(
            signals_sent = stats.signals_sent,
            signals_received = stats.signals_received,
            errors = stats.errors,
            reconnections = stats.reconnections,
            "[BRIDGE] Stopped"
        );
    }

    /// Enqueue a signal for the execution agent
    pub fn send_signal(&self, signal: Signal) -> std::result::Result<(), AdmissionError> {
        let signal_id = signal.id().to_string();
        match self.store.add(signal) {
            Ok(()) => {
                lock_session(&self.session).record_received();
                info!(signal_id = %signal_id, queue_size = self.store.size(), "[SIGNAL] Queued");
                Ok(())
            }
            Err(e) => {
                warn!(signal_id = %signal_id, reason = %e, "[SIGNAL] Refused");
                Err(e)
            }
        }
    }

    pub fn get_status(&self) -> StatusReport {
        let queue_size = self.store.size();
        lock_session(&self.session).report(queue_size)
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if self.running.swap(false, Ordering::AcqRel) {
            let _ = self.shutdown_tx.send(());
        }
    }
}

// =============================================================================
// Request loop
// =============================================================================

/// Writes to a peer that stops reading give up after this long
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct ServeSettings {
    poll_interval: Duration,
    max_frame_bytes: usize,
    max_peers: usize,
    peer_idle_timeout: Duration,
}

impl ServeSettings {
    fn from_config(config: &BridgeConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_frame_bytes: config.max_frame_bytes,
            max_peers: config.max_peers,
            peer_idle_timeout: config.peer_idle_timeout(),
        }
    }
}

/// Inbound traffic from one connection
#[derive(Debug)]
enum PeerEvent {
    Line(String),
    TooLarge,
    Failed(std::io::Error),
    Closed,
}

type PeerEvents = Pin<Box<dyn Stream<Item = (u64, PeerEvent)> + Send>>;

/// Write side of a connection owned by the request loop
struct Peer {
    addr: SocketAddr,
    writer: FramedWrite<OwnedWriteHalf, LinesCodec>,
    last_request: Instant,
    // Dropping this ends the connection's event stream
    _close: oneshot::Sender<()>,
}

/// Turn the read half of a connection into tagged events. The stream ends
/// after `Closed`/`Failed`, or as soon as `close` resolves.
fn peer_events(
    id: u64,
    reader: FramedRead<OwnedReadHalf, LinesCodec>,
    close: oneshot::Receiver<()>,
) -> PeerEvents {
    let events = stream::unfold(Some((reader, false)), |state| async move {
        // The framed reader yields one `None` after a decode error, then resumes
        let Some((mut reader, mut resuming)) = state else {
            return None;
        };
        loop {
            let event = match reader.next().await {
                None if resuming => {
                    resuming = false;
                    continue;
                }
                None => return Some((PeerEvent::Closed, None)),
                Some(Ok(line)) => PeerEvent::Line(line),
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    resuming = true;
                    PeerEvent::TooLarge
                }
                Some(Err(LinesCodecError::Io(e))) => return Some((PeerEvent::Failed(e), None)),
            };
            return Some((event, Some((reader, resuming))));
        }
    });
    Box::pin(events.take_until(close).map(move |event| (id, event)))
}

/// Single worker over every connected peer. Each request is answered
/// before the worker takes the next one, from whichever peer is ready, so
/// a silent connection never holds the loop. Observes `running` within
/// one poll interval.
async fn serve_loop(
    listener: TcpListener,
    handler: RequestHandler,
    session: SharedSession,
    running: Arc<AtomicBool>,
    settings: ServeSettings,
) {
    info!(max_peers = settings.max_peers, "[BRIDGE] Request loop started");

    let mut events: SelectAll<PeerEvents> = SelectAll::new();
    let mut peers: HashMap<u64, Peer> = HashMap::new();
    let mut next_id: u64 = 0;

    while running.load(Ordering::Acquire) {
        evict_idle(&mut peers, settings.peer_idle_timeout);

        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) if peers.len() >= settings.max_peers => {
                    warn!(peer = %addr, max_peers = settings.max_peers, "[BRIDGE] Peer limit reached, closing connection");
                    drop(stream);
                }
                Ok((stream, addr)) => {
                    let id = next_id;
                    next_id += 1;

                    let (read, write) = stream.into_split();
                    let (close_tx, close_rx) = oneshot::channel();
                    let reader = FramedRead::new(read, LinesCodec::new_with_max_length(settings.max_frame_bytes));
                    events.push(peer_events(id, reader, close_rx));
                    peers.insert(id, Peer {
                        addr,
                        writer: FramedWrite::new(write, LinesCodec::new()),
                        last_request: Instant::now(),
                        _close: close_tx,
                    });
                    info!(peer = %addr, peers = peers.len(), "[BRIDGE] Peer connected");
                }
                Err(e) => {
                    warn!(error = %e, "[BRIDGE] Accept failed");
                    transport_failure(&session);
                }
            },
            Some((id, event)) = events.next(), if !events.is_empty() => {
                serve_event(id, event, &mut peers, &handler, &session, settings.max_frame_bytes).await;
            }
            _ = tokio::time::sleep(settings.poll_interval) => {}
        }
    }

    info!(peers = peers.len(), "[BRIDGE] Request loop exited");
}

/// Answer one event with exactly one line, or retire the peer
async fn serve_event(
    id: u64,
    event: PeerEvent,
    peers: &mut HashMap<u64, Peer>,
    handler: &RequestHandler,
    session: &SharedSession,
    max_frame_bytes: usize,
) {
    let response = match event {
        PeerEvent::Line(line) => handler.handle_line(&line),
        PeerEvent::TooLarge => handler.reject(RequestError::TooLarge(max_frame_bytes)),
        PeerEvent::Closed => {
            if let Some(peer) = peers.remove(&id) {
                info!(peer = %peer.addr, "[BRIDGE] Peer disconnected");
            }
            return;
        }
        PeerEvent::Failed(e) => {
            if let Some(peer) = peers.remove(&id) {
                warn!(peer = %peer.addr, error = %e, "[BRIDGE] Receive failed");
                transport_failure(session);
            }
            return;
        }
    };

    let Some(peer) = peers.get_mut(&id) else {
        return;
    };
    peer.last_request = Instant::now();

    let failure = match tokio::time::timeout(SEND_TIMEOUT, peer.writer.send(response.to_line())).await {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {:?}", SEND_TIMEOUT),
    };
    if let Some(peer) = peers.remove(&id) {
        warn!(peer = %peer.addr, error = %failure, "[BRIDGE] Send failed");
    }
    transport_failure(session);
}

/// Close peers that sent nothing for longer than `idle_timeout`
fn evict_idle(peers: &mut HashMap<u64, Peer>, idle_timeout: Duration) {
    let now = Instant::now();
    peers.retain(|_, peer| {
        let idle = now.saturating_duration_since(peer.last_request);
        if idle > idle_timeout {
            info!(peer = %peer.addr, idle_ms = idle.as_millis() as u64, "[BRIDGE] Closing idle peer");
            false
        } else {
            true
        }
    });
}

/// Socket-level failure: counted, and the session shows `error` until the
/// peer makes contact again.
fn transport_failure(session: &SharedSession) {
    let mut session = lock_session(session);
    session.record_error();
    session.set_status(ConnectionStatus::Error);
}

// ============================================================================
// Tests
// ============================================================================
