//! Bounded signal queue with history and deduplication
//!
//! `SignalStore` owns three collections behind a single mutex:
//! - `pending`: FIFO queue waiting for the execution agent (capacity N)
//! - `history`: ring buffer of delivered signals (capacity H, oldest evicted)
//! - `seen`: ids admitted so far, used to reject re-submissions
//!
//! Each public operation takes the lock once and releases it before
//! returning. There is no cross-operation transaction: `size()` followed
//! by `take()` may observe different queues if another thread interleaves.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::StoreConfig;
use crate::core::signal::{Signal, ValidationError};

/// Why a signal was refused by `SignalStore::add`.
///
/// Variants are listed in the order they are checked.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdmissionError {
    #[error("{0}")]
    Invalid(#[from] ValidationError),

    #[error("Duplicate signal: {0}")]
    Duplicate(String),

    #[error("Queue is full (capacity {0})")]
    QueueFull(usize),
}

impl AdmissionError {
    /// Human-readable rejection reason
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug)]
struct StoreInner {
    pending: VecDeque<Signal>,
    history: VecDeque<Signal>,
    /// id -> admission instant
    seen: HashMap<String, Instant>,
    /// Admission order of `seen`, oldest first
    seen_order: VecDeque<(Instant, String)>,
}

impl StoreInner {
    /// Forget ids admitted more than `window` ago. Stops at the first id
    /// whose signal is still pending, so a pending id is never forgotten.
    fn prune_seen(&mut self, now: Instant, window: Duration) {
        while let Some((admitted_at, id)) = self.seen_order.front() {
            if now.duration_since(*admitted_at) <= window {
                break;
            }
            if self.pending.iter().any(|s| s.id() == id.as_str()) {
                break;
            }
            if let Some((_, id)) = self.seen_order.pop_front() {
                self.seen.remove(&id);
            }
        }
    }
}

/// Thread-safe signal queue
#[derive(Debug)]
pub struct SignalStore {
    max_queue_size: usize,
    max_history: usize,
    dedup_window: Option<Duration>,
    inner: Mutex<StoreInner>,
}

impl SignalStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            max_queue_size: config.max_queue_size,
            max_history: config.max_history,
            dedup_window: config.dedup_window(),
            inner: Mutex::new(StoreInner {
                pending: VecDeque::with_capacity(config.max_queue_size.min(1024)),
                history: VecDeque::new(),
                seen: HashMap::new(),
                seen_order: VecDeque::new(),
            }),
        }
    }

    /// Store with explicit capacities and no dedup expiry
    pub fn with_capacity(max_queue_size: usize, max_history: usize) -> Self {
        Self::new(&StoreConfig {
            max_queue_size,
            max_history,
            dedup_window_secs: None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // Critical sections only move whole values; a panic cannot leave
        // the collections half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Validate and enqueue a signal.
    ///
    /// Rejects, in order: validation failure, duplicate id, full queue.
    /// A rejected signal leaves the store untouched.
    pub fn add(&self, signal: Signal) -> Result<(), AdmissionError> {
        signal.validate()?;

        let mut inner = self.lock();
        if let Some(window) = self.dedup_window {
            inner.prune_seen(Instant::now(), window);
        }

        if inner.seen.contains_key(signal.id()) {
            return Err(AdmissionError::Duplicate(signal.id().to_string()));
        }

        if inner.pending.len() >= self.max_queue_size {
            return Err(AdmissionError::QueueFull(self.max_queue_size));
        }

        let now = Instant::now();
        let id = signal.id().to_string();
        inner.seen.insert(id.clone(), now);
        inner.seen_order.push_back((now, id));
        inner.pending.push_back(signal);
        Ok(())
    }

    /// Remove up to `count` signals (all when `None`) in FIFO order and
    /// record them in history.
    pub fn take(&self, count: Option<usize>) -> Vec<Signal> {
        let mut inner = self.lock();
        let n = count.map_or(inner.pending.len(), |c| c.min(inner.pending.len()));
        let taken: Vec<Signal> = inner.pending.drain(..n).collect();

        inner.history.extend(taken.iter().cloned());
        let overflow = inner.history.len().saturating_sub(self.max_history);
        inner.history.drain(..overflow);

        taken
    }

    /// Number of pending signals
    pub fn size(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Drop every pending signal. Their ids stay in the dedup set.
    pub fn clear(&self) {
        self.lock().pending.clear();
    }

    /// Delivered signals, most recent first, at most `limit` of them
    pub fn history(&self, limit: Option<usize>) -> Vec<Signal> {
        let inner = self.lock();
        let limit = limit.unwrap_or(inner.history.len());
        inner.history.iter().rev().take(limit).cloned().collect()
    }

    /// Search history newest-first
    pub fn find(&self, signal_id: &str) -> Option<Signal> {
        self.lock()
            .history
            .iter()
            .rev()
            .find(|s| s.id() == signal_id)
            .cloned()
    }

    /// Size of the dedup set
    pub fn seen_count(&self) -> usize {
        self.lock().seen.len()
    }
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

// =============================================================================
// Tests
// =============================================================================
