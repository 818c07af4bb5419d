//! Scheduling state: the worker-slot semaphore, the pause signal and the
//! per-batch cancellation token.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStateSnapshot {
    pub limit: usize,
    pub paused: bool,
    pub cancelled: bool,
    pub in_flight: usize,
    /// Highest `in_flight` seen since the current batch started.
    pub peak_in_flight: usize,
}

#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

/// A held worker slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
    counters: Arc<InFlight>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.counters.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Concurrency limit plus pause/cancel signals shared by the dispatcher and
/// the workers.
#[derive(Debug)]
pub struct QueueControl {
    limit: usize,
    slots: Arc<Semaphore>,
    paused: watch::Sender<bool>,
    cancel: Mutex<CancellationToken>,
    counters: Arc<InFlight>,
}

impl QueueControl {
    /// `limit` is clamped to at least one slot.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        let (paused, _) = watch::channel(false);
        Self {
            limit,
            slots: Arc::new(Semaphore::new(limit)),
            paused,
            cancel: Mutex::new(CancellationToken::new()),
            counters: Arc::new(InFlight::default()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Arm a fresh cancellation token for a new batch and return it.
    pub fn begin_batch(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        self.counters
            .peak
            .store(self.counters.current.load(Ordering::SeqCst), Ordering::SeqCst);
        token
    }

    /// Set the paused flag. Returns `false` if it was already set.
    pub fn pause(&self) -> bool {
        !self.paused.send_replace(true)
    }

    /// Clear the paused flag. Returns `false` if it was not set.
    pub fn resume(&self) -> bool {
        self.paused.send_replace(false)
    }

    /// Cancel the current batch. Returns `false` if it was already cancelled.
    pub fn cancel(&self) -> bool {
        let token = self.cancel.lock();
        if token.is_cancelled() {
            false
        } else {
            token.cancel();
            true
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.lock().is_cancelled()
    }

    /// Wait while paused. Returns `false` if `cancel` fired first.
    pub async fn wait_until_resumed(&self, cancel: &CancellationToken) -> bool {
        let mut rx = self.paused.subscribe();
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            if !*rx.borrow_and_update() {
                return true;
            }
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return true;
                    }
                }
                _ = cancel.cancelled() => return false,
            }
        }
    }

    /// Wait for a free worker slot. Returns `None` if `cancel` fired first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<Slot> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            permit = self.slots.clone().acquire_owned() => permit.ok()?,
        };

        let now = self.counters.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(now, Ordering::SeqCst);
        Some(Slot {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        })
    }

    pub fn snapshot(&self) -> QueueStateSnapshot {
        QueueStateSnapshot {
            limit: self.limit,
            paused: self.is_paused(),
            cancelled: self.is_cancelled(),
            in_flight: self.counters.current.load(Ordering::SeqCst),
            peak_in_flight: self.counters.peak.load(Ordering::SeqCst),
        }
    }
}
