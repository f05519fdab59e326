//! Single-slot coalescing mailbox.
//!
//! Producers never block: posting into an occupied slot replaces the pending
//! item (latest wins, oldest dropped). The consumer therefore lags the
//! producer by at most one item, whatever the load.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;

pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    ready: Notify,
    closed: AtomicBool,
    coalesced: AtomicU64,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Notify::new(),
            closed: AtomicBool::new(false),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Stores `item`, overwriting whatever was pending.
    ///
    /// Returns `true` when a pending item was displaced. Posting into a closed
    /// mailbox is silently ignored.
    pub fn post(&self, item: T) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let displaced = self.slot.lock().replace(item).is_some();
        if displaced {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
        }
        // notify_one keeps a permit when the consumer is not parked yet.
        self.ready.notify_one();
        displaced
    }

    /// Takes the pending item, if any, without waiting.
    pub fn try_take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Waits for the next item. Returns `None` once the mailbox is closed and
    /// drained.
    ///
    /// Intended for a single consumer.
    pub async fn recv(&self) -> Option<T> {
        loop {
            if let Some(item) = self.try_take() {
                return Some(item);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.ready.notified().await;
        }
    }

    /// Stops accepting items and wakes the consumer.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.ready.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of items dropped because a newer one replaced them.
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
