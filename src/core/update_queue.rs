//! # Update queue: single-slot coalescing mailbox.
//!
//! Only the newest desired allocation matters, so the queue holds at most one
//! entry. A newer `modify_index` replaces the queued one; equal or older indexes
//! are dropped. Producers never block.
//!
//! ```text
//! update(v3) ─► [v3]
//! update(v5) ─► [v5]      (Replaced)
//! update(v4) ─► [v5]      (Stale)
//! drain()    ─► v5, []
//! close()    ─► every later enqueue returns Closed
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::model::Allocation;

/// Result of offering an allocation to the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Placed into an empty slot.
    Enqueued,
    /// Replaced a queued allocation with a lower modify index.
    Replaced,
    /// Dropped: the queued allocation is as new or newer.
    Stale,
    /// Dropped: the runner is torn down.
    Closed,
    /// Dropped: the allocation id does not match the runner's.
    Foreign,
}

impl EnqueueOutcome {
    /// True if the allocation is now queued.
    #[inline]
    pub fn accepted(&self) -> bool {
        matches!(self, EnqueueOutcome::Enqueued | EnqueueOutcome::Replaced)
    }
}

#[derive(Default)]
struct Slot {
    pending: Option<Arc<Allocation>>,
    closed: bool,
}

#[derive(Default)]
pub(crate) struct UpdateQueue {
    slot: Mutex<Slot>,
    notify: Notify,
}

impl UpdateQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enqueue(&self, alloc: Arc<Allocation>) -> EnqueueOutcome {
        let outcome = {
            let mut slot = self.slot.lock();
            if slot.closed {
                return EnqueueOutcome::Closed;
            }
            match &slot.pending {
                Some(cur) if cur.modify_index >= alloc.modify_index => return EnqueueOutcome::Stale,
                Some(_) => {
                    slot.pending = Some(alloc);
                    EnqueueOutcome::Replaced
                }
                None => {
                    slot.pending = Some(alloc);
                    EnqueueOutcome::Enqueued
                }
            }
        };
        self.notify.notify_one();
        outcome
    }

    /// Takes the queued allocation, if any.
    pub(crate) fn drain(&self) -> Option<Arc<Allocation>> {
        self.slot.lock().pending.take()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        usize::from(self.slot.lock().pending.is_some())
    }

    /// Empties the slot and refuses further updates.
    pub(crate) fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        slot.pending = None;
    }

    /// Resolves after the next successful enqueue (or immediately if one is unobserved).
    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }
}
