//! Per-runner timestamp source.
//!
//! Every timestamp written into a task record comes from one
//! [`MonotonicClock`], so two stamps taken in sequence are strictly ordered even
//! when the wall clock is coarse or steps backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
pub(crate) struct MonotonicClock {
    last_nanos: AtomicU64,
}

impl MonotonicClock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wall-clock now, bumped to at least one nanosecond past the previous stamp.
    pub(crate) fn now(&self) -> SystemTime {
        let wall = nanos_since_epoch(SystemTime::now());
        let mut prev = self.last_nanos.load(Ordering::Acquire);
        loop {
            let next = wall.max(prev.saturating_add(1));
            match self.last_nanos.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return UNIX_EPOCH + Duration::from_nanos(next),
                Err(actual) => prev = actual,
            }
        }
    }

    /// Makes later stamps sort after `t` (used for restored records).
    pub(crate) fn observe(&self, t: SystemTime) {
        self.last_nanos
            .fetch_max(nanos_since_epoch(t), Ordering::AcqRel);
    }
}

fn nanos_since_epoch(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}
