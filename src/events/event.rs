//! # Runtime events emitted by the allocation runner and task runners.
//!
//! The [`EventKind`] enum classifies events across five groups:
//! - **Runner lifecycle**: run loop start/exit, destroy
//! - **Task lifecycle**: starting, exited, restarting, killing, dead
//! - **Group coordination**: leader death, group stop
//! - **Updates**: queued, replaced, dropped, applied
//! - **Plumbing**: persistence failures, hook failures, subscriber trouble
//!
//! These are observability events, distinct from the per-task
//! [`TaskEvent`](crate::TaskEvent) history that is part of the task state.
//!
//! ## Example
//! ```rust
//! use allocvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskRestarting)
//!     .with_alloc("a1")
//!     .with_task("web")
//!     .with_attempt(2);
//!
//! assert_eq!(ev.kind, EventKind::TaskRestarting);
//! assert_eq!(ev.task.as_deref(), Some("web"));
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing (`task` = subscriber name).
    SubscriberPanicked,
    /// Subscriber dropped an event (`task` = subscriber name, `reason` = full/closed).
    SubscriberOverflow,

    // === Runner lifecycle ===
    /// Control loop started.
    RunnerStarted,
    /// Control loop exited (`reason` = final client status).
    RunnerExited,
    /// `destroy` was called.
    DestroyRequested,
    /// Teardown finished; the completion signal has fired.
    RunnerDestroyed,

    // === Task lifecycle ===
    /// Driver is starting the task (`attempt` = 1-based start count).
    TaskStarting,
    /// Task exited on its own (`reason` = outcome).
    TaskExited,
    /// Restart scheduled (`delay_ms`, `attempt`).
    TaskRestarting,
    /// Kill signal delivered (`timeout_ms` = kill timeout, `reason` = cause).
    TaskKilling,
    /// Task ignored its kill signal past the timeout and was force-terminated.
    TaskForceKilled,
    /// Task reached Dead.
    TaskDead,
    /// Driver refused to start the task.
    DriverFailure,

    // === Group coordination ===
    /// The leader task died; followers are being killed (`task` = leader).
    LeaderDead,
    /// Group stop requested (`reason` = trigger).
    GroupStopRequested,

    // === Updates ===
    /// Update placed into an empty slot (`modify_index`).
    UpdateQueued,
    /// Update replaced a queued one (`modify_index`).
    UpdateReplaced,
    /// Update discarded (`reason` = stale/closed/foreign, `modify_index`).
    UpdateDropped,
    /// Update applied by the control loop (`modify_index`).
    UpdateApplied,

    // === Plumbing ===
    /// State store write failed (`reason` = error).
    PersistFailed,
    /// A runner hook failed (`task` = hook name).
    HookFailed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: per-bus monotonic sequence, stamped by [`Bus::publish`](crate::Bus::publish)
/// - `at`: wall-clock timestamp
/// - other optional fields depend on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Monotonic sequence number (0 until published).
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Allocation id, if applicable.
    pub alloc: Option<Arc<str>>,
    /// Task (or subscriber/hook) name, if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
    /// Start attempt (1-based).
    pub attempt: Option<u32>,
    /// Restart delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Kill timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Allocation modify index.
    pub modify_index: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            alloc: None,
            task: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            modify_index: None,
        }
    }

    /// Attaches an allocation id.
    #[inline]
    pub fn with_alloc(mut self, alloc: impl Into<Arc<str>>) -> Self {
        self.alloc = Some(alloc.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a restart delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(as_compact_ms(d));
        self
    }

    /// Attaches a kill timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(as_compact_ms(d));
        self
    }

    /// Attaches an allocation modify index.
    #[inline]
    pub fn with_modify_index(mut self, index: u64) -> Self {
        self.modify_index = Some(index);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for events produced by subscriber workers themselves.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

fn as_compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_fields() {
        let ev = Event::new(EventKind::TaskKilling)
            .with_alloc("a1")
            .with_task("web")
            .with_timeout(Duration::from_secs(5))
            .with_reason("leader dead");
        assert_eq!(ev.alloc.as_deref(), Some("a1"));
        assert_eq!(ev.timeout_ms, Some(5000));
        assert_eq!(ev.reason.as_deref(), Some("leader dead"));
        assert_eq!(ev.seq, 0);
    }

    #[test]
    fn huge_durations_saturate() {
        let ev = Event::new(EventKind::TaskRestarting).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn subscriber_events_are_flagged() {
        assert!(Event::subscriber_overflow("log", "full").is_subscriber_event());
        assert!(!Event::new(EventKind::TaskDead).is_subscriber_event());
    }
}
