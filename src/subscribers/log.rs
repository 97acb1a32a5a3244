//! # LogWriter: runtime events as `tracing` records
//!
//! Maps every [`Event`] to one structured `tracing` record under the
//! `allocvisor::events` target. Lifecycle noise goes to `debug`, kills and
//! leader deaths to `info`, degraded paths to `warn`.

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let alloc = e.alloc.as_deref().unwrap_or("-");
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::TaskStarting => {
                tracing::debug!(target: "allocvisor::events", seq = e.seq, alloc, task, attempt = ?e.attempt, "starting")
            }
            EventKind::TaskExited => {
                tracing::debug!(target: "allocvisor::events", seq = e.seq, alloc, task, reason, "exited")
            }
            EventKind::TaskRestarting => {
                tracing::info!(target: "allocvisor::events", seq = e.seq, alloc, task, delay_ms = ?e.delay_ms, attempt = ?e.attempt, "restarting")
            }
            EventKind::TaskKilling => {
                tracing::info!(target: "allocvisor::events", seq = e.seq, alloc, task, timeout_ms = ?e.timeout_ms, reason, "killing")
            }
            EventKind::TaskForceKilled => {
                tracing::warn!(target: "allocvisor::events", seq = e.seq, alloc, task, "kill timeout exceeded; force-terminated")
            }
            EventKind::TaskDead => {
                tracing::debug!(target: "allocvisor::events", seq = e.seq, alloc, task, reason, "dead")
            }
            EventKind::DriverFailure => {
                tracing::warn!(target: "allocvisor::events", seq = e.seq, alloc, task, reason, "driver failure")
            }
            EventKind::LeaderDead => {
                tracing::info!(target: "allocvisor::events", seq = e.seq, alloc, leader = task, "leader dead; killing followers")
            }
            EventKind::GroupStopRequested => {
                tracing::info!(target: "allocvisor::events", seq = e.seq, alloc, reason, "group stop")
            }
            EventKind::UpdateQueued | EventKind::UpdateReplaced | EventKind::UpdateApplied => {
                tracing::debug!(target: "allocvisor::events", seq = e.seq, alloc, kind = ?e.kind, modify_index = ?e.modify_index, "update")
            }
            EventKind::UpdateDropped => {
                tracing::debug!(target: "allocvisor::events", seq = e.seq, alloc, modify_index = ?e.modify_index, reason, "update dropped")
            }
            EventKind::RunnerStarted | EventKind::DestroyRequested | EventKind::RunnerDestroyed => {
                tracing::debug!(target: "allocvisor::events", seq = e.seq, alloc, kind = ?e.kind, "runner")
            }
            EventKind::RunnerExited => {
                tracing::info!(target: "allocvisor::events", seq = e.seq, alloc, status = reason, "runner exited")
            }
            EventKind::PersistFailed => {
                tracing::warn!(target: "allocvisor::events", seq = e.seq, alloc, task, reason, "persist failed")
            }
            EventKind::HookFailed => {
                tracing::warn!(target: "allocvisor::events", seq = e.seq, alloc, hook = task, reason, "hook failed")
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                tracing::warn!(target: "allocvisor::events", seq = e.seq, subscriber = task, reason, kind = ?e.kind, "subscriber")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
