//! # Task State Record: lifecycle status of one task.
//!
//! A [`TaskStateRecord`] is owned by exactly one task runner and read by
//! everybody else as a cloned snapshot.
//!
//! ## Lifecycle
//! ```text
//! Pending ──► Running ──► Dead
//!    ▲           │
//!    └───────────┘  (restart: Restarting event, back to Pending)
//! ```
//!
//! ## Invariants
//! - `finished_at` is `None` until `state == Dead`
//! - `Dead` is terminal: later transitions are ignored (events may still be appended)
//! - `events` is append-only and causally ordered

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Coarse task state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Not started yet, or waiting to restart.
    #[default]
    Pending,
    /// Running in the driver.
    Running,
    /// Terminal.
    Dead,
}

impl TaskState {
    /// Lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Dead => "dead",
        }
    }
}

/// Classification of task events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskEventKind {
    /// Task was received by the runner.
    Received,
    /// Driver started the task.
    Started,
    /// Task exited on its own (`exit_code` set).
    Terminated,
    /// Task will be restarted after `restart_delay`.
    Restarting,
    /// Restart policy gave up, or restarts are suppressed.
    NotRestarting,
    /// Driver refused to start the task.
    DriverFailure,
    /// The group leader died; this task is being killed because of it.
    LeaderDead,
    /// Kill signal delivered to the task.
    Killing,
    /// Task exited after a kill signal.
    Killed,
    /// A pre-run hook failed before the task could start.
    HookFailed,
}

/// One entry of a task's event history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Event classification.
    pub kind: TaskEventKind,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Human-readable detail.
    #[serde(default)]
    pub message: Option<String>,
    /// Exit code (for `Terminated`).
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Delay before the next start (for `Restarting`).
    #[serde(default)]
    pub restart_delay: Option<Duration>,
}

impl TaskEvent {
    /// Creates an event of the given kind stamped with the current time.
    ///
    /// The owning task runner re-stamps events when it appends them, so the
    /// history stays strictly ordered.
    pub fn new(kind: TaskEventKind) -> Self {
        Self {
            kind,
            at: SystemTime::now(),
            message: None,
            exit_code: None,
            restart_delay: None,
        }
    }

    /// Attaches a human-readable message.
    #[inline]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches a restart delay.
    #[inline]
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = Some(delay);
        self
    }
}

/// Per-task status snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStateRecord {
    /// Current state.
    pub state: TaskState,
    /// Set when the task died because of a failure (not a kill or clean exit).
    pub failed: bool,
    /// Number of restarts performed.
    pub restarts: u32,
    /// First time the task reached Running.
    pub started_at: Option<SystemTime>,
    /// Time the task reached Dead.
    pub finished_at: Option<SystemTime>,
    /// Event history.
    pub events: Vec<TaskEvent>,
}

impl TaskStateRecord {
    /// Placeholder record for a task that has not started.
    pub fn pending() -> Self {
        Self::default()
    }

    /// True once the task is Dead.
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.state == TaskState::Dead
    }

    /// True if the history contains an event of `kind`.
    pub fn has_event(&self, kind: TaskEventKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    /// Index of the first event of `kind`.
    pub fn event_position(&self, kind: TaskEventKind) -> Option<usize> {
        self.events.iter().position(|e| e.kind == kind)
    }

    /// Number of events of `kind`.
    pub fn count_events(&self, kind: TaskEventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Appends an event stamped `at`.
    pub fn append(&mut self, mut event: TaskEvent, at: SystemTime) {
        event.at = at;
        self.events.push(event);
    }

    /// Applies a state transition at time `at`.
    ///
    /// Returns `false` (and changes nothing) when the record is already Dead
    /// and `state` is not Dead.
    pub fn transition(&mut self, state: TaskState, at: SystemTime) -> bool {
        if self.is_dead() && state != TaskState::Dead {
            return false;
        }
        if self.is_dead() {
            return true;
        }
        match state {
            TaskState::Running => {
                if self.started_at.is_none() {
                    self.started_at = Some(at);
                }
            }
            TaskState::Dead => {
                self.finished_at = Some(at);
            }
            TaskState::Pending => {}
        }
        self.state = state;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_has_no_timestamps() {
        let r = TaskStateRecord::pending();
        assert_eq!(r.state, TaskState::Pending);
        assert!(r.started_at.is_none());
        assert!(r.finished_at.is_none());
        assert!(r.events.is_empty());
    }

    #[test]
    fn finished_at_only_when_dead() {
        let mut r = TaskStateRecord::pending();
        let t0 = SystemTime::now();
        r.transition(TaskState::Running, t0);
        assert_eq!(r.started_at, Some(t0));
        assert!(r.finished_at.is_none());

        let t1 = t0 + Duration::from_secs(1);
        r.transition(TaskState::Dead, t1);
        assert_eq!(r.finished_at, Some(t1));
    }

    #[test]
    fn dead_never_regresses() {
        let mut r = TaskStateRecord::pending();
        let t0 = SystemTime::now();
        r.transition(TaskState::Dead, t0);
        assert!(!r.transition(TaskState::Running, t0 + Duration::from_secs(1)));
        assert_eq!(r.state, TaskState::Dead);
        // a second Dead keeps the first finish time
        r.transition(TaskState::Dead, t0 + Duration::from_secs(2));
        assert_eq!(r.finished_at, Some(t0));
    }

    #[test]
    fn started_at_survives_restart() {
        let mut r = TaskStateRecord::pending();
        let t0 = SystemTime::now();
        r.transition(TaskState::Running, t0);
        r.transition(TaskState::Pending, t0 + Duration::from_secs(1));
        r.transition(TaskState::Running, t0 + Duration::from_secs(2));
        assert_eq!(r.started_at, Some(t0));
    }

    #[test]
    fn event_queries() {
        let mut r = TaskStateRecord::pending();
        let t0 = SystemTime::now();
        r.append(TaskEvent::new(TaskEventKind::Started), t0);
        r.append(TaskEvent::new(TaskEventKind::LeaderDead), t0);
        r.append(TaskEvent::new(TaskEventKind::Killing), t0);
        assert!(r.has_event(TaskEventKind::LeaderDead));
        assert_eq!(r.event_position(TaskEventKind::Killing), Some(2));
        assert_eq!(r.count_events(TaskEventKind::Started), 1);
    }
}
