//! Error types used by the allocation runner, task runners and collaborators.
//!
//! - [`RunnerError`] errors raised by the allocation runner itself.
//! - [`TaskError`] outcomes of a single task execution reported by a driver.
//! - [`StoreError`] state store failures (never fatal to the control loop).
//! - [`HookError`] pre-run / post-run hook failures.
//!
//! All enums provide `as_label` for logs and event reasons.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the allocation runner.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The allocation failed validation at construction time.
    #[error("invalid allocation {alloc_id}: {reason}")]
    InvalidAllocation {
        /// Allocation identifier.
        alloc_id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// `run` was called more than once, or after teardown.
    #[error("allocation runner {alloc_id} already started")]
    AlreadyRunning {
        /// Allocation identifier.
        alloc_id: String,
    },

    /// `restore` was called after `run`, or the store could not be read.
    #[error("restore failed for {alloc_id}: {reason}")]
    Restore {
        /// Allocation identifier.
        alloc_id: String,
        /// Underlying cause.
        reason: String,
    },

    /// A runner for this allocation id is already registered.
    #[error("allocation runner {alloc_id} already registered")]
    Duplicate {
        /// Allocation identifier.
        alloc_id: String,
    },

    /// Teardown did not finish within the given bound.
    #[error("destroy of {alloc_id} not finished after {waited:?}")]
    DestroyTimeout {
        /// Allocation identifier.
        alloc_id: String,
        /// How long we waited.
        waited: Duration,
    },
}

impl RunnerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use allocvisor::RunnerError;
    ///
    /// let err = RunnerError::AlreadyRunning { alloc_id: "a1".into() };
    /// assert_eq!(err.as_label(), "runner_already_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RunnerError::InvalidAllocation { .. } => "runner_invalid_allocation",
            RunnerError::AlreadyRunning { .. } => "runner_already_running",
            RunnerError::Restore { .. } => "runner_restore_failed",
            RunnerError::Duplicate { .. } => "runner_duplicate",
            RunnerError::DestroyTimeout { .. } => "runner_destroy_timeout",
        }
    }
}

/// # Outcome of one task execution, as reported by a driver.
///
/// `Ok(())` from a driver future means the task exited with code 0.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task exited with a non-zero exit code.
    #[error("exited with code {code}")]
    Exit {
        /// Process exit code.
        code: i32,
    },

    /// Task failed but may succeed if restarted.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable error; the restart policy is not consulted.
    #[error("fatal error (no restart): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Task exited in response to a kill signal.
    #[error("killed")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use allocvisor::TaskError;
    ///
    /// assert_eq!(TaskError::Exit { code: 2 }.as_label(), "task_exit");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Exit { .. } => "task_exit",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Exit code to record on the `Terminated` event.
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskError::Exit { code } => *code,
            TaskError::Canceled => 0,
            _ => 1,
        }
    }

    /// Indicates whether the restart policy may restart the task.
    ///
    /// # Example
    /// ```
    /// use allocvisor::TaskError;
    ///
    /// assert!(TaskError::Exit { code: 1 }.is_retryable());
    /// assert!(!TaskError::Fatal { error: "bad config".into() }.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Exit { .. } | TaskError::Fail { .. })
    }
}

/// # Errors produced by a [`StateStore`](crate::StateStore).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem or other I/O failure.
    #[error("state store io: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded or decoded.
    #[error("state store codec: {0}")]
    Codec(#[from] serde_json::Error),

    /// Backend refused the write.
    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "store_io",
            StoreError::Codec(_) => "store_codec",
            StoreError::Unavailable(_) => "store_unavailable",
        }
    }
}

/// # Error returned by a runner hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("hook {hook} failed: {reason}")]
pub struct HookError {
    /// Hook name.
    pub hook: &'static str,
    /// Failure description.
    pub reason: String,
}

impl HookError {
    /// Creates a hook error.
    pub fn new(hook: &'static str, reason: impl Into<String>) -> Self {
        Self {
            hook,
            reason: reason.into(),
        }
    }
}
