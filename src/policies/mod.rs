//! Restart policies.
//!
//! This module groups the knobs that control **if/when** a failed task is
//! restarted and **how long** to wait before it starts again.
//!
//! ## Contents
//! - [`RestartPolicy`] attempts / interval / delay / mode, plus the evaluator
//! - [`RestartTracker`] per-task failure window
//! - [`BackoffPolicy`] growth of the delay with repeated failures
//! - [`JitterPolicy`]  randomization of the final delay
//!
//! ## Quick wiring
//! ```text
//! Allocation { restart_policy }
//!      └─► core::task_runner::TaskRunner owns a RestartTracker and calls
//!          record_failure(now) once per failed exit
//! ```

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::{RestartDecision, RestartMode, RestartPolicy, RestartTracker};
