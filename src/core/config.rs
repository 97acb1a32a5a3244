//! # Runner configuration.
//!
//! Provides [`RunnerConfig`], the node-local knobs of an allocation runner.
//! Per-task settings in the [`Allocation`](crate::Allocation) override these
//! where both exist.
//!
//! ## Sentinel values
//! - `TaskDef::kill_timeout = None` → `RunnerConfig::kill_timeout`
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::model::TaskDef;

/// Configuration shared by every task runner of one allocation runner.
///
/// ## Field semantics
/// - `kill_timeout`: time between the kill signal and force termination
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `destroy_timeout`: upper bound used by [`AllocRegistry`](crate::AllocRegistry) while awaiting GC
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Default kill timeout for tasks that do not set their own.
    pub kill_timeout: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` messages observe
    /// `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// How long the registry waits for a removed runner to finish GC.
    pub destroy_timeout: Duration,
}

impl RunnerConfig {
    /// Kill timeout for `task`, falling back to the runner default.
    #[inline]
    pub fn kill_timeout_for(&self, task: &TaskDef) -> Duration {
        task.kill_timeout.unwrap_or(self.kill_timeout)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for RunnerConfig {
    /// - `kill_timeout = 5s`
    /// - `bus_capacity = 1024`
    /// - `destroy_timeout = 30s`
    fn default() -> Self {
        Self {
            kill_timeout: Duration::from_secs(5),
            bus_capacity: 1024,
            destroy_timeout: Duration::from_secs(30),
        }
    }
}
