//! # Runner hooks.
//!
//! Hooks plug node-local setup and teardown around the task group:
//! pre-run hooks run before any task starts, post-run hooks after the control
//! loop exits. Both run sequentially in registration order.
//!
//! A failing pre-run hook aborts the run: no task is started and every task is
//! marked Dead and failed. Post-run failures are logged and otherwise ignored.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HookError;
use crate::model::{AllocState, Allocation};

/// Runs before any task starts.
#[async_trait]
pub trait PrerunHook: Send + Sync + 'static {
    /// Hook name (for logs and task events).
    fn name(&self) -> &'static str;

    /// Prepares the node for `alloc`.
    async fn prerun(&self, alloc: &Allocation) -> Result<(), HookError>;
}

/// Runs after every task is Dead.
#[async_trait]
pub trait PostrunHook: Send + Sync + 'static {
    /// Hook name (for logs).
    fn name(&self) -> &'static str;

    /// Cleans up after `alloc`; `state` is the final status.
    async fn postrun(&self, alloc: &Allocation, state: &AllocState) -> Result<(), HookError>;
}

/// A hook registered with an allocation runner.
#[derive(Clone)]
pub enum RunnerHook {
    /// Pre-run hook.
    Prerun(Arc<dyn PrerunHook>),
    /// Post-run hook.
    Postrun(Arc<dyn PostrunHook>),
}

impl RunnerHook {
    /// Hook name.
    pub fn name(&self) -> &'static str {
        match self {
            RunnerHook::Prerun(h) => h.name(),
            RunnerHook::Postrun(h) => h.name(),
        }
    }
}

/// Runs every pre-run hook in order, stopping at the first failure.
pub(crate) async fn run_prerun(hooks: &[RunnerHook], alloc: &Allocation) -> Result<(), HookError> {
    for hook in hooks {
        if let RunnerHook::Prerun(h) = hook {
            tracing::debug!(alloc = %alloc.id, hook = h.name(), "running prerun hook");
            h.prerun(alloc).await?;
        }
    }
    Ok(())
}

/// Runs every post-run hook in order; failures are logged and skipped.
pub(crate) async fn run_postrun(
    hooks: &[RunnerHook],
    alloc: &Allocation,
    state: &AllocState,
) -> Vec<HookError> {
    let mut failed = Vec::new();
    for hook in hooks {
        if let RunnerHook::Postrun(h) = hook {
            tracing::debug!(alloc = %alloc.id, hook = h.name(), "running postrun hook");
            if let Err(e) = h.postrun(alloc, state).await {
                tracing::warn!(alloc = %alloc.id, hook = e.hook, reason = %e.reason, "postrun hook failed");
                failed.push(e);
            }
        }
    }
    failed
}
