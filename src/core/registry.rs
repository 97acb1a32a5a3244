//! # Allocation registry: the client's map of live allocation runners.
//!
//! Enforces that one allocation id is owned by at most one active runner, which
//! in turn gives each runner exclusive use of its slice of the state store.
//!
//! ## Rules
//! - `insert` rejects an id whose runner has not finished teardown.
//! - `remove` destroys the runner and waits (bounded) for its GC.
//! - The registry never spawns `run`; the caller owns that future.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::core::AllocRunner;
use crate::error::RunnerError;

/// Registry of allocation runners keyed by allocation id.
pub struct AllocRegistry {
    runners: RwLock<HashMap<String, Arc<AllocRunner>>>,
    destroy_timeout: Duration,
}

impl AllocRegistry {
    /// Creates an empty registry; `destroy_timeout` bounds `remove`.
    pub fn new(destroy_timeout: Duration) -> Self {
        Self {
            runners: RwLock::new(HashMap::new()),
            destroy_timeout,
        }
    }

    /// Registers a runner. Fails if a runner for the same id is still active.
    pub async fn insert(&self, runner: Arc<AllocRunner>) -> Result<(), RunnerError> {
        let mut runners = self.runners.write().await;
        if let Some(existing) = runners.get(runner.id()) {
            if !existing.is_destroyed() {
                return Err(RunnerError::Duplicate {
                    alloc_id: runner.id().to_string(),
                });
            }
        }
        tracing::debug!(alloc = runner.id(), "registered allocation runner");
        runners.insert(runner.id().to_string(), runner);
        Ok(())
    }

    /// Looks up a runner.
    pub async fn get(&self, alloc_id: &str) -> Option<Arc<AllocRunner>> {
        self.runners.read().await.get(alloc_id).cloned()
    }

    /// Returns sorted list of registered allocation ids.
    pub async fn list(&self) -> Vec<String> {
        let runners = self.runners.read().await;
        let mut ids: Vec<String> = runners.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns true if registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.runners.read().await.is_empty()
    }

    /// Destroys and unregisters a runner, waiting for its GC.
    ///
    /// Returns `Ok(false)` if no runner was registered under `alloc_id`.
    pub async fn remove(&self, alloc_id: &str) -> Result<bool, RunnerError> {
        let Some(runner) = self.take(alloc_id).await else {
            return Ok(false);
        };
        self.destroy_and_wait(&runner).await?;
        Ok(true)
    }

    /// Destroys every runner; all teardowns proceed concurrently.
    ///
    /// Returns the errors of runners that did not finish GC in time.
    pub async fn destroy_all(&self) -> Vec<RunnerError> {
        let runners: Vec<Arc<AllocRunner>> = {
            let mut map = self.runners.write().await;
            map.drain().map(|(_, r)| r).collect()
        };
        let results =
            futures::future::join_all(runners.iter().map(|r| self.destroy_and_wait(r))).await;
        results.into_iter().filter_map(Result::err).collect()
    }

    async fn take(&self, alloc_id: &str) -> Option<Arc<AllocRunner>> {
        self.runners.write().await.remove(alloc_id)
    }

    async fn destroy_and_wait(&self, runner: &AllocRunner) -> Result<(), RunnerError> {
        runner.destroy().await;
        tokio::time::timeout(self.destroy_timeout, runner.destroyed())
            .await
            .map_err(|_| RunnerError::DestroyTimeout {
                alloc_id: runner.id().to_string(),
                waited: self.destroy_timeout,
            })
    }
}
