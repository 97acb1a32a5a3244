use std::sync::Arc;

use crate::{
    core::{AllocRunner, AllocRunnerConfig, RunnerConfig},
    drivers::{DriverRef, MockDriver},
    error::RunnerError,
    hooks::RunnerHook,
    model::Allocation,
    state::{MemStore, StoreRef},
    status::{NoopUpdater, UpdaterRef},
    subscribers::Subscribe,
};

/// Builder for constructing an [`AllocRunner`] with optional collaborators.
///
/// Unset collaborators default to a [`MockDriver`], a fresh [`MemStore`] and a
/// [`NoopUpdater`].
pub struct AllocRunnerBuilder {
    alloc: Allocation,
    driver: Option<DriverRef>,
    store: Option<StoreRef>,
    updater: Option<UpdaterRef>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    hooks: Vec<RunnerHook>,
    cfg: RunnerConfig,
}

impl AllocRunnerBuilder {
    /// Creates a new builder for `alloc`.
    pub fn new(alloc: Allocation) -> Self {
        Self {
            alloc,
            driver: None,
            store: None,
            updater: None,
            subscribers: Vec::new(),
            hooks: Vec::new(),
            cfg: RunnerConfig::default(),
        }
    }

    /// Sets the execution backend.
    pub fn with_driver(mut self, driver: DriverRef) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Sets the state store.
    pub fn with_store(mut self, store: StoreRef) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the status updater.
    pub fn with_updater(mut self, updater: UpdaterRef) -> Self {
        self.updater = Some(updater);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Appends a hook; hooks of the same kind run in the order they were added.
    pub fn with_hook(mut self, hook: RunnerHook) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Replaces every hook.
    pub fn with_hooks(mut self, hooks: Vec<RunnerHook>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Sets the runner configuration.
    pub fn with_config(mut self, cfg: RunnerConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Validates the allocation and builds the runner.
    pub fn build(self) -> Result<Arc<AllocRunner>, RunnerError> {
        AllocRunner::new(AllocRunnerConfig {
            alloc: self.alloc,
            driver: self.driver.unwrap_or_else(|| Arc::new(MockDriver::new())),
            store: self.store.unwrap_or_else(|| Arc::new(MemStore::new())),
            updater: self.updater.unwrap_or_else(|| Arc::new(NoopUpdater)),
            subscribers: self.subscribers,
            hooks: self.hooks,
            config: self.cfg,
        })
    }
}
