//! In-memory [`StateStore`].
//!
//! Clones share the same map, so a store handed to one runner can be handed to
//! its successor to simulate a client restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::model::{Allocation, TaskStateRecord};
use crate::state::StateStore;

#[derive(Default)]
struct Entry {
    alloc: Option<Allocation>,
    tasks: BTreeMap<String, TaskStateRecord>,
}

/// Shared in-memory state store.
#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// True if anything is stored for `alloc_id`.
    pub fn contains(&self, alloc_id: &str) -> bool {
        self.inner.lock().contains_key(alloc_id)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemStore {
    async fn put_alloc(&self, alloc: &Allocation) -> Result<(), StoreError> {
        self.check_writable()?;
        self.inner
            .lock()
            .entry(alloc.id.clone())
            .or_default()
            .alloc = Some(alloc.clone());
        Ok(())
    }

    async fn get_alloc(&self, alloc_id: &str) -> Result<Option<Allocation>, StoreError> {
        Ok(self.inner.lock().get(alloc_id).and_then(|e| e.alloc.clone()))
    }

    async fn put_task_state(
        &self,
        alloc_id: &str,
        task: &str,
        record: &TaskStateRecord,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.inner
            .lock()
            .entry(alloc_id.to_string())
            .or_default()
            .tasks
            .insert(task.to_string(), record.clone());
        Ok(())
    }

    async fn get_task_states(
        &self,
        alloc_id: &str,
    ) -> Result<BTreeMap<String, TaskStateRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .get(alloc_id)
            .map(|e| e.tasks.clone())
            .unwrap_or_default())
    }

    async fn delete_alloc(&self, alloc_id: &str) -> Result<(), StoreError> {
        self.inner.lock().remove(alloc_id);
        Ok(())
    }
}
