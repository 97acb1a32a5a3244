use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{Allocation, TaskStateRecord};

/// Shared handle to a state store.
pub type StoreRef = Arc<dyn StateStore>;

/// Persistence contract for one node's allocations.
///
/// Each allocation id is owned by exactly one runner at a time, so
/// implementations need no cross-runner coordination.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// Stores the applied allocation, replacing any previous one.
    async fn put_alloc(&self, alloc: &Allocation) -> Result<(), StoreError>;

    /// Loads the persisted allocation.
    async fn get_alloc(&self, alloc_id: &str) -> Result<Option<Allocation>, StoreError>;

    /// Stores one task's record, replacing any previous one.
    async fn put_task_state(
        &self,
        alloc_id: &str,
        task: &str,
        record: &TaskStateRecord,
    ) -> Result<(), StoreError>;

    /// Loads every persisted task record of an allocation.
    async fn get_task_states(
        &self,
        alloc_id: &str,
    ) -> Result<BTreeMap<String, TaskStateRecord>, StoreError>;

    /// Removes everything persisted for an allocation. Missing data is not an error.
    async fn delete_alloc(&self, alloc_id: &str) -> Result<(), StoreError>;
}
