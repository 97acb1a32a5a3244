use std::sync::Arc;

use async_trait::async_trait;

use crate::model::AllocState;

/// Shared handle to a status updater.
pub type UpdaterRef = Arc<dyn StatusUpdater>;

/// Receives allocation status snapshots, e.g. to report them upstream.
#[async_trait]
pub trait StatusUpdater: Send + Sync + 'static {
    /// Called with the latest snapshot. May be slow; calls are serialized.
    async fn update(&self, state: AllocState);
}

/// Updater that discards every snapshot.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopUpdater;

#[async_trait]
impl StatusUpdater for NoopUpdater {
    async fn update(&self, _state: AllocState) {}
}
