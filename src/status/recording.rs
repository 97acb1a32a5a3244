//! Updater that keeps every snapshot it receives, for assertions.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::model::AllocState;
use crate::status::StatusUpdater;

/// In-memory [`StatusUpdater`]; clones share the history.
#[derive(Clone, Default)]
pub struct RecordingUpdater {
    history: Arc<Mutex<Vec<AllocState>>>,
}

impl RecordingUpdater {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent snapshot.
    pub fn last(&self) -> Option<AllocState> {
        self.history.lock().last().cloned()
    }

    /// Number of snapshots received.
    pub fn count(&self) -> usize {
        self.history.lock().len()
    }

    /// Forgets everything received so far.
    pub fn reset(&self) {
        self.history.lock().clear();
    }

    /// Every snapshot received, oldest first.
    pub fn history(&self) -> Vec<AllocState> {
        self.history.lock().clone()
    }
}

#[async_trait]
impl StatusUpdater for RecordingUpdater {
    async fn update(&self, state: AllocState) {
        self.history.lock().push(state);
    }
}
