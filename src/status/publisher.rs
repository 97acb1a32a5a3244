use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::model::AllocState;
use crate::status::UpdaterRef;

/// Coalescing, non-blocking front for a [`StatusUpdater`](crate::StatusUpdater).
pub struct StatusPublisher {
    tx: watch::Sender<AllocState>,
    worker: JoinHandle<()>,
}

impl StatusPublisher {
    /// Spawns the forwarding worker. Must be called from within a tokio runtime.
    pub fn spawn(updater: UpdaterRef, initial: AllocState) -> Self {
        let (tx, mut rx) = watch::channel(initial);
        let worker = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                updater.update(state).await;
            }
        });
        Self { tx, worker }
    }

    /// Replaces the pending snapshot. Identical consecutive states are skipped.
    pub fn publish(&self, state: AllocState) {
        self.tx.send_if_modified(|cur| {
            if *cur == state {
                return false;
            }
            *cur = state;
            true
        });
    }

    /// Delivers whatever is still pending, then stops the worker.
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            tracing::warn!(error = %e, "status updater worker failed");
        }
    }
}
