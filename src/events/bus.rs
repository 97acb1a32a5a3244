//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from multiple sources (task runners, the
//! control loop) and stamps each event with a per-bus sequence number.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                 Receivers:
//!   TaskRunner 1 ──┐
//!   TaskRunner 2 ──┼──────► Bus ───────► fan-out listener ────► SubscriberSet
//!   TaskRunner N ──┤  (broadcast chan) └──► AllocRunner::events() receivers
//!   Control loop ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: slow receivers observe `RecvError::Lagged(n)`.
//! - **No persistence**: events are lost if nobody is subscribed at send time.
//! - **Ordering**: `seq` increases monotonically per bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone; clones share the channel and the sequence counter.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
    seq: Arc<AtomicU64>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stamps the next sequence number and publishes to all active receivers.
    ///
    /// If there are no receivers the event is dropped.
    pub fn publish(&self, mut ev: Event) {
        ev.seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn sequence_is_monotonic() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::RunnerStarted));
        bus.publish(Event::new(EventKind::RunnerExited));

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        assert!(a.seq < b.seq);
        assert_eq!(a.kind, EventKind::RunnerStarted);
    }

    #[test]
    fn publish_without_receivers_is_fine() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::RunnerStarted));
    }
}
