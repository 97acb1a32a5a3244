//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to observability events emitted by the allocation runner,
//! task runners, the update queue and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `AllocRunner`, `TaskRunner`, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the runner's fan-out listener (feeds `SubscriberSet`) and
//!   anyone holding a receiver from [`AllocRunner::events`](crate::AllocRunner::events).
//!
//! Events are for observation only; the lifecycle never depends on their delivery.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
