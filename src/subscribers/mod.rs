//! # Event subscribers for the allocation runner.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   TaskRunner / control loop ── publish(Event) ──► Bus ──► fan-out listener
//!                                                               │
//!                                                        SubscriberSet::emit
//!                                                     ┌─────────┼─────────┐
//!                                                     ▼         ▼         ▼
//!                                                 LogWriter  Metrics   Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use allocvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct DeathCounter;
//!
//! #[async_trait]
//! impl Subscribe for DeathCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::TaskDead {
//!             // increment a counter
//!         }
//!     }
//!     fn name(&self) -> &'static str { "death-counter" }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
