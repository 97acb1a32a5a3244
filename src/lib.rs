//! # allocvisor
//!
//! **Allocvisor** supervises allocations on a client node: a group of tasks
//! co-scheduled together, started, restarted, and torn down as one unit.
//!
//! It starts every task through a pluggable [`Driver`], applies the group's
//! [`RestartPolicy`], enforces leader/follower semantics (leader death kills
//! the followers; a group stop kills the leader first), persists state through
//! a [`StateStore`] so a restarted client resumes where it left off, and
//! reports a race-free [`AllocState`] to a [`StatusUpdater`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   control plane ── update(alloc) ──► UpdateQueue (single slot, newest wins)
//!                                          │
//! ┌────────────────────────────────────────▼──────────────────────────┐
//! │  AllocRunner (control loop)                                       │
//! │  - LeaderCoordinator (Idle → LeaderDead | StoppingLeader → ...)   │
//! │  - Bus (broadcast events) ──► SubscriberSet ──► LogWriter, ...    │
//! │  - StatusPublisher (watch, coalescing) ──► StatusUpdater          │
//! │  - StateStore (allocation + task records)                         │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │TaskRunner│       │TaskRunner│       │TaskRunner│   one per task
//!   │ (leader) │       │          │       │          │   watch<TaskStateRecord>
//!   └────┬─────┘       └────┬─────┘       └────┬─────┘
//!        ▼                  ▼                  ▼
//!     Driver::start(task, kill_token) ─► future; abort after kill timeout
//! ```
//!
//! ### Lifecycle
//! ```text
//! new ─► [restore] ─► run ─► prerun hooks ─► tasks ─► all Dead ─► postrun hooks ─► exit
//!                              destroy ─► kill leader + followers ─► GC ─► destroyed()
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Run one allocation's task group                           | [`AllocRunner`], [`AllocRegistry`]          |
//! | **Policies**      | Restart attempts, interval, delay, backoff and jitter     | [`RestartPolicy`], [`BackoffPolicy`]        |
//! | **Backends**      | Execution, persistence and status reporting contracts     | [`Driver`], [`StateStore`], [`StatusUpdater`] |
//! | **Subscriber API**| Observe runtime events                                    | [`Subscribe`], [`LogWriter`]                |
//! | **Hooks**         | Node-local setup and teardown around the group            | [`PrerunHook`], [`PostrunHook`]             |
//! | **Errors**        | Typed errors                                              | [`RunnerError`], [`TaskError`]              |
//! | **Logging**       | `tracing-subscriber` bootstrap                            | [`logger_init`], [`LoggerConfig`]           |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use allocvisor::{AllocRunner, Allocation, ClientStatus, MockDriver, RecordingUpdater, TaskDef};
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let alloc = Allocation::new(
//!         "alloc-1",
//!         "web",
//!         vec![
//!             TaskDef::new("main").leader().with_config(json!({"run_for_ms": 10})),
//!             TaskDef::new("sidecar"),
//!         ],
//!     );
//!
//!     let updater = RecordingUpdater::new();
//!     let runner = AllocRunner::builder(alloc)
//!         .with_driver(Arc::new(MockDriver::new()))
//!         .with_updater(Arc::new(updater.clone()))
//!         .build()?;
//!
//!     // The leader exits after 10ms; the sidecar is killed because of it.
//!     let status = Arc::clone(&runner).run().await?;
//!     assert_eq!(status, ClientStatus::Complete);
//!     assert_eq!(updater.last().map(|s| s.client_status), Some(ClientStatus::Complete));
//!     Ok(())
//! }
//! ```
mod core;
mod drivers;
mod error;
mod events;
mod hooks;
mod logger;
mod model;
mod policies;
mod state;
mod status;
mod subscribers;

// ---- Public re-exports ----

pub use crate::core::{AllocRegistry, AllocRunner, AllocRunnerBuilder, AllocRunnerConfig, EnqueueOutcome, RunnerConfig};
pub use drivers::{BoxTaskFuture, Driver, DriverFn, DriverRef, MockDriver, MockTaskConfig};
pub use error::{HookError, RunnerError, StoreError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use hooks::{PostrunHook, PrerunHook, RunnerHook};
pub use logger::{LoggerConfig, LoggerError, LoggerFormat, logger_init};
pub use model::{
    AllocState, Allocation, ClientStatus, DesiredStatus, TaskDef, TaskEvent, TaskEventKind,
    TaskState, TaskStateRecord,
};
pub use policies::{BackoffPolicy, JitterPolicy, RestartDecision, RestartMode, RestartPolicy, RestartTracker};
pub use state::{FileStore, MemStore, StateStore, StoreRef};
pub use status::{NoopUpdater, RecordingUpdater, StatusPublisher, StatusUpdater, UpdaterRef};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
