//! Runtime core: orchestration and lifecycle.
//!
//! The public entry point is [`AllocRunner`], which supervises one allocation's
//! task group. [`AllocRegistry`] keeps one runner per allocation id.
//!
//! Internal modules:
//! - [`task_runner`]: drives one task through start, restart and kill;
//! - [`leader`]: leader/follower termination ordering (pure state machine);
//! - [`update_queue`]: single-slot coalescing mailbox for allocation updates;
//! - [`clock`]: strictly increasing timestamps for task records;
//! - [`alloc_runner`]: the control loop tying everything together.

mod alloc_runner;
mod builder;
mod clock;
mod config;
mod leader;
mod registry;
mod task_runner;
mod update_queue;

pub use alloc_runner::{AllocRunner, AllocRunnerConfig};
pub use builder::AllocRunnerBuilder;
pub use config::RunnerConfig;
pub use registry::AllocRegistry;
pub use update_queue::EnqueueOutcome;
