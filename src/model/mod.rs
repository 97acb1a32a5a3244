//! # Data model shared by the runner and its collaborators.
//!
//! - [`Allocation`], [`TaskDef`], [`DesiredStatus`] what the control plane asks for
//! - [`TaskStateRecord`], [`TaskEvent`], [`TaskState`] what each task runner reports
//! - [`AllocState`], [`ClientStatus`] what the allocation runner publishes
//!
//! Every type is serde-serializable so a [`StateStore`](crate::StateStore) can
//! persist it verbatim.

mod alloc_state;
mod allocation;
mod task_state;

pub use alloc_state::{AllocState, ClientStatus};
pub use allocation::{Allocation, DesiredStatus, TaskDef};
pub use task_state::{TaskEvent, TaskEventKind, TaskState, TaskStateRecord};
