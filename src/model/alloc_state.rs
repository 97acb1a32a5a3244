//! # Aggregated allocation status.
//!
//! [`AllocState`] is derived, never stored: it is recomputed from the current
//! task records every time it is requested or published.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{TaskState, TaskStateRecord};

/// Client-side status of the whole allocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientStatus {
    /// No task running yet.
    #[default]
    Pending,
    /// At least one task running, none failed.
    Running,
    /// Every task dead, none failed.
    Complete,
    /// At least one task dead because of a failure.
    Failed,
}

impl ClientStatus {
    /// True for `Complete` and `Failed`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClientStatus::Complete | ClientStatus::Failed)
    }

    /// Lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Pending => "pending",
            ClientStatus::Running => "running",
            ClientStatus::Complete => "complete",
            ClientStatus::Failed => "failed",
        }
    }
}

/// Snapshot of every task's state plus the aggregate status.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocState {
    /// Aggregate status.
    pub client_status: ClientStatus,
    /// One record per task in the group.
    pub task_states: BTreeMap<String, TaskStateRecord>,
}

impl AllocState {
    /// Builds a snapshot and derives the client status from the records.
    pub fn from_records(task_states: BTreeMap<String, TaskStateRecord>) -> Self {
        let client_status = derive_client_status(task_states.values());
        Self {
            client_status,
            task_states,
        }
    }

    /// True once every task is Dead.
    pub fn all_dead(&self) -> bool {
        self.task_states.values().all(TaskStateRecord::is_dead)
    }

    /// Record for `task`.
    pub fn task(&self, task: &str) -> Option<&TaskStateRecord> {
        self.task_states.get(task)
    }
}

/// Failed beats Running beats Pending beats Complete.
fn derive_client_status<'a>(records: impl Iterator<Item = &'a TaskStateRecord>) -> ClientStatus {
    let (mut failed, mut running, mut pending) = (false, false, false);
    for r in records {
        match r.state {
            TaskState::Pending => pending = true,
            TaskState::Running => running = true,
            TaskState::Dead => failed |= r.failed,
        }
    }
    if failed {
        ClientStatus::Failed
    } else if running {
        ClientStatus::Running
    } else if pending {
        ClientStatus::Pending
    } else {
        ClientStatus::Complete
    }
}
