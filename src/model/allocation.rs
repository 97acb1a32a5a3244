//! # Allocation: the placed task group this crate executes.
//!
//! An [`Allocation`] is an immutable value snapshot. The runner shares it as
//! `Arc<Allocation>` and replaces it wholesale on every accepted update.
//!
//! ## Rules
//! - `modify_index` strictly increases with every authoritative update.
//! - At most one task is marked `leader`.
//! - Task names are unique within the group.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policies::RestartPolicy;

/// Desired status set by the control plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DesiredStatus {
    /// Tasks should run.
    #[default]
    Run,
    /// Tasks should be stopped.
    Stop,
    /// Tasks should be stopped because the allocation is being migrated away.
    Evict,
}

impl DesiredStatus {
    /// True for `Stop` and `Evict`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, DesiredStatus::Stop | DesiredStatus::Evict)
    }
}

/// One task definition within the group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
    /// Unique name within the group.
    pub name: String,
    /// Leader tasks drive the termination of their siblings.
    #[serde(default)]
    pub leader: bool,
    /// Time between the kill signal and force termination (`None` = runner default).
    #[serde(default)]
    pub kill_timeout: Option<Duration>,
    /// Driver-specific configuration.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl TaskDef {
    /// Creates a follower task with empty driver config.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            leader: false,
            kill_timeout: None,
            config: serde_json::Value::Null,
        }
    }

    /// Marks the task as the group leader.
    pub fn leader(mut self) -> Self {
        self.leader = true;
        self
    }

    /// Sets the kill timeout.
    pub fn with_kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = Some(timeout);
        self
    }

    /// Sets the driver config.
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

/// A placed instance of a job's task group on this node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Allocation identifier.
    pub id: String,
    /// Owning job.
    pub job_id: String,
    /// Task group name.
    pub task_group: String,
    /// Desired status.
    pub desired_status: DesiredStatus,
    /// Strictly increasing version of this allocation.
    pub modify_index: u64,
    /// Tasks in the group.
    pub tasks: Vec<TaskDef>,
    /// Group restart policy.
    pub restart_policy: RestartPolicy,
}

impl Allocation {
    /// Creates a runnable allocation at modify index 1.
    pub fn new(id: impl Into<String>, job_id: impl Into<String>, tasks: Vec<TaskDef>) -> Self {
        Self {
            id: id.into(),
            job_id: job_id.into(),
            task_group: "group".to_string(),
            desired_status: DesiredStatus::Run,
            modify_index: 1,
            tasks,
            restart_policy: RestartPolicy::default(),
        }
    }

    /// Sets the restart policy.
    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Returns a copy with a higher modify index and the given desired status.
    pub fn next_version(&self, desired: DesiredStatus) -> Self {
        let mut next = self.clone();
        next.modify_index = self.modify_index + 1;
        next.desired_status = desired;
        next
    }

    /// Name of the leader task, if any.
    pub fn leader(&self) -> Option<&str> {
        self.tasks
            .iter()
            .find(|t| t.leader)
            .map(|t| t.name.as_str())
    }

    /// Looks up a task by name.
    pub fn task(&self, name: &str) -> Option<&TaskDef> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Checks the structural invariants of the group.
    pub fn validate(&self) -> Result<(), String> {
        if self.tasks.is_empty() {
            return Err("task group has no tasks".to_string());
        }
        let leaders = self.tasks.iter().filter(|t| t.leader).count();
        if leaders > 1 {
            return Err(format!("task group has {leaders} leaders; at most one allowed"));
        }
        let mut names: Vec<&str> = self.tasks.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(format!("duplicate task name {:?}", w[0]));
        }
        if names.iter().any(|n| n.is_empty()) {
            return Err("task with empty name".to_string());
        }
        Ok(())
    }
}
