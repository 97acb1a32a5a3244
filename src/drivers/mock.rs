//! # MockDriver: config-driven fake backend.
//!
//! Behavior is read from the task's `config` as a [`MockTaskConfig`]:
//!
//! ```text
//! { "run_for_ms": 50, "exit_code": 1 }      exits with code 1 after 50ms
//! { }                                       runs until killed
//! { "start_error": "no image" }             refuses to start
//! { "ignore_kill_ms": 10000 }               ignores the kill signal for 10s
//! ```
//!
//! Every driver clone shares the same start/kill counters.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::drivers::driver::{BoxTaskFuture, Driver};
use crate::error::TaskError;
use crate::model::TaskDef;

/// Per-task behavior of the [`MockDriver`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockTaskConfig {
    /// Exit after this many milliseconds (`None` = run until killed).
    pub run_for_ms: Option<u64>,
    /// Exit code reported when `run_for_ms` elapses.
    pub exit_code: i32,
    /// Refuse to start with this message.
    pub start_error: Option<String>,
    /// Keep running this long after the kill signal.
    pub ignore_kill_ms: Option<u64>,
}

impl MockTaskConfig {
    /// Parses the config out of a task definition; `null` means defaults.
    pub fn from_task(task: &TaskDef) -> Result<Self, TaskError> {
        if task.config.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(task.config.clone()).map_err(|e| TaskError::Fatal {
            error: format!("invalid mock config: {e}"),
        })
    }

    /// Serializes into a task config value.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Default, Debug, Clone, Copy)]
struct Counters {
    starts: usize,
    kills: usize,
}

/// Fake driver that records what the runner asked of it.
#[derive(Clone, Default)]
pub struct MockDriver {
    counters: Arc<Mutex<HashMap<String, Counters>>>,
}

impl MockDriver {
    /// Creates a driver with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `start` calls for `task`, including refused ones.
    pub fn starts(&self, task: &str) -> usize {
        self.counters.lock().get(task).map_or(0, |c| c.starts)
    }

    /// Number of kill signals `task` observed while running.
    pub fn kills(&self, task: &str) -> usize {
        self.counters.lock().get(task).map_or(0, |c| c.kills)
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(&self, task: &TaskDef, kill: CancellationToken) -> Result<BoxTaskFuture, TaskError> {
        self.counters.lock().entry(task.name.clone()).or_default().starts += 1;

        let cfg = MockTaskConfig::from_task(task)?;
        if let Some(error) = cfg.start_error {
            return Err(TaskError::Fail { error });
        }

        let counters = Arc::clone(&self.counters);
        let name = task.name.clone();
        Ok(Box::pin(async move {
            let run = async {
                match cfg.run_for_ms {
                    Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = run => match cfg.exit_code {
                    0 => Ok(()),
                    code => Err(TaskError::Exit { code }),
                },
                _ = kill.cancelled() => {
                    counters.lock().entry(name).or_default().kills += 1;
                    if let Some(ms) = cfg.ignore_kill_ms {
                        tokio::time::sleep(Duration::from_millis(ms)).await;
                    }
                    Err(TaskError::Canceled)
                }
            }
        }))
    }
}
