//! # Task runner: drives one task of the group through its lifecycle.
//!
//! The runner owns the task's [`TaskStateRecord`] and is the only writer of it.
//! Everybody else reads copies through a `watch` channel.
//!
//! ## Architecture
//! ```text
//! run(driver):
//!   loop {
//!     ├─► kill requested? ─► Dead (Killed)
//!     ├─► driver.start(task, kill_token.child()) ── Err ─► DriverFailure ─┐
//!     ├─► Running (Started)                                              │
//!     ├─► select! { exit, kill_token }                                   │
//!     │     kill: wait kill_timeout, else abort ─► Dead (Killed)         │
//!     │     exit 0 ─► Dead (Terminated)                                  │
//!     └─► failure ◄──────────────────────────────────────────────────────┘
//!           ├─ stopping / fatal ─► Dead, failed (NotRestarting)
//!           └─ RestartTracker
//!                ├─ Restart(d) ─► Pending (Restarting), sleep(d) or kill
//!                └─ GiveUp     ─► Dead, failed (NotRestarting)
//!   }
//! ```
//!
//! ## Rules
//! - Every state change and event is persisted (best-effort) and reported to
//!   the control loop as a [`TaskNotice`].
//! - A second kill is a no-op; kills of Dead tasks are ignored.
//! - No restart is scheduled once a kill is in flight or the group is stopping.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::core::clock::MonotonicClock;
use crate::drivers::{BoxTaskFuture, DriverRef};
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::model::{TaskDef, TaskEvent, TaskEventKind, TaskState, TaskStateRecord};
use crate::policies::{RestartDecision, RestartPolicy, RestartTracker};
use crate::state::StoreRef;

/// Sent to the control loop after every change of a task record.
#[derive(Clone, Debug)]
pub(crate) struct TaskNotice {
    pub(crate) task: Arc<str>,
    pub(crate) state: TaskState,
}

/// Everything a task runner needs from its allocation runner.
pub(crate) struct TaskRunnerParams {
    pub(crate) alloc_id: Arc<str>,
    pub(crate) restart: RestartPolicy,
    pub(crate) kill_timeout: Duration,
    pub(crate) group_stopping: Arc<AtomicBool>,
    pub(crate) store: StoreRef,
    pub(crate) bus: Bus,
    pub(crate) clock: Arc<MonotonicClock>,
    pub(crate) notices: mpsc::UnboundedSender<TaskNotice>,
}

/// How one execution ended.
enum Exit {
    Finished(Result<(), TaskError>),
    Killed,
}

pub(crate) struct TaskRunner {
    name: Arc<str>,
    task: TaskDef,
    params: TaskRunnerParams,
    state: watch::Sender<TaskStateRecord>,
    kill_token: CancellationToken,
    killing: AtomicBool,
    persist_lock: tokio::sync::Mutex<()>,
}

impl TaskRunner {
    pub(crate) fn new(task: TaskDef, params: TaskRunnerParams) -> Arc<Self> {
        let mut record = TaskStateRecord::pending();
        record.append(TaskEvent::new(TaskEventKind::Received), params.clock.now());
        let (state, _rx) = watch::channel(record);
        Arc::new(Self {
            name: Arc::from(task.name.as_str()),
            task,
            params,
            state,
            kill_token: CancellationToken::new(),
            killing: AtomicBool::new(false),
            persist_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_leader(&self) -> bool {
        self.task.leader
    }

    /// Copy of the current record.
    pub(crate) fn state(&self) -> TaskStateRecord {
        self.state.borrow().clone()
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.state.borrow().is_dead()
    }

    /// Replaces the record with a persisted one. Only valid before `run`.
    pub(crate) fn restore_state(&self, record: TaskStateRecord) {
        for t in record
            .events
            .iter()
            .map(|e| e.at)
            .chain(record.started_at)
            .chain(record.finished_at)
        {
            self.params.clock.observe(t);
        }
        self.state.send_replace(record);
    }

    /// Transitions to `state`, appending `event` first if given.
    ///
    /// Returns `false` when the transition was refused (record already Dead).
    pub(crate) async fn update_state(&self, state: TaskState, event: Option<TaskEvent>) -> bool {
        let mut applied = false;
        self.apply(|rec, clock| {
            if let Some(ev) = event {
                rec.append(ev, clock.now());
            }
            applied = rec.transition(state, clock.now());
        })
        .await;
        applied
    }

    /// Appends an event without changing state.
    pub(crate) async fn emit_event(&self, event: TaskEvent) {
        self.apply(|rec, clock| rec.append(event, clock.now())).await;
    }

    /// Delivers the kill signal. Returns `false` if a kill is already in flight
    /// or the task is Dead.
    pub(crate) async fn kill(&self, reason: &str) -> bool {
        if self.is_dead() || self.killing.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::debug!(alloc = %self.params.alloc_id, task = %self.name, reason, "killing task");
        self.emit_event(TaskEvent::new(TaskEventKind::Killing).with_message(reason))
            .await;
        self.publish(
            Event::new(EventKind::TaskKilling)
                .with_timeout(self.params.kill_timeout)
                .with_reason(reason),
        );
        self.kill_token.cancel();
        true
    }

    /// Resolves once the record is Dead.
    #[cfg(test)]
    pub(crate) async fn wait_dead(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(TaskStateRecord::is_dead).await;
    }

    /// Marks a never-started task Dead and failed (pre-run hook failure).
    pub(crate) async fn fail_before_start(&self, event: TaskEvent) {
        self.fail(event).await;
    }

    /// Marks a never-started task Dead as killed (destroy during pre-run hooks).
    pub(crate) async fn kill_before_start(&self, reason: &str) {
        if self.kill(reason).await {
            self.finish_killed().await;
        }
    }

    /// Runs the task until it is Dead.
    pub(crate) async fn run(self: Arc<Self>, driver: DriverRef) {
        if self.is_dead() {
            tracing::debug!(alloc = %self.params.alloc_id, task = %self.name, "task already dead; not starting");
            return;
        }

        let mut tracker = RestartTracker::new(self.params.restart);
        let mut attempt: u32 = 0;

        loop {
            if self.kill_token.is_cancelled() {
                self.finish_killed().await;
                return;
            }

            attempt += 1;
            self.publish(Event::new(EventKind::TaskStarting).with_attempt(attempt));

            let exit = match driver.start(&self.task, self.kill_token.child_token()).await {
                Ok(fut) => {
                    self.update_state(TaskState::Running, Some(TaskEvent::new(TaskEventKind::Started)))
                        .await;
                    self.supervise(fut).await
                }
                Err(e) => {
                    tracing::warn!(alloc = %self.params.alloc_id, task = %self.name, driver = driver.name(), error = %e, "driver failed to start task");
                    self.emit_event(
                        TaskEvent::new(TaskEventKind::DriverFailure).with_message(e.to_string()),
                    )
                    .await;
                    self.publish(Event::new(EventKind::DriverFailure).with_reason(e.to_string()));
                    Exit::Finished(Err(e))
                }
            };

            let err = match exit {
                Exit::Killed => {
                    self.finish_killed().await;
                    return;
                }
                Exit::Finished(_) if self.kill_token.is_cancelled() => {
                    self.finish_killed().await;
                    return;
                }
                Exit::Finished(Ok(())) | Exit::Finished(Err(TaskError::Canceled)) => {
                    self.publish(Event::new(EventKind::TaskExited).with_reason("success"));
                    self.update_state(
                        TaskState::Dead,
                        Some(TaskEvent::new(TaskEventKind::Terminated).with_exit_code(0)),
                    )
                    .await;
                    self.publish(Event::new(EventKind::TaskDead).with_reason("complete"));
                    return;
                }
                Exit::Finished(Err(e)) => e,
            };

            self.publish(Event::new(EventKind::TaskExited).with_reason(err.as_label()));
            self.emit_event(
                TaskEvent::new(TaskEventKind::Terminated)
                    .with_exit_code(err.exit_code())
                    .with_message(err.to_string()),
            )
            .await;

            if self.params.group_stopping.load(Ordering::Acquire) || !err.is_retryable() {
                self.fail(
                    TaskEvent::new(TaskEventKind::NotRestarting).with_message(err.to_string()),
                )
                .await;
                return;
            }

            match tracker.record_failure(Instant::now()) {
                RestartDecision::Restart(delay) => {
                    tracing::info!(alloc = %self.params.alloc_id, task = %self.name, ?delay, attempt, "restarting task");
                    self.apply(|rec, clock| {
                        rec.append(
                            TaskEvent::new(TaskEventKind::Restarting).with_restart_delay(delay),
                            clock.now(),
                        );
                        rec.restarts += 1;
                        rec.transition(TaskState::Pending, clock.now());
                    })
                    .await;
                    self.publish(
                        Event::new(EventKind::TaskRestarting)
                            .with_delay(delay)
                            .with_attempt(attempt),
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.kill_token.cancelled() => {}
                    }
                }
                RestartDecision::GiveUp => {
                    tracing::info!(alloc = %self.params.alloc_id, task = %self.name, failures = tracker.failures_in_window(), "restart policy exhausted");
                    self.fail(
                        TaskEvent::new(TaskEventKind::NotRestarting)
                            .with_message("exceeded allowed attempts"),
                    )
                    .await;
                    return;
                }
            }
        }
    }

    /// Races the task against the kill signal, escalating after the kill timeout.
    async fn supervise(&self, fut: BoxTaskFuture) -> Exit {
        let mut handle = tokio::spawn(fut);
        tokio::select! {
            res = &mut handle => Exit::Finished(res.unwrap_or_else(|e| Err(TaskError::Fail {
                error: format!("task panicked: {e}"),
            }))),
            _ = self.kill_token.cancelled() => {
                if tokio::time::timeout(self.params.kill_timeout, &mut handle).await.is_err() {
                    handle.abort();
                    tracing::warn!(alloc = %self.params.alloc_id, task = %self.name, timeout = ?self.params.kill_timeout, "task ignored kill signal; force-terminated");
                    self.publish(Event::new(EventKind::TaskForceKilled).with_timeout(self.params.kill_timeout));
                }
                Exit::Killed
            }
        }
    }

    async fn finish_killed(&self) {
        self.update_state(TaskState::Dead, Some(TaskEvent::new(TaskEventKind::Killed)))
            .await;
        self.publish(Event::new(EventKind::TaskDead).with_reason("killed"));
    }

    async fn fail(&self, event: TaskEvent) {
        self.apply(|rec, clock| {
            rec.append(event, clock.now());
            if !rec.is_dead() {
                rec.failed = true;
                rec.transition(TaskState::Dead, clock.now());
            }
        })
        .await;
        self.publish(Event::new(EventKind::TaskDead).with_reason("failed"));
    }

    /// Mutates the record, then persists and notifies the control loop.
    async fn apply(&self, f: impl FnOnce(&mut TaskStateRecord, &MonotonicClock) + Send) {
        let clock = &self.params.clock;
        self.state.send_modify(|rec| f(rec, clock));
        self.persist().await;
        let state = self.state.borrow().state;
        let _ = self.params.notices.send(TaskNotice {
            task: Arc::clone(&self.name),
            state,
        });
    }

    async fn persist(&self) {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.state();
        if let Err(e) = self
            .params
            .store
            .put_task_state(&self.params.alloc_id, &self.name, &snapshot)
            .await
        {
            tracing::warn!(alloc = %self.params.alloc_id, task = %self.name, error = %e, "failed to persist task state");
            self.publish(Event::new(EventKind::PersistFailed).with_reason(e.to_string()));
        }
    }

    fn publish(&self, ev: Event) {
        self.params.bus.publish(
            ev.with_alloc(Arc::clone(&self.params.alloc_id))
                .with_task(Arc::clone(&self.name)),
        );
    }
}
