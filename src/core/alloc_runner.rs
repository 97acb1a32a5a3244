//! # AllocRunner: supervises one allocation's task group on this node.
//!
//! The [`AllocRunner`] owns one task runner per task, the event bus, the update
//! queue and the leader coordinator. Its control loop is the only place where
//! group-level decisions are made.
//!
//! ## High-level architecture
//! ```text
//! new(cfg) ─► validate ─► TaskRunner per task (Pending + Received)
//!
//! run():
//!   ├─► fan-out listener: Bus ─► SubscriberSet
//!   ├─► StatusPublisher (watch, coalescing) ─► StatusUpdater
//!   ├─► prerun hooks ── Err ─► every task Dead + failed (HookFailed)
//!   │                └─ destroyed meanwhile ─► every task Dead (Killed), nothing started
//!   ├─► restored dead leader? ─► kill followers (LeaderDead)
//!   ├─► JoinSet: TaskRunner::run(driver) per task
//!   └─► loop select! {
//!         destroy token   ─► coordinator.on_destroy   ─► kill leader, then all
//!         TaskNotice      ─► coordinator.on_task_dead ─► kill followers
//!         UpdateQueue     ─► apply newer alloc ─► Stop/Evict ─► coordinator.on_group_stop
//!       } until every task is Dead
//!   ├─► postrun hooks
//!   ├─► final AllocState ─► StatusUpdater
//!   └─► destroy requested? ─► GC: delete state, fire destroyed()
//! ```
//!
//! ## Rules
//! - `update` never blocks; once the runner is torn down updates are dropped.
//! - `alloc_state` is a copy and is complete from construction on.
//! - `destroy` is idempotent and safe to call concurrently with `run`.
//! - `restore` must be called before `run`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::core::builder::AllocRunnerBuilder;
use crate::core::clock::MonotonicClock;
use crate::core::config::RunnerConfig;
use crate::core::leader::{GroupAction, KillCause, LeaderCoordinator};
use crate::core::task_runner::{TaskNotice, TaskRunner, TaskRunnerParams};
use crate::core::update_queue::{EnqueueOutcome, UpdateQueue};
use crate::drivers::DriverRef;
use crate::error::RunnerError;
use crate::events::{Bus, Event, EventKind};
use crate::hooks::{self, RunnerHook};
use crate::model::{AllocState, Allocation, ClientStatus, TaskEvent, TaskEventKind, TaskState, TaskStateRecord};
use crate::state::StoreRef;
use crate::status::{StatusPublisher, UpdaterRef};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Everything needed to construct an [`AllocRunner`].
///
/// Prefer [`AllocRunner::builder`] which fills in in-memory defaults.
pub struct AllocRunnerConfig {
    /// Allocation to run.
    pub alloc: Allocation,
    /// Execution backend.
    pub driver: DriverRef,
    /// Persistence for allocation and task state.
    pub store: StoreRef,
    /// Receiver of status snapshots.
    pub updater: UpdaterRef,
    /// Event subscribers.
    pub subscribers: Vec<Arc<dyn Subscribe>>,
    /// Pre-run and post-run hooks, in execution order.
    pub hooks: Vec<RunnerHook>,
    /// Node-local settings.
    pub config: RunnerConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunPhase {
    Idle,
    Running,
    Exited,
}

#[derive(Debug)]
struct Lifecycle {
    phase: RunPhase,
    destroy_requested: bool,
}

/// Bus ─► SubscriberSet listener, stopped once the runner is done with it.
struct Fanout {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl Fanout {
    async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "subscriber fan-out failed");
        }
    }
}

/// Supervisor of one allocation.
pub struct AllocRunner {
    id: Arc<str>,
    alloc: RwLock<Arc<Allocation>>,
    tasks: Vec<Arc<TaskRunner>>,
    driver: DriverRef,
    store: StoreRef,
    updater: UpdaterRef,
    subscribers: Mutex<Vec<Arc<dyn Subscribe>>>,
    hooks: Vec<RunnerHook>,
    bus: Bus,
    coordinator: Mutex<LeaderCoordinator>,
    updates: UpdateQueue,
    group_stopping: Arc<AtomicBool>,
    notices: Mutex<Option<mpsc::UnboundedReceiver<TaskNotice>>>,
    lifecycle: Mutex<Lifecycle>,
    destroy_token: CancellationToken,
    exited: CancellationToken,
    destroyed: CancellationToken,
}

impl AllocRunner {
    /// Starts a builder with in-memory defaults for `alloc`.
    pub fn builder(alloc: Allocation) -> AllocRunnerBuilder {
        AllocRunnerBuilder::new(alloc)
    }

    /// Validates the allocation and creates one task runner per task.
    ///
    /// Does not spawn anything; may be called outside a runtime.
    pub fn new(cfg: AllocRunnerConfig) -> Result<Arc<Self>, RunnerError> {
        cfg.alloc
            .validate()
            .map_err(|reason| RunnerError::InvalidAllocation {
                alloc_id: cfg.alloc.id.clone(),
                reason,
            })?;

        let id: Arc<str> = Arc::from(cfg.alloc.id.as_str());
        let bus = Bus::new(cfg.config.bus_capacity_clamped());
        let clock = Arc::new(MonotonicClock::new());
        let group_stopping = Arc::new(AtomicBool::new(false));
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let tasks = cfg
            .alloc
            .tasks
            .iter()
            .map(|task| {
                TaskRunner::new(
                    task.clone(),
                    TaskRunnerParams {
                        alloc_id: Arc::clone(&id),
                        restart: cfg.alloc.restart_policy,
                        kill_timeout: cfg.config.kill_timeout_for(task),
                        group_stopping: Arc::clone(&group_stopping),
                        store: Arc::clone(&cfg.store),
                        bus: bus.clone(),
                        clock: Arc::clone(&clock),
                        notices: notice_tx.clone(),
                    },
                )
            })
            .collect();

        let coordinator = LeaderCoordinator::new(cfg.alloc.leader());
        tracing::debug!(alloc = %id, tasks = cfg.alloc.tasks.len(), leader = ?cfg.alloc.leader(), "allocation runner created");

        Ok(Arc::new(Self {
            id,
            alloc: RwLock::new(Arc::new(cfg.alloc)),
            tasks,
            driver: cfg.driver,
            store: cfg.store,
            updater: cfg.updater,
            subscribers: Mutex::new(cfg.subscribers),
            hooks: cfg.hooks,
            bus,
            coordinator: Mutex::new(coordinator),
            updates: UpdateQueue::new(),
            group_stopping,
            notices: Mutex::new(Some(notice_rx)),
            lifecycle: Mutex::new(Lifecycle {
                phase: RunPhase::Idle,
                destroy_requested: false,
            }),
            destroy_token: CancellationToken::new(),
            exited: CancellationToken::new(),
            destroyed: CancellationToken::new(),
        }))
    }

    /// Allocation id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Currently applied allocation.
    pub fn alloc(&self) -> Arc<Allocation> {
        Arc::clone(&self.alloc.read())
    }

    /// Snapshot of every task record plus the derived client status.
    pub fn alloc_state(&self) -> AllocState {
        AllocState::from_records(
            self.tasks
                .iter()
                .map(|t| (t.name().to_string(), t.state()))
                .collect(),
        )
    }

    /// Snapshot of one task's record.
    pub fn task_state(&self, task: &str) -> Option<TaskStateRecord> {
        self.tasks.iter().find(|t| t.name() == task).map(|t| t.state())
    }

    /// Subscribes to runtime events published after this call.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Offers a new version of the allocation. Never blocks.
    pub fn update(&self, alloc: Allocation) -> EnqueueOutcome {
        let index = alloc.modify_index;
        let outcome = if alloc.id != *self.id {
            tracing::warn!(alloc = %self.id, other = %alloc.id, "dropping update for a different allocation");
            EnqueueOutcome::Foreign
        } else {
            self.updates.enqueue(Arc::new(alloc))
        };

        let ev = match outcome {
            EnqueueOutcome::Enqueued => Event::new(EventKind::UpdateQueued),
            EnqueueOutcome::Replaced => Event::new(EventKind::UpdateReplaced),
            EnqueueOutcome::Stale => Event::new(EventKind::UpdateDropped).with_reason("stale"),
            EnqueueOutcome::Closed => Event::new(EventKind::UpdateDropped).with_reason("closed"),
            EnqueueOutcome::Foreign => Event::new(EventKind::UpdateDropped).with_reason("foreign"),
        };
        tracing::debug!(alloc = %self.id, modify_index = index, ?outcome, "update offered");
        self.publish(ev.with_modify_index(index));
        outcome
    }

    /// Loads persisted allocation and task state. Must precede `run`.
    #[tracing::instrument(name = "restore", skip(self), fields(alloc = %self.id))]
    pub async fn restore(&self) -> Result<(), RunnerError> {
        if self.lifecycle.lock().phase != RunPhase::Idle {
            return Err(RunnerError::Restore {
                alloc_id: self.id.to_string(),
                reason: "runner already started".into(),
            });
        }
        let restore_err = |e: crate::error::StoreError| RunnerError::Restore {
            alloc_id: self.id.to_string(),
            reason: e.to_string(),
        };

        if let Some(persisted) = self.store.get_alloc(&self.id).await.map_err(restore_err)? {
            let current = self.alloc();
            if persisted.modify_index > current.modify_index {
                match persisted.validate() {
                    Ok(()) => *self.alloc.write() = Arc::new(persisted),
                    Err(reason) => {
                        tracing::warn!(%reason, "ignoring invalid persisted allocation");
                    }
                }
            }
        }

        let records = self
            .store
            .get_task_states(&self.id)
            .await
            .map_err(restore_err)?;
        for task in &self.tasks {
            if let Some(record) = records.get(task.name()) {
                task.restore_state(record.clone());
            }
        }

        let leader_dead = self.leader().is_some_and(|l| l.is_dead());
        self.coordinator.lock().on_restore(leader_dead);
        tracing::info!(restored = records.len(), leader_dead, "restored allocation state");
        Ok(())
    }

    /// Runs the task group until every task is Dead.
    ///
    /// Returns the final client status. A second call fails with
    /// [`RunnerError::AlreadyRunning`].
    #[tracing::instrument(name = "alloc_runner", skip(self), fields(alloc = %self.id))]
    pub async fn run(self: Arc<Self>) -> Result<ClientStatus, RunnerError> {
        {
            let mut lc = self.lifecycle.lock();
            if lc.phase != RunPhase::Idle {
                return Err(RunnerError::AlreadyRunning {
                    alloc_id: self.id.to_string(),
                });
            }
            lc.phase = RunPhase::Running;
        }
        let Some(mut notices) = self.notices.lock().take() else {
            return Err(RunnerError::AlreadyRunning {
                alloc_id: self.id.to_string(),
            });
        };

        let fanout = self.spawn_fanout();
        let publisher = StatusPublisher::spawn(Arc::clone(&self.updater), AllocState::default());
        publisher.publish(self.alloc_state());
        self.publish(Event::new(EventKind::RunnerStarted));
        tracing::info!(tasks = self.tasks.len(), "allocation runner started");

        let alloc = self.alloc();
        self.persist_alloc(&alloc).await;

        let mut runners = JoinSet::new();
        let prerun = tokio::select! {
            res = hooks::run_prerun(&self.hooks, &alloc) => res,
            _ = self.destroy_token.cancelled() => Ok(()),
        };
        match prerun {
            Ok(()) if self.destroy_token.is_cancelled() => {
                tracing::info!("destroyed during prerun hooks; not starting tasks");
                for task in &self.tasks {
                    task.kill_before_start(KillCause::Destroy.as_reason()).await;
                }
            }
            Ok(()) => {
                let on_start = self.coordinator.lock().on_start();
                if let Some(action) = on_start {
                    self.execute(action).await;
                }
                if alloc.desired_status.is_terminal() {
                    self.stop_group(KillCause::GroupStop).await;
                }
                for task in &self.tasks {
                    runners.spawn(Arc::clone(task).run(Arc::clone(&self.driver)));
                }
            }
            Err(e) => {
                tracing::warn!(hook = e.hook, reason = %e.reason, "prerun hook failed; not starting tasks");
                self.publish(
                    Event::new(EventKind::HookFailed)
                        .with_task(e.hook)
                        .with_reason(e.reason.clone()),
                );
                for task in &self.tasks {
                    task.fail_before_start(
                        TaskEvent::new(TaskEventKind::HookFailed).with_message(e.to_string()),
                    )
                    .await;
                }
            }
        }

        let mut destroy_seen = false;
        loop {
            publisher.publish(self.alloc_state());
            if self.all_dead() {
                break;
            }
            tokio::select! {
                _ = self.destroy_token.cancelled(), if !destroy_seen => {
                    destroy_seen = true;
                    self.stop_group(KillCause::Destroy).await;
                }
                Some(notice) = notices.recv() => self.on_notice(notice).await,
                _ = self.updates.notified() => self.apply_update().await,
                else => break,
            }
        }
        self.coordinator.lock().on_all_dead();

        while let Some(res) = runners.join_next().await {
            if let Err(e) = res {
                tracing::error!(error = %e, "task runner panicked");
            }
        }

        let state = self.alloc_state();
        for e in hooks::run_postrun(&self.hooks, &self.alloc(), &state).await {
            self.publish(
                Event::new(EventKind::HookFailed)
                    .with_task(e.hook)
                    .with_reason(e.reason),
            );
        }
        publisher.publish(state.clone());
        publisher.close().await;
        self.updates.close();

        let status = state.client_status;
        self.publish(Event::new(EventKind::RunnerExited).with_reason(status.as_str()));
        tracing::info!(status = status.as_str(), "allocation runner exited");

        let gc_now = {
            let mut lc = self.lifecycle.lock();
            lc.phase = RunPhase::Exited;
            lc.destroy_requested
        };
        self.exited.cancel();
        if gc_now {
            self.gc().await;
        }
        fanout.stop().await;
        Ok(status)
    }

    /// Tears the runner down: kills every task, drops further updates, deletes
    /// persisted state and fires [`destroyed`](Self::destroyed).
    ///
    /// Returns once teardown is initiated; await `destroyed()` for completion.
    #[tracing::instrument(name = "destroy", skip(self), fields(alloc = %self.id))]
    pub async fn destroy(&self) {
        let (gc_now, never_ran) = {
            let mut lc = self.lifecycle.lock();
            if lc.destroy_requested {
                return;
            }
            lc.destroy_requested = true;
            match lc.phase {
                RunPhase::Idle => {
                    lc.phase = RunPhase::Exited;
                    (true, true)
                }
                RunPhase::Running => (false, false),
                RunPhase::Exited => (true, false),
            }
        };

        tracing::info!("destroy requested");
        self.updates.close();
        self.group_stopping.store(true, Ordering::Release);
        self.publish(Event::new(EventKind::DestroyRequested));
        self.destroy_token.cancel();

        if never_ran {
            self.exited.cancel();
        }
        if gc_now {
            self.gc().await;
        }
    }

    /// Resolves once teardown has finished.
    pub fn destroyed(&self) -> WaitForCancellationFuture<'_> {
        self.destroyed.cancelled()
    }

    /// True once teardown has finished.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.is_cancelled()
    }

    /// Resolves once the control loop has exited.
    pub fn wait(&self) -> WaitForCancellationFuture<'_> {
        self.exited.cancelled()
    }

    // ---------------------------
    // Control loop helpers
    // ---------------------------

    fn leader(&self) -> Option<&Arc<TaskRunner>> {
        self.tasks.iter().find(|t| t.is_leader())
    }

    fn all_dead(&self) -> bool {
        self.tasks.iter().all(|t| t.is_dead())
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(ev.with_alloc(Arc::clone(&self.id)));
    }

    async fn on_notice(&self, notice: TaskNotice) {
        if notice.state != TaskState::Dead {
            return;
        }
        let action = self.coordinator.lock().on_task_dead(&notice.task);
        if let Some(action) = action {
            self.execute(action).await;
        }
    }

    async fn apply_update(&self) {
        let Some(next) = self.updates.drain() else {
            return;
        };
        let current = self.alloc();
        if next.modify_index <= current.modify_index {
            tracing::debug!(
                applied = current.modify_index,
                offered = next.modify_index,
                "dropping stale update"
            );
            self.publish(
                Event::new(EventKind::UpdateDropped)
                    .with_reason("stale")
                    .with_modify_index(next.modify_index),
            );
            return;
        }

        *self.alloc.write() = Arc::clone(&next);
        self.persist_alloc(&next).await;
        self.publish(Event::new(EventKind::UpdateApplied).with_modify_index(next.modify_index));
        tracing::info!(modify_index = next.modify_index, desired = ?next.desired_status, "applied allocation update");

        if next.desired_status.is_terminal() {
            self.stop_group(KillCause::GroupStop).await;
        }
    }

    async fn stop_group(&self, cause: KillCause) {
        self.group_stopping.store(true, Ordering::Release);
        self.publish(Event::new(EventKind::GroupStopRequested).with_reason(cause.as_reason()));

        // A leader that died before the stop still owes its followers a
        // LeaderDead kill, even if its notice is queued behind this update.
        if let Some(leader) = self.leader().filter(|l| l.is_dead()) {
            let action = self.coordinator.lock().on_task_dead(leader.name());
            if let Some(action) = action {
                self.execute(action).await;
            }
        }

        let leader_alive = self.leader().is_some_and(|l| !l.is_dead());
        let action = {
            let mut coordinator = self.coordinator.lock();
            match cause {
                KillCause::Destroy => coordinator.on_destroy(),
                _ => coordinator.on_group_stop(leader_alive),
            }
        };
        if let Some(action) = action {
            self.execute(action).await;
        }
    }

    async fn execute(&self, action: GroupAction) {
        tracing::debug!(?action, "executing group action");
        match action {
            GroupAction::KillLeader(cause) => self.kill_leader(cause).await,
            GroupAction::KillFollowers(cause) => self.kill_followers(cause).await,
            GroupAction::KillAll(cause) => {
                self.kill_leader(cause).await;
                self.kill_followers(cause).await;
            }
        }
    }

    async fn kill_leader(&self, cause: KillCause) {
        if let Some(leader) = self.leader() {
            leader.kill(cause.as_reason()).await;
        }
    }

    async fn kill_followers(&self, cause: KillCause) {
        if cause == KillCause::LeaderDead {
            let leader = self.leader().map(|l| l.name().to_string()).unwrap_or_default();
            tracing::info!(%leader, "leader task dead; killing followers");
            self.publish(Event::new(EventKind::LeaderDead).with_task(leader));
        }
        for task in self.tasks.iter().filter(|t| !t.is_leader() && !t.is_dead()) {
            if cause == KillCause::LeaderDead {
                task.emit_event(TaskEvent::new(TaskEventKind::LeaderDead)).await;
            }
            task.kill(cause.as_reason()).await;
        }
    }

    async fn persist_alloc(&self, alloc: &Allocation) {
        if let Err(e) = self.store.put_alloc(alloc).await {
            tracing::warn!(error = %e, "failed to persist allocation");
            self.publish(Event::new(EventKind::PersistFailed).with_reason(e.to_string()));
        }
    }

    async fn gc(&self) {
        if let Err(e) = self.store.delete_alloc(&self.id).await {
            tracing::warn!(error = %e, "failed to delete persisted state");
            self.publish(Event::new(EventKind::PersistFailed).with_reason(e.to_string()));
        }
        self.publish(Event::new(EventKind::RunnerDestroyed));
        tracing::info!("allocation runner destroyed");
        self.destroyed.cancel();
    }

    fn spawn_fanout(&self) -> Fanout {
        let subs = std::mem::take(&mut *self.subscribers.lock());
        let set = SubscriberSet::new(subs, self.bus.clone());
        let mut rx = self.bus.subscribe();
        let stop = CancellationToken::new();
        let token = stop.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber fan-out lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
            set.shutdown().await;
        });
        Fanout { stop, handle }
    }
}
