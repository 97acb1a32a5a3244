use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime};

use allocvisor::{
    AllocRunner, AllocState, Allocation, ClientStatus, DesiredStatus, DriverFn, EnqueueOutcome,
    Event, EventKind, FileStore, HookError, MemStore, MockDriver, PostrunHook, PrerunHook,
    RecordingUpdater, RestartMode, RestartPolicy, RunnerConfig, RunnerError, RunnerHook,
    StateStore, StoreError, Subscribe, TaskDef, TaskError, TaskEvent, TaskEventKind, TaskState,
    TaskStateRecord,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(10);

async fn wait_for(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

fn all_running(state: &AllocState) -> bool {
    state
        .task_states
        .values()
        .all(|r| r.state == TaskState::Running)
}

fn quick_restarts(attempts: u32) -> RestartPolicy {
    RestartPolicy {
        attempts,
        interval: Duration::from_secs(60),
        delay: Duration::from_millis(1),
        mode: RestartMode::Fail,
        ..RestartPolicy::default()
    }
}

fn leader_group(id: &str, leader_config: serde_json::Value) -> Allocation {
    Allocation::new(
        id,
        "job",
        vec![
            TaskDef::new("follower1"),
            TaskDef::new("leader").leader().with_config(leader_config),
            TaskDef::new("follower2"),
        ],
    )
    .with_restart_policy(RestartPolicy::never())
}

#[tokio::test]
async fn state_is_complete_from_construction() {
    let runner = AllocRunner::builder(leader_group("a1", json!({})))
        .build()
        .unwrap();

    let state = runner.alloc_state();
    assert_eq!(state.client_status, ClientStatus::Pending);
    assert_eq!(state.task_states.len(), 3);
    for record in state.task_states.values() {
        assert_eq!(record.state, TaskState::Pending);
        assert!(record.finished_at.is_none());
        assert!(record.has_event(TaskEventKind::Received));
    }
}

#[tokio::test]
async fn invalid_allocations_are_rejected() {
    let two_leaders = Allocation::new(
        "a1",
        "job",
        vec![TaskDef::new("x").leader(), TaskDef::new("y").leader()],
    );
    let err = AllocRunner::builder(two_leaders).build().err().unwrap();
    assert_eq!(err.as_label(), "runner_invalid_allocation");
}

#[tokio::test]
async fn leader_death_kills_followers() {
    let driver = MockDriver::new();
    let runner = AllocRunner::builder(leader_group("a1", json!({"run_for_ms": 20})))
        .with_driver(Arc::new(driver.clone()))
        .build()
        .unwrap();

    let status = tokio::time::timeout(WAIT, Arc::clone(&runner).run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status, ClientStatus::Complete);

    let state = runner.alloc_state();
    let leader = state.task("leader").unwrap();
    assert!(leader.is_dead());
    assert!(leader.has_event(TaskEventKind::Terminated));
    assert!(!leader.has_event(TaskEventKind::Killing));

    for name in ["follower1", "follower2"] {
        let rec = state.task(name).unwrap();
        assert!(rec.is_dead(), "{name} not dead");
        assert!(!rec.failed);
        let leader_dead = rec.event_position(TaskEventKind::LeaderDead).unwrap();
        let killing = rec.event_position(TaskEventKind::Killing).unwrap();
        let killed = rec.event_position(TaskEventKind::Killed).unwrap();
        assert!(leader_dead < killing && killing < killed, "{name}: {:?}", rec.events);
        assert!(rec.finished_at.unwrap() > leader.finished_at.unwrap());
    }
    assert_eq!(driver.starts("leader"), 1);
}

#[tokio::test]
async fn failed_leader_fails_the_group() {
    let runner = AllocRunner::builder(leader_group(
        "a1",
        json!({"run_for_ms": 10, "exit_code": 3}),
    ))
    .build()
    .unwrap();

    let status = Arc::clone(&runner).run().await.unwrap();
    assert_eq!(status, ClientStatus::Failed);
    let state = runner.alloc_state();
    assert!(state.task("leader").unwrap().failed);
    assert!(!state.task("follower1").unwrap().failed);
}

#[tokio::test]
async fn group_stop_kills_leader_first() {
    let driver = MockDriver::new();
    let updater = RecordingUpdater::new();
    // The leader outlives its kill signal, so followers must wait for it.
    let alloc = leader_group("a1", json!({"ignore_kill_ms": 200}));
    let runner = AllocRunner::builder(alloc.clone())
        .with_driver(Arc::new(driver.clone()))
        .with_updater(Arc::new(updater.clone()))
        .build()
        .unwrap();

    let handle = tokio::spawn(Arc::clone(&runner).run());
    wait_for(|| all_running(&runner.alloc_state())).await;

    let outcome = runner.update(alloc.next_version(DesiredStatus::Stop));
    assert_eq!(outcome, EnqueueOutcome::Enqueued);

    let status = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
    assert_eq!(status, ClientStatus::Complete);
    assert_eq!(runner.alloc().modify_index, 2);

    let state = runner.alloc_state();
    let leader_finished = state.task("leader").unwrap().finished_at.unwrap();
    for name in ["follower1", "follower2"] {
        let rec = state.task(name).unwrap();
        assert!(rec.finished_at.unwrap() > leader_finished, "{name} died before the leader");
        let killing = &rec.events[rec.event_position(TaskEventKind::Killing).unwrap()];
        assert!(killing.at > leader_finished, "{name} was signalled before the leader died");
        assert!(!rec.has_event(TaskEventKind::LeaderDead));
        assert!(rec.has_event(TaskEventKind::Killed));
    }
    assert_eq!(driver.kills("leader"), 1);
    assert_eq!(
        updater.last().map(|s| s.client_status),
        Some(ClientStatus::Complete)
    );
}

/// Memory store whose `put_alloc` for one modify index parks until opened.
#[derive(Clone)]
struct GatedStore {
    inner: MemStore,
    index: u64,
    entered: CancellationToken,
    open: CancellationToken,
}

impl GatedStore {
    fn new(index: u64) -> Self {
        Self {
            inner: MemStore::new(),
            index,
            entered: CancellationToken::new(),
            open: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl StateStore for GatedStore {
    async fn put_alloc(&self, alloc: &Allocation) -> Result<(), StoreError> {
        if alloc.modify_index == self.index {
            self.entered.cancel();
            self.open.cancelled().await;
        }
        self.inner.put_alloc(alloc).await
    }

    async fn get_alloc(&self, alloc_id: &str) -> Result<Option<Allocation>, StoreError> {
        self.inner.get_alloc(alloc_id).await
    }

    async fn put_task_state(
        &self,
        alloc_id: &str,
        task: &str,
        record: &TaskStateRecord,
    ) -> Result<(), StoreError> {
        self.inner.put_task_state(alloc_id, task, record).await
    }

    async fn get_task_states(
        &self,
        alloc_id: &str,
    ) -> Result<BTreeMap<String, TaskStateRecord>, StoreError> {
        self.inner.get_task_states(alloc_id).await
    }

    async fn delete_alloc(&self, alloc_id: &str) -> Result<(), StoreError> {
        self.inner.delete_alloc(alloc_id).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn leader_death_wins_over_a_stop_applied_first() {
    // The control loop picks between the leader's Dead notice and the queued
    // stop in either order; run the scenario enough times to see both.
    for round in 0..10 {
        let leader_exit = CancellationToken::new();
        let exit = leader_exit.clone();
        let driver = DriverFn::arc("gated", move |task: TaskDef, kill: CancellationToken| {
            let exit = exit.clone();
            async move {
                if task.leader {
                    tokio::select! {
                        _ = exit.cancelled() => Ok(()),
                        _ = kill.cancelled() => Err(TaskError::Canceled),
                    }
                } else {
                    kill.cancelled().await;
                    Err(TaskError::Canceled)
                }
            }
        });

        let store = GatedStore::new(2);
        let v1 = leader_group("a1", json!({}));
        let v2 = v1.next_version(DesiredStatus::Run);
        let v3 = v2.next_version(DesiredStatus::Stop);
        let runner = AllocRunner::builder(v1)
            .with_driver(driver)
            .with_store(Arc::new(store.clone()))
            .build()
            .unwrap();

        let handle = tokio::spawn(Arc::clone(&runner).run());
        wait_for(|| all_running(&runner.alloc_state())).await;

        // Park the control loop inside the v2 update.
        assert_eq!(runner.update(v2), EnqueueOutcome::Enqueued);
        tokio::time::timeout(WAIT, store.entered.cancelled()).await.unwrap();

        leader_exit.cancel();
        wait_for(|| runner.task_state("leader").unwrap().is_dead()).await;
        assert_eq!(runner.update(v3), EnqueueOutcome::Enqueued);
        store.open.cancel();

        let status = tokio::time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
        assert_eq!(status, ClientStatus::Complete);

        let state = runner.alloc_state();
        for name in ["follower1", "follower2"] {
            let rec = state.task(name).unwrap();
            let leader_dead = rec.event_position(TaskEventKind::LeaderDead);
            let killing = rec.event_position(TaskEventKind::Killing);
            assert!(
                matches!((leader_dead, killing), (Some(l), Some(k)) if l < k),
                "round {round}, {name}: {:?}",
                rec.events.iter().map(|e| e.kind).collect::<Vec<_>>()
            );
        }
    }
}

#[tokio::test]
async fn restored_dead_leader_is_never_started_or_killed() {
    let store = MemStore::new();
    let alloc = leader_group("a1", json!({}));

    // State left behind by a previous client process: leader dead, followers running.
    let t0 = SystemTime::now();
    store.put_alloc(&alloc).await.unwrap();
    let mut leader = TaskStateRecord::pending();
    leader.append(TaskEvent::new(TaskEventKind::Started), t0);
    leader.transition(TaskState::Running, t0);
    leader.append(TaskEvent::new(TaskEventKind::Terminated).with_exit_code(0), t0);
    leader.transition(TaskState::Dead, t0 + Duration::from_millis(1));
    store.put_task_state("a1", "leader", &leader).await.unwrap();
    for name in ["follower1", "follower2"] {
        let mut rec = TaskStateRecord::pending();
        rec.append(TaskEvent::new(TaskEventKind::Started), t0);
        rec.transition(TaskState::Running, t0);
        store.put_task_state("a1", name, &rec).await.unwrap();
    }

    let driver = MockDriver::new();
    let runner = AllocRunner::builder(alloc)
        .with_driver(Arc::new(driver.clone()))
        .with_store(Arc::new(store.clone()))
        .build()
        .unwrap();
    runner.restore().await.unwrap();

    let status = tokio::time::timeout(WAIT, Arc::clone(&runner).run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status, ClientStatus::Complete);
    runner.destroy().await;
    tokio::time::timeout(WAIT, runner.destroyed())
        .await
        .expect("destroy did not finish");

    assert_eq!(driver.starts("leader"), 0);
    assert_eq!(driver.kills("leader"), 0);
    let state = runner.alloc_state();
    let leader = state.task("leader").unwrap();
    assert!(!leader.has_event(TaskEventKind::Killing));
    assert_eq!(leader.finished_at, Some(t0 + Duration::from_millis(1)));
    for name in ["follower1", "follower2"] {
        let rec = state.task(name).unwrap();
        assert!(rec.is_dead());
        assert!(rec.has_event(TaskEventKind::LeaderDead), "{name}: {:?}", rec.events);
    }
    assert!(!store.contains("a1"));
}

#[tokio::test]
async fn update_semantics() {
    let alloc = Allocation::new("a1", "job", vec![TaskDef::new("t")]);
    let runner = AllocRunner::builder(alloc.clone()).build().unwrap();

    let mut v3 = alloc.clone();
    v3.modify_index = 3;
    let mut v2 = alloc.clone();
    v2.modify_index = 2;
    let mut v4 = alloc.clone();
    v4.modify_index = 4;
    let mut foreign = alloc.clone();
    foreign.id = "other".into();
    foreign.modify_index = 10;

    assert_eq!(runner.update(v3), EnqueueOutcome::Enqueued);
    assert_eq!(runner.update(v2), EnqueueOutcome::Stale);
    assert_eq!(runner.update(v4.clone()), EnqueueOutcome::Replaced);
    assert_eq!(runner.update(foreign), EnqueueOutcome::Foreign);

    let handle = tokio::spawn(Arc::clone(&runner).run());
    wait_for(|| runner.alloc().modify_index == 4).await;

    // Already applied: queued, then dropped by the control loop.
    assert_eq!(runner.update(v4), EnqueueOutcome::Enqueued);

    runner.destroy().await;
    tokio::time::timeout(WAIT, runner.destroyed()).await.unwrap();
    handle.await.unwrap().unwrap();
    assert_eq!(runner.alloc().modify_index, 4);

    let mut v5 = alloc;
    v5.modify_index = 5;
    assert_eq!(runner.update(v5), EnqueueOutcome::Closed);
}

#[tokio::test]
async fn zero_attempts_means_single_start() {
    let driver = MockDriver::new();
    let alloc = Allocation::new(
        "a1",
        "job",
        vec![TaskDef::new("t").with_config(json!({"run_for_ms": 1, "exit_code": 1}))],
    )
    .with_restart_policy(RestartPolicy::never());
    let runner = AllocRunner::builder(alloc)
        .with_driver(Arc::new(driver.clone()))
        .build()
        .unwrap();

    assert_eq!(Arc::clone(&runner).run().await.unwrap(), ClientStatus::Failed);
    assert_eq!(driver.starts("t"), 1);
    let rec = runner.task_state("t").unwrap();
    assert!(rec.has_event(TaskEventKind::NotRestarting));
    assert_eq!(rec.restarts, 0);
}

#[tokio::test]
async fn restarts_until_policy_gives_up() {
    let driver = MockDriver::new();
    let alloc = Allocation::new(
        "a1",
        "job",
        vec![TaskDef::new("t").with_config(json!({"run_for_ms": 1, "exit_code": 1}))],
    )
    .with_restart_policy(quick_restarts(2));
    let runner = AllocRunner::builder(alloc)
        .with_driver(Arc::new(driver.clone()))
        .build()
        .unwrap();

    assert_eq!(Arc::clone(&runner).run().await.unwrap(), ClientStatus::Failed);
    assert_eq!(driver.starts("t"), 3);
    assert_eq!(runner.task_state("t").unwrap().restarts, 2);
}

#[tokio::test]
async fn delay_mode_waits_out_the_interval() {
    let driver = MockDriver::new();
    let policy = RestartPolicy {
        attempts: 1,
        interval: Duration::from_millis(200),
        delay: Duration::from_millis(1),
        mode: RestartMode::Delay,
        ..RestartPolicy::default()
    };
    let alloc = Allocation::new(
        "a1",
        "job",
        vec![TaskDef::new("t").with_config(json!({"run_for_ms": 1, "exit_code": 1}))],
    )
    .with_restart_policy(policy);
    let runner = AllocRunner::builder(alloc)
        .with_driver(Arc::new(driver.clone()))
        .build()
        .unwrap();

    let handle = tokio::spawn(Arc::clone(&runner).run());
    wait_for(|| driver.starts("t") >= 3).await;

    let rec = runner.task_state("t").unwrap();
    assert!(!rec.has_event(TaskEventKind::NotRestarting));
    assert!(
        rec.events
            .iter()
            .filter_map(|e| e.restart_delay)
            .any(|d| d > Duration::from_millis(50)),
        "no interval-long delay in {:?}",
        rec.events
    );

    runner.destroy().await;
    tokio::time::timeout(WAIT, runner.destroyed()).await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn persistence_failure_does_not_stop_the_lifecycle() {
    let store = MemStore::new();
    store.set_fail_writes(true);
    let alloc = Allocation::new(
        "a1",
        "job",
        vec![TaskDef::new("t").with_config(json!({"run_for_ms": 5}))],
    );
    let runner = AllocRunner::builder(alloc)
        .with_store(Arc::new(store))
        .build()
        .unwrap();
    let mut events = runner.events();

    assert_eq!(Arc::clone(&runner).run().await.unwrap(), ClientStatus::Complete);

    let mut persist_failed = 0;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::PersistFailed {
            persist_failed += 1;
        }
    }
    assert!(persist_failed > 0);
}

#[tokio::test]
async fn destroy_is_idempotent_and_concurrent() {
    let alloc = Allocation::new("a1", "job", vec![TaskDef::new("a"), TaskDef::new("b")]);
    let runner = AllocRunner::builder(alloc).build().unwrap();

    let handle = tokio::spawn(Arc::clone(&runner).run());
    wait_for(|| all_running(&runner.alloc_state())).await;

    tokio::join!(runner.destroy(), runner.destroy());
    tokio::time::timeout(WAIT, runner.destroyed()).await.unwrap();
    runner.destroy().await;

    assert_eq!(handle.await.unwrap().unwrap(), ClientStatus::Complete);
    runner.wait().await;
    assert!(runner.is_destroyed());

    let again = Arc::clone(&runner).run().await;
    assert!(matches!(again, Err(RunnerError::AlreadyRunning { .. })));
}

#[tokio::test]
async fn destroy_before_run_collects_immediately() {
    let store = MemStore::new();
    let alloc = Allocation::new("a1", "job", vec![TaskDef::new("t")]);
    store.put_alloc(&alloc).await.unwrap();
    let runner = AllocRunner::builder(alloc)
        .with_store(Arc::new(store.clone()))
        .build()
        .unwrap();

    runner.destroy().await;
    assert!(runner.is_destroyed());
    assert!(!store.contains("a1"));
    assert!(Arc::clone(&runner).run().await.is_err());
}

#[tokio::test]
async fn stubborn_task_is_force_terminated_on_destroy() {
    let alloc = Allocation::new(
        "a1",
        "job",
        vec![
            TaskDef::new("stubborn")
                .with_config(json!({"ignore_kill_ms": 60_000}))
                .with_kill_timeout(Duration::from_millis(50)),
        ],
    );
    let runner = AllocRunner::builder(alloc)
        .with_config(RunnerConfig::default())
        .build()
        .unwrap();
    let mut events = runner.events();

    let handle = tokio::spawn(Arc::clone(&runner).run());
    wait_for(|| all_running(&runner.alloc_state())).await;
    let started = Instant::now();
    runner.destroy().await;
    tokio::time::timeout(WAIT, runner.destroyed()).await.unwrap();
    let elapsed = started.elapsed();
    handle.await.unwrap().unwrap();

    assert!(elapsed >= Duration::from_millis(50), "finished before the kill timeout: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(1), "teardown not bounded by the kill timeout: {elapsed:?}");

    let mut forced = false;
    while let Ok(ev) = events.try_recv() {
        forced |= ev.kind == EventKind::TaskForceKilled;
    }
    assert!(forced);
}

#[tokio::test]
async fn second_run_is_rejected() {
    let alloc = Allocation::new("a1", "job", vec![TaskDef::new("t")]);
    let runner = AllocRunner::builder(alloc).build().unwrap();
    let handle = tokio::spawn(Arc::clone(&runner).run());
    wait_for(|| all_running(&runner.alloc_state())).await;

    let err = Arc::clone(&runner).run().await.unwrap_err();
    assert_eq!(err.as_label(), "runner_already_running");

    runner.destroy().await;
    handle.await.unwrap().unwrap();
}

// ---------------------------
// Hooks
// ---------------------------

struct OrderHook {
    name: &'static str,
    fail: bool,
    driver: MockDriver,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl PrerunHook for OrderHook {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn prerun(&self, _alloc: &Allocation) -> Result<(), HookError> {
        self.log
            .lock()
            .push(format!("pre:{}:{}", self.name, self.driver.starts("t")));
        if self.fail {
            return Err(HookError::new(self.name, "volume missing"));
        }
        Ok(())
    }
}

#[async_trait]
impl PostrunHook for OrderHook {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn postrun(&self, _alloc: &Allocation, state: &AllocState) -> Result<(), HookError> {
        self.log
            .lock()
            .push(format!("post:{}:{}", self.name, state.all_dead()));
        Ok(())
    }
}

fn order_hook(
    name: &'static str,
    fail: bool,
    driver: &MockDriver,
    log: &Arc<Mutex<Vec<String>>>,
) -> Arc<OrderHook> {
    Arc::new(OrderHook {
        name,
        fail,
        driver: driver.clone(),
        log: Arc::clone(log),
    })
}

#[tokio::test]
async fn hooks_run_around_the_group() {
    let driver = MockDriver::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let alloc = Allocation::new(
        "a1",
        "job",
        vec![TaskDef::new("t").with_config(json!({"run_for_ms": 5}))],
    );
    let runner = AllocRunner::builder(alloc)
        .with_driver(Arc::new(driver.clone()))
        .with_hook(RunnerHook::Prerun(order_hook("net", false, &driver, &log)))
        .with_hook(RunnerHook::Postrun(order_hook("cleanup", false, &driver, &log)))
        .with_hook(RunnerHook::Prerun(order_hook("disk", false, &driver, &log)))
        .build()
        .unwrap();

    assert_eq!(Arc::clone(&runner).run().await.unwrap(), ClientStatus::Complete);
    assert_eq!(
        *log.lock(),
        vec!["pre:net:0", "pre:disk:0", "post:cleanup:true"]
    );
}

struct StuckHook {
    entered: CancellationToken,
}

#[async_trait]
impl PrerunHook for StuckHook {
    fn name(&self) -> &'static str {
        "stuck"
    }

    async fn prerun(&self, _alloc: &Allocation) -> Result<(), HookError> {
        self.entered.cancel();
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn destroy_during_prerun_starts_nothing() {
    let driver = MockDriver::new();
    let entered = CancellationToken::new();
    let alloc = Allocation::new("a1", "job", vec![TaskDef::new("t"), TaskDef::new("u")]);
    let runner = AllocRunner::builder(alloc)
        .with_driver(Arc::new(driver.clone()))
        .with_hook(RunnerHook::Prerun(Arc::new(StuckHook {
            entered: entered.clone(),
        })))
        .build()
        .unwrap();

    let handle = tokio::spawn(Arc::clone(&runner).run());
    tokio::time::timeout(WAIT, entered.cancelled()).await.unwrap();
    runner.destroy().await;
    tokio::time::timeout(WAIT, runner.destroyed()).await.unwrap();

    assert_eq!(handle.await.unwrap().unwrap(), ClientStatus::Complete);
    for name in ["t", "u"] {
        assert_eq!(driver.starts(name), 0);
        let rec = runner.task_state(name).unwrap();
        assert!(rec.is_dead());
        assert!(!rec.failed);
        assert!(rec.has_event(TaskEventKind::Killed));
        assert!(!rec.has_event(TaskEventKind::Started));
    }
}

#[tokio::test]
async fn failing_prerun_hook_fails_every_task() {
    let driver = MockDriver::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let alloc = Allocation::new("a1", "job", vec![TaskDef::new("t"), TaskDef::new("u")]);
    let runner = AllocRunner::builder(alloc)
        .with_driver(Arc::new(driver.clone()))
        .with_hook(RunnerHook::Prerun(order_hook("disk", true, &driver, &log)))
        .with_hook(RunnerHook::Prerun(order_hook("net", false, &driver, &log)))
        .build()
        .unwrap();

    assert_eq!(Arc::clone(&runner).run().await.unwrap(), ClientStatus::Failed);
    assert_eq!(driver.starts("t"), 0);
    assert_eq!(driver.starts("u"), 0);
    assert_eq!(*log.lock(), vec!["pre:disk:0"]);
    for rec in runner.alloc_state().task_states.values() {
        assert!(rec.failed);
        assert!(rec.has_event(TaskEventKind::HookFailed));
    }
}

// ---------------------------
// Observability and persistence
// ---------------------------

#[derive(Default)]
struct Counter {
    exited: AtomicUsize,
    dead: AtomicUsize,
}

#[async_trait]
impl Subscribe for Counter {
    async fn on_event(&self, event: &Event) {
        match event.kind {
            EventKind::RunnerExited => {
                self.exited.fetch_add(1, Ordering::SeqCst);
            }
            EventKind::TaskDead => {
                self.dead.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "counter"
    }
}

#[tokio::test]
async fn subscribers_see_runtime_events() {
    let counter = Arc::new(Counter::default());
    let alloc = Allocation::new(
        "a1",
        "job",
        vec![
            TaskDef::new("a").with_config(json!({"run_for_ms": 1})),
            TaskDef::new("b").with_config(json!({"run_for_ms": 2})),
        ],
    );
    let runner = AllocRunner::builder(alloc)
        .with_subscribers(vec![counter.clone(), Arc::new(allocvisor::LogWriter::new())])
        .build()
        .unwrap();

    Arc::clone(&runner).run().await.unwrap();
    assert_eq!(counter.exited.load(Ordering::SeqCst), 1);
    assert_eq!(counter.dead.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn file_store_carries_state_across_runners() {
    let dir = tempfile::tempdir().unwrap();
    let alloc = Allocation::new(
        "a1",
        "job",
        vec![TaskDef::new("t").with_config(json!({"run_for_ms": 1}))],
    );

    {
        let store = FileStore::open(dir.path()).await.unwrap();
        let runner = AllocRunner::builder(alloc.clone())
            .with_store(Arc::new(store))
            .build()
            .unwrap();
        assert_eq!(Arc::clone(&runner).run().await.unwrap(), ClientStatus::Complete);
    }

    let driver = MockDriver::new();
    let store = FileStore::open(dir.path()).await.unwrap();
    let runner = AllocRunner::builder(alloc)
        .with_driver(Arc::new(driver.clone()))
        .with_store(Arc::new(store.clone()))
        .build()
        .unwrap();
    runner.restore().await.unwrap();
    assert!(runner.task_state("t").unwrap().is_dead());

    assert_eq!(Arc::clone(&runner).run().await.unwrap(), ClientStatus::Complete);
    assert_eq!(driver.starts("t"), 0);

    runner.destroy().await;
    assert!(runner.is_destroyed());
    assert!(store.get_alloc("a1").await.unwrap().is_none());
}

#[tokio::test]
async fn restore_after_run_is_rejected() {
    let alloc = Allocation::new(
        "a1",
        "job",
        vec![TaskDef::new("t").with_config(json!({"run_for_ms": 1}))],
    );
    let runner = AllocRunner::builder(alloc).build().unwrap();
    Arc::clone(&runner).run().await.unwrap();
    let err = runner.restore().await.unwrap_err();
    assert_eq!(err.as_label(), "runner_restore_failed");
}
