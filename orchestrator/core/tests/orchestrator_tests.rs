// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scheduling behaviour of the task orchestrator: dependency ordering,
//! priority bands, resource accounting, failure capture, cancellation and
//! retention.

use async_trait::async_trait;
use chrono::Duration;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use synapse_core::{
    Capability, ExecutionContext, ExecutionError, ExecutorRegistry, OrchestratorConfig, OrchestratorEvent,
    TaskId, TaskKind, TaskOrchestrator, TaskPriority, TaskSpec, TaskStatus, WorkExecutor, WorkerArchetype,
    WorkerKind, WorkerStatus,
};
use synapse_cortex::{ManualClock, MemoryGraph, SearchCriteria};
use tokio::sync::Semaphore;

/// Holds every execution until the test hands out permits.
struct Gate {
    permits: Semaphore,
}

impl Gate {
    fn closed() -> Arc<Self> {
        Arc::new(Self {
            permits: Semaphore::new(0),
        })
    }

    fn open(&self, executions: usize) {
        self.permits.add_permits(executions);
    }
}

#[async_trait]
impl WorkExecutor for Gate {
    async fn execute(&self, ctx: ExecutionContext) -> Result<Value, ExecutionError> {
        tokio::select! {
            permit = self.permits.acquire() => {
                permit.map_err(|e| ExecutionError::Failed(e.to_string()))?.forget();
            }
            _ = ctx.cancellation.cancelled() => return Err(ExecutionError::Cancelled),
        }

        if let Some(reason) = ctx.input.get("fail").and_then(Value::as_str) {
            return Err(ExecutionError::Failed(reason.to_string()));
        }
        if ctx.input.get("panic").is_some() {
            panic!("executor blew up");
        }
        Ok(json!({ "task": ctx.task_id }))
    }
}

struct Harness {
    orchestrator: Arc<TaskOrchestrator>,
    gate: Arc<Gate>,
    clock: Arc<ManualClock>,
}

fn harness_with(config: OrchestratorConfig) -> Harness {
    let clock = Arc::new(ManualClock::starting_now());
    let memory = Arc::new(MemoryGraph::with_clock(clock.clone()));
    let gate = Gate::closed();
    let orchestrator = TaskOrchestrator::new(config, memory, ExecutorRegistry::uniform(gate.clone()));
    Harness {
        orchestrator,
        gate,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(OrchestratorConfig::default())
}

fn spec(kind: TaskKind, priority: TaskPriority) -> TaskSpec {
    TaskSpec::new(kind, priority).with_resources(0.1, 0.1)
}

fn status_of(h: &Harness, id: TaskId) -> TaskStatus {
    h.orchestrator.get_task(id).unwrap().status
}

#[tokio::test]
async fn test_dependency_chain_runs_in_order() {
    let h = harness();
    let a = h.orchestrator.submit_task(spec(TaskKind::Analysis, TaskPriority::Normal)).unwrap();
    let b = h
        .orchestrator
        .submit_task(spec(TaskKind::Prediction, TaskPriority::Normal).depends_on([a]))
        .unwrap();
    let c = h
        .orchestrator
        .submit_task(spec(TaskKind::Optimization, TaskPriority::Normal).depends_on([b]))
        .unwrap();

    // Workers for B and C are idle, but their dependencies are not done
    for _ in 0..3 {
        h.orchestrator.tick();
        assert_eq!(status_of(&h, a), TaskStatus::Running);
        assert_eq!(status_of(&h, b), TaskStatus::Pending);
        assert_eq!(status_of(&h, c), TaskStatus::Pending);
    }

    h.gate.open(1);
    h.orchestrator.drain().await;
    assert_eq!(status_of(&h, a), TaskStatus::Completed);
    assert_eq!(status_of(&h, b), TaskStatus::Pending);

    h.orchestrator.tick();
    assert_eq!(status_of(&h, b), TaskStatus::Running);
    assert_eq!(status_of(&h, c), TaskStatus::Pending);

    h.gate.open(1);
    h.orchestrator.drain().await;
    h.orchestrator.tick();
    assert_eq!(status_of(&h, c), TaskStatus::Running);

    h.gate.open(1);
    h.orchestrator.drain().await;
    assert_eq!(status_of(&h, c), TaskStatus::Completed);
    assert!(h.orchestrator.is_idle());
}

#[tokio::test]
async fn test_blocked_critical_task_runs_after_its_dependency() {
    let h = harness();
    let a = h.orchestrator.submit_task(spec(TaskKind::Control, TaskPriority::High)).unwrap();
    let b = h
        .orchestrator
        .submit_task(spec(TaskKind::Control, TaskPriority::Critical).depends_on([a]))
        .unwrap();

    let report = h.orchestrator.tick();
    assert_eq!(report.dispatched.len(), 1);
    assert_eq!(report.dispatched[0].0, a);
    assert_eq!(report.still_pending, 1);

    h.gate.open(1);
    h.orchestrator.drain().await;

    let report = h.orchestrator.tick();
    assert_eq!(report.dispatched.len(), 1);
    assert_eq!(report.dispatched[0].0, b);

    let a_task = h.orchestrator.get_task(a).unwrap();
    let b_task = h.orchestrator.get_task(b).unwrap();
    assert!(b_task.started_at.unwrap() >= a_task.ended_at.unwrap());

    h.gate.open(1);
    h.orchestrator.drain().await;
}

#[tokio::test]
async fn test_low_priority_task_runs_once_capacity_frees() {
    let h = harness();
    // The controller's whole budget
    let critical = h
        .orchestrator
        .submit_task(TaskSpec::new(TaskKind::Control, TaskPriority::Critical).with_resources(0.1, 0.1))
        .unwrap();
    let low = h.orchestrator.submit_task(spec(TaskKind::Control, TaskPriority::Low)).unwrap();

    h.orchestrator.tick();
    assert_eq!(status_of(&h, critical), TaskStatus::Running);
    assert_eq!(status_of(&h, low), TaskStatus::Pending);

    h.orchestrator.tick();
    assert_eq!(status_of(&h, low), TaskStatus::Pending);

    h.gate.open(1);
    h.orchestrator.drain().await;
    assert_eq!(status_of(&h, critical), TaskStatus::Completed);

    let report = h.orchestrator.tick();
    assert_eq!(report.dispatched.len(), 1);
    assert_eq!(report.dispatched[0].0, low);

    h.gate.open(1);
    h.orchestrator.drain().await;
}

#[tokio::test]
async fn test_worker_consumption_stays_within_ceiling() {
    let config = OrchestratorConfig {
        capability_requirements: BTreeMap::new(),
        ..Default::default()
    };
    let h = harness_with(config);

    let shares = [(0.5, 0.4), (0.3, 0.3), (0.2, 0.2), (0.1, 0.1), (0.45, 0.05), (0.05, 0.35)];
    for (i, (cpu, memory)) in shares.into_iter().cycle().take(18).enumerate() {
        let kind = TaskKind::ALL[i % TaskKind::ALL.len()];
        h.orchestrator
            .submit_task(TaskSpec::new(kind, TaskPriority::Normal).with_resources(cpu, memory))
            .unwrap();
    }

    for _ in 0..30 {
        h.orchestrator.tick();
        for worker in h.orchestrator.workers() {
            assert!(worker.budget.within_ceiling(), "{:?} over budget", worker.kind);
        }
        // At most one execution per worker is in flight
        h.gate.open(5);
        h.orchestrator.drain().await;
        if h.orchestrator.is_idle() {
            break;
        }
    }

    assert!(h.orchestrator.is_idle());
    assert_eq!(h.orchestrator.status().tasks.completed, 18);
}

#[tokio::test]
async fn test_release_restores_budget_on_success_and_failure() {
    let h = harness();
    let ok = h.orchestrator.submit_task(spec(TaskKind::Learning, TaskPriority::Normal)).unwrap();

    h.orchestrator.tick();
    let worker_id = h.orchestrator.get_task(ok).unwrap().assigned_workers[0];
    let busy = h.orchestrator.pool().get(worker_id).unwrap();
    assert_eq!(busy.status, WorkerStatus::Busy);
    assert_eq!(busy.budget.current_cpu, 0.1);

    h.gate.open(1);
    h.orchestrator.drain().await;

    let bad = h
        .orchestrator
        .submit_task(spec(TaskKind::Learning, TaskPriority::Normal).with_input(json!({ "fail": "diverged" })))
        .unwrap();
    h.orchestrator.tick();
    assert_eq!(h.orchestrator.get_task(bad).unwrap().assigned_workers, vec![worker_id]);
    h.gate.open(1);
    h.orchestrator.drain().await;

    let worker = h.orchestrator.pool().get(worker_id).unwrap();
    assert_eq!(worker.status, WorkerStatus::Idle);
    assert_eq!(worker.current_task, None);
    assert_eq!(worker.budget.current_cpu, 0.0);
    assert_eq!(worker.budget.current_memory, 0.0);
    assert_eq!(worker.performance.tasks_completed, 2);
    assert_eq!(worker.performance.success_rate, 0.5);
}

#[tokio::test]
async fn test_failure_recorded_with_higher_importance() {
    let h = harness();
    let ok = h.orchestrator.submit_task(spec(TaskKind::Analysis, TaskPriority::Normal)).unwrap();
    let bad = h
        .orchestrator
        .submit_task(spec(TaskKind::Prediction, TaskPriority::Normal).with_input(json!({ "fail": "no signal" })))
        .unwrap();

    h.orchestrator.tick();
    h.gate.open(2);
    h.orchestrator.drain().await;

    assert_eq!(status_of(&h, ok), TaskStatus::Completed);
    let failed = h.orchestrator.get_task(bad).unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("no signal"));
    assert_eq!(failed.output, None);

    let results = h
        .orchestrator
        .memory()
        .search_nodes(&SearchCriteria::new().tags(["result"]));
    assert_eq!(results.len(), 2);
    assert!(results[0].tags.contains("failed"));
    assert!(results[1].tags.contains("completed"));
    assert!(results[0].importance > results[1].importance);
    assert_eq!(results[0].origin, failed.assigned_workers[0].to_string());
}

#[tokio::test]
async fn test_executor_panic_fails_only_that_task() {
    let h = harness();
    let boom = h
        .orchestrator
        .submit_task(spec(TaskKind::Control, TaskPriority::Normal).with_input(json!({ "panic": true })))
        .unwrap();
    let fine = h.orchestrator.submit_task(spec(TaskKind::Analysis, TaskPriority::Normal)).unwrap();

    h.orchestrator.tick();
    h.gate.open(2);
    h.orchestrator.drain().await;

    let boom = h.orchestrator.get_task(boom).unwrap();
    assert_eq!(boom.status, TaskStatus::Failed);
    assert!(boom.error.unwrap().contains("executor blew up"));
    assert_eq!(status_of(&h, fine), TaskStatus::Completed);

    let status = h.orchestrator.status();
    assert_eq!(status.workers.idle, 5);
    assert_eq!(status.tasks.failed, 1);
    assert_eq!(status.tasks.completed, 1);
}

#[tokio::test]
async fn test_cancel_running_task() {
    let h = harness();
    let id = h.orchestrator.submit_task(spec(TaskKind::Optimization, TaskPriority::Normal)).unwrap();
    h.orchestrator.tick();

    assert_eq!(h.orchestrator.cancel_task(id).unwrap(), TaskStatus::Running);
    h.orchestrator.drain().await;

    let task = h.orchestrator.get_task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(task.ended_at.is_some());

    let worker = h.orchestrator.pool().get(task.assigned_workers[0]).unwrap();
    assert_eq!(worker.status, WorkerStatus::Idle);
    assert_eq!(worker.budget.current_cpu, 0.0);
    // Cancellation is neither a success nor a failure
    assert_eq!(worker.performance.tasks_completed, 0);
}

#[tokio::test]
async fn test_retention_purges_terminal_tasks() {
    let h = harness();
    let done = h.orchestrator.submit_task(spec(TaskKind::Analysis, TaskPriority::Normal)).unwrap();
    h.orchestrator.tick();
    h.gate.open(1);
    h.orchestrator.drain().await;

    h.clock.advance(Duration::minutes(59));
    assert!(h.orchestrator.tick().purged.is_empty());
    assert!(h.orchestrator.get_task(done).is_some());

    h.clock.advance(Duration::minutes(2));
    assert_eq!(h.orchestrator.tick().purged, vec![done]);
    assert!(h.orchestrator.get_task(done).is_none());
    assert_eq!(h.orchestrator.status().tasks.retired, 1);

    // Memory is untouched by the purge
    assert_eq!(h.orchestrator.memory().stats().nodes, 2);

    // A purged completion still satisfies later dependents
    let next = h
        .orchestrator
        .submit_task(spec(TaskKind::Analysis, TaskPriority::Normal).depends_on([done]))
        .unwrap();
    h.orchestrator.tick();
    assert_eq!(status_of(&h, next), TaskStatus::Running);
    h.gate.open(1);
    h.orchestrator.drain().await;
}

#[tokio::test]
async fn test_progress_estimate_saturates_below_one() {
    let h = harness();
    let id = h.orchestrator.submit_task(spec(TaskKind::Prediction, TaskPriority::Normal)).unwrap();
    h.orchestrator.tick();
    assert_eq!(h.orchestrator.get_task(id).unwrap().progress, 0.0);

    h.clock.advance(Duration::seconds(5));
    h.orchestrator.tick();
    assert_eq!(h.orchestrator.get_task(id).unwrap().progress, 0.5);

    h.clock.advance(Duration::seconds(60));
    h.orchestrator.tick();
    assert_eq!(h.orchestrator.get_task(id).unwrap().progress, 0.9);

    h.gate.open(1);
    h.orchestrator.drain().await;
    let task = h.orchestrator.get_task(id).unwrap();
    assert_eq!(task.progress, 1.0);
    assert_eq!(task.elapsed_ms(), 65_000);
}

#[tokio::test]
async fn test_events_follow_task_lifecycle() {
    let h = harness();
    let mut events = h.orchestrator.event_bus().subscribe();

    let id = h.orchestrator.submit_task(spec(TaskKind::Analysis, TaskPriority::Normal)).unwrap();
    h.orchestrator.tick();
    h.gate.open(1);
    h.orchestrator.drain().await;

    let received: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(received.len(), 3);
    assert!(matches!(received[0], OrchestratorEvent::TaskSubmitted { task_id, .. } if task_id == id));
    assert!(matches!(received[1], OrchestratorEvent::TaskDispatched { task_id, .. } if task_id == id));
    assert!(matches!(received[2], OrchestratorEvent::TaskCompleted { task_id, .. } if task_id == id));
}

#[tokio::test]
async fn test_missing_executor_fails_task() {
    let clock = Arc::new(ManualClock::starting_now());
    let memory = Arc::new(MemoryGraph::with_clock(clock));
    let gate = Gate::closed();
    let orchestrator = TaskOrchestrator::new(
        OrchestratorConfig::default(),
        memory,
        ExecutorRegistry::new().with(TaskKind::Analysis, gate),
    );

    let id = orchestrator.submit_task(spec(TaskKind::Control, TaskPriority::Normal)).unwrap();
    orchestrator.tick();
    orchestrator.drain().await;

    let task = orchestrator.get_task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("no executor registered"));
}

#[tokio::test]
async fn test_offline_worker_holds_back_matching_tasks() {
    let config = OrchestratorConfig {
        workers: vec![WorkerArchetype::new(WorkerKind::Controller, [Capability::SystemControl], 1.0, 1.0)],
        ..Default::default()
    };
    let h = harness_with(config);
    let worker_id = h.orchestrator.workers()[0].id;
    h.orchestrator.set_worker_status(worker_id, WorkerStatus::Offline).unwrap();

    let id = h.orchestrator.submit_task(spec(TaskKind::Control, TaskPriority::Critical)).unwrap();
    assert!(h.orchestrator.tick().dispatched.is_empty());
    assert_eq!(status_of(&h, id), TaskStatus::Pending);

    h.orchestrator.set_worker_status(worker_id, WorkerStatus::Idle).unwrap();
    assert_eq!(h.orchestrator.tick().dispatched.len(), 1);
    h.gate.open(1);
    h.orchestrator.drain().await;
}

#[tokio::test]
async fn test_scheduler_loop_runs_until_shutdown() {
    let config = OrchestratorConfig {
        tick_interval_ms: 10,
        ..Default::default()
    };
    let h = harness_with(config);
    let shutdown = h.orchestrator.shutdown_token();
    let handle = h.orchestrator.clone().run();

    let a = h.orchestrator.submit_task(spec(TaskKind::Analysis, TaskPriority::Normal)).unwrap();
    let b = h
        .orchestrator
        .submit_task(spec(TaskKind::Learning, TaskPriority::Normal).depends_on([a]))
        .unwrap();
    h.gate.open(2);

    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !h.orchestrator.is_idle() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("tasks did not finish");

    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(status_of(&h, a), TaskStatus::Completed);
    assert_eq!(status_of(&h, b), TaskStatus::Completed);
}

#[tokio::test]
async fn test_unbounded_retention_keeps_terminal_tasks() {
    let h = harness_with(OrchestratorConfig {
        retention_secs: 10_000_000_000_000_000,
        ..Default::default()
    });
    let id = h.orchestrator.submit_task(spec(TaskKind::Analysis, TaskPriority::Normal)).unwrap();
    h.orchestrator.tick();
    h.gate.open(1);
    h.orchestrator.drain().await;

    h.clock.advance(Duration::days(3650));
    assert!(h.orchestrator.tick().purged.is_empty());
    assert_eq!(status_of(&h, id), TaskStatus::Completed);
}

#[tokio::test]
async fn test_zero_tick_interval_still_schedules() {
    let h = harness_with(OrchestratorConfig {
        tick_interval_ms: 0,
        ..Default::default()
    });
    let shutdown = h.orchestrator.shutdown_token();
    let handle = h.orchestrator.clone().run();

    let id = h.orchestrator.submit_task(spec(TaskKind::Control, TaskPriority::Normal)).unwrap();
    h.gate.open(1);

    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !h.orchestrator.is_idle() {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("task did not finish");

    shutdown.cancel();
    handle.await.unwrap();
    assert_eq!(status_of(&h, id), TaskStatus::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_submissions_racing_the_scheduler_stay_consistent() {
    const TASKS: usize = 40;

    let h = harness_with(OrchestratorConfig {
        tick_interval_ms: 1,
        ..Default::default()
    });
    let mut events = h.orchestrator.event_bus().subscribe();
    h.gate.open(TASKS);
    let shutdown = h.orchestrator.shutdown_token();
    let handle = h.orchestrator.clone().run();

    let mut ids = Vec::with_capacity(TASKS);
    for i in 0..TASKS {
        let kind = TaskKind::ALL[i % TaskKind::ALL.len()];
        ids.push(h.orchestrator.submit_task(spec(kind, TaskPriority::Normal)).unwrap());
        tokio::task::yield_now().await;
    }

    tokio::time::timeout(std::time::Duration::from_secs(10), async {
        while !h.orchestrator.is_idle() {
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("tasks did not finish");
    shutdown.cancel();
    handle.await.unwrap();
    h.orchestrator.drain().await;

    let received: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    for id in &ids {
        let position = |wanted: fn(&OrchestratorEvent) -> bool| {
            received
                .iter()
                .position(|e| e.task_id() == Some(*id) && wanted(e))
                .unwrap()
        };
        let submitted = position(|e| matches!(e, OrchestratorEvent::TaskSubmitted { .. }));
        let dispatched = position(|e| matches!(e, OrchestratorEvent::TaskDispatched { .. }));
        assert!(submitted < dispatched, "task {id} dispatched before it was announced");

        let submission_node = received
            .iter()
            .find_map(|e| match e {
                OrchestratorEvent::TaskSubmitted { task_id, memory_node, .. } if task_id == id => Some(*memory_node),
                _ => None,
            })
            .unwrap();
        let result_node = received
            .iter()
            .find_map(|e| match e {
                OrchestratorEvent::TaskCompleted { task_id, memory_node, .. } if task_id == id => Some(*memory_node),
                _ => None,
            })
            .unwrap();
        let edges = h.orchestrator.memory().edges_of(submission_node);
        assert!(edges.iter().any(|edge| edge.to == result_node), "result of {id} not linked");
    }
    assert_eq!(h.orchestrator.memory().stats().edges, TASKS);
}
