// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Task Orchestrator
//!
//! Owns the pending queue and the active-task table. Each scheduler tick:
//!
//! 1. refreshes the progress estimate of running tasks
//! 2. orders the queue by priority, then arrival
//! 3. dispatches every task whose dependencies completed and for which the
//!    [`WorkerPool`] has an eligible worker
//! 4. purges terminal tasks older than the retention window
//!
//! All of this runs under one lock, so two ticks never interleave on the same
//! task or worker. Executions run on the tokio runtime and report back through
//! [`TaskOrchestrator::finish`], which takes the same lock.
//!
//! Every submission, completion and failure is also written to the
//! [`MemoryGraph`] as an `experience` node.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Dependency-aware, capability-matched dispatch

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use synapse_cortex::{Clock, GraphStats, MemoryGraph, NewNode, NodeId, NodeKind, RelationKind};
use thiserror::Error;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::application::worker_pool::{PoolError, WorkerCounts, WorkerLease, WorkerPool};
use crate::domain::config::OrchestratorConfig;
use crate::domain::events::OrchestratorEvent;
use crate::domain::executor::{ExecutionContext, ExecutionError, ExecutorRegistry, WorkExecutor};
use crate::domain::task::{Task, TaskError, TaskId, TaskSpec, TaskStatus};
use crate::domain::worker::{Worker, WorkerId, WorkerStatus};
use crate::infrastructure::event_bus::EventBus;

pub(crate) const ORCHESTRATOR_ORIGIN: &str = "orchestrator";

const SUBMISSION_CONFIDENCE: f64 = 0.8;
const SUBMISSION_IMPORTANCE: f64 = 0.5;
const SUCCESS_CONFIDENCE: f64 = 0.9;
const SUCCESS_IMPORTANCE: f64 = 0.7;
const FAILURE_CONFIDENCE: f64 = 0.6;
// Failures outrank successes so they surface first in later searches
const FAILURE_IMPORTANCE: f64 = 0.8;

const PROGRESS_CEILING: f64 = 0.9;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid task submission: {0}")]
    InvalidSubmission(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Tasks by state. `retired` counts tasks already purged from the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub retired: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub tasks: TaskCounts,
    pub workers: WorkerCounts,
    pub memory: GraphStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub dispatched: Vec<(TaskId, WorkerId)>,
    pub still_pending: usize,
    pub purged: Vec<TaskId>,
}

struct OrchestratorState {
    tasks: HashMap<TaskId, Task>,
    queue: Vec<TaskId>,
    cancellations: HashMap<TaskId, CancellationToken>,
    submission_nodes: HashMap<TaskId, NodeId>,
    /// Final status of tasks purged from the table
    retired: HashMap<TaskId, TaskStatus>,
    next_sequence: u64,
}

impl OrchestratorState {
    fn knows(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id) || self.retired.contains_key(id)
    }

    fn is_completed(&self, id: &TaskId) -> bool {
        match self.tasks.get(id) {
            Some(task) => task.status == TaskStatus::Completed,
            None => self.retired.get(id) == Some(&TaskStatus::Completed),
        }
    }

    fn dependencies_met(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|dep| self.is_completed(dep))
    }
}

struct Launch {
    ctx: ExecutionContext,
    lease: WorkerLease,
    executor: Option<Arc<dyn WorkExecutor>>,
}

pub struct TaskOrchestrator {
    config: OrchestratorConfig,
    memory: Arc<MemoryGraph>,
    clock: Arc<dyn Clock>,
    pool: WorkerPool,
    executors: ExecutorRegistry,
    event_bus: EventBus,
    state: Mutex<OrchestratorState>,
    tracker: TaskTracker,
    shutdown_token: CancellationToken,
}

impl TaskOrchestrator {
    /// Workers come from `config.workers`; time comes from the memory graph's clock.
    pub fn new(config: OrchestratorConfig, memory: Arc<MemoryGraph>, executors: ExecutorRegistry) -> Arc<Self> {
        let event_bus = EventBus::new(config.event_bus_capacity);
        Self::with_event_bus(config, memory, executors, event_bus)
    }

    pub fn with_event_bus(
        config: OrchestratorConfig,
        memory: Arc<MemoryGraph>,
        executors: ExecutorRegistry,
        event_bus: EventBus,
    ) -> Arc<Self> {
        let pool = WorkerPool::from_config(&config);
        let clock = memory.clock();

        info!(
            workers = pool.counts().total,
            tick_interval_ms = config.tick_interval_ms,
            retention_secs = config.retention_secs,
            "Task orchestrator initialized"
        );

        Arc::new(Self {
            config,
            memory,
            clock,
            pool,
            executors,
            event_bus,
            state: Mutex::new(OrchestratorState {
                tasks: HashMap::new(),
                queue: Vec::new(),
                cancellations: HashMap::new(),
                submission_nodes: HashMap::new(),
                retired: HashMap::new(),
                next_sequence: 0,
            }),
            tracker: TaskTracker::new(),
            shutdown_token: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn memory(&self) -> &Arc<MemoryGraph> {
        &self.memory
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn event_bus(&self) -> EventBus {
        self.event_bus.clone()
    }

    /// Enqueue a task in `pending`. Resource shares must lie in [0, 1] and
    /// every dependency must name a task this orchestrator has seen.
    pub fn submit_task(&self, spec: TaskSpec) -> Result<TaskId, OrchestratorError> {
        if !spec.resources.is_valid() {
            return Err(OrchestratorError::InvalidSubmission(format!(
                "resource shares must be within [0, 1], got cpu={} memory={}",
                spec.resources.cpu, spec.resources.memory
            )));
        }

        let now = self.clock.now();

        // The task, its submission node and the submitted event all land under
        // one lock so a concurrent tick only ever sees a fully recorded task.
        let mut state = self.state.lock();
        if let Some(unknown) = spec.dependencies.iter().find(|dep| !state.knows(dep)) {
            return Err(OrchestratorError::InvalidSubmission(format!(
                "unknown dependency {unknown}"
            )));
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let task = Task::new(spec, sequence, now);

        let memory_node = self.memory.add_node(
            NewNode::new(
                NodeKind::Experience,
                json!({
                    "event": "task_submitted",
                    "task_id": task.id,
                    "kind": task.kind,
                    "priority": task.priority,
                    "description": task.description,
                    "dependencies": task.dependencies,
                }),
                SUBMISSION_CONFIDENCE,
                ORCHESTRATOR_ORIGIN,
            )
            .with_tags(["task", task.kind.as_str(), task.priority.as_str()])
            .with_importance(SUBMISSION_IMPORTANCE),
        );

        let (task_id, kind, priority) = (task.id, task.kind, task.priority);
        state.submission_nodes.insert(task_id, memory_node);
        state.queue.push(task_id);
        state.tasks.insert(task_id, task);

        self.event_bus.publish(OrchestratorEvent::TaskSubmitted {
            task_id,
            kind,
            priority,
            memory_node,
            submitted_at: now,
        });
        drop(state);

        info!(
            task_id = %task_id,
            kind = kind.as_str(),
            priority = priority.as_str(),
            sequence,
            "Task submitted"
        );
        metrics::counter!("synapse_tasks_submitted_total", "kind" => kind.as_str()).increment(1);

        Ok(task_id)
    }

    /// Run one scheduling pass. Must be called from within a tokio runtime;
    /// dispatched executions are spawned onto it.
    pub fn tick(self: &Arc<Self>) -> TickReport {
        let now = self.clock.now();
        let mut launches = Vec::new();
        let mut report = TickReport::default();

        {
            let mut state = self.state.lock();
            self.refresh_progress(&mut state, now);

            let OrchestratorState { tasks, queue, .. } = &mut *state;
            queue.sort_by_key(|id| {
                tasks
                    .get(id)
                    .map(|t| (Reverse(t.priority), t.sequence))
                    .unwrap_or((Reverse(Default::default()), u64::MAX))
            });

            let queue = std::mem::take(&mut state.queue);
            let mut remaining = Vec::with_capacity(queue.len());

            for task_id in queue {
                match self.try_dispatch(&mut state, task_id, now) {
                    Some(launch) => {
                        report.dispatched.push((task_id, launch.lease.worker_id()));
                        launches.push(launch);
                    }
                    None => remaining.push(task_id),
                }
            }

            report.still_pending = remaining.len();
            state.queue = remaining;
            report.purged = self.purge_expired(&mut state, now);
        }

        for launch in launches {
            let worker_id = launch.lease.worker_id();
            let task_id = launch.ctx.task_id;
            self.launch(launch);
            self.event_bus.publish(OrchestratorEvent::TaskDispatched {
                task_id,
                worker_id,
                dispatched_at: now,
            });
        }

        if !report.purged.is_empty() {
            self.event_bus.publish(OrchestratorEvent::TasksPurged {
                task_ids: report.purged.clone(),
                purged_at: now,
            });
        }

        debug!(
            dispatched = report.dispatched.len(),
            pending = report.still_pending,
            purged = report.purged.len(),
            "Scheduler tick completed"
        );
        report
    }

    fn refresh_progress(&self, state: &mut OrchestratorState, now: DateTime<Utc>) {
        let horizon = self.config.progress_horizon_ms.max(1) as f64;
        for task in state.tasks.values_mut().filter(|t| t.status == TaskStatus::Running) {
            if let Some(started) = task.started_at {
                let elapsed = (now - started).num_milliseconds().max(0) as f64;
                task.progress = (elapsed / horizon).min(PROGRESS_CEILING);
            }
        }
    }

    fn try_dispatch(&self, state: &mut OrchestratorState, task_id: TaskId, now: DateTime<Utc>) -> Option<Launch> {
        let task = state.tasks.get(&task_id)?;
        if task.status != TaskStatus::Pending {
            return None;
        }
        if !state.dependencies_met(task) {
            return None;
        }

        // No eligible worker is backpressure, not an error; retry next tick
        let candidate = self.pool.find_eligible(task).into_iter().next()?;
        let lease = match self.pool.reserve(candidate.id, task) {
            Ok(lease) => lease,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Reservation failed, task stays pending");
                return None;
            }
        };

        let task = state.tasks.get_mut(&task_id)?;
        if let Err(e) = task.start(candidate.id, now) {
            warn!(task_id = %task_id, error = %e, "Task could not be started");
            lease.release();
            return None;
        }

        let cancellation = CancellationToken::new();
        state.cancellations.insert(task_id, cancellation.clone());

        info!(
            task_id = %task_id,
            worker_id = %candidate.id,
            worker_kind = candidate.kind.as_str(),
            "Task dispatched"
        );

        Some(Launch {
            ctx: ExecutionContext {
                task_id,
                kind: task.kind,
                input: task.input.clone(),
                worker_id: candidate.id,
                worker_kind: candidate.kind,
                cancellation,
            },
            lease,
            executor: self.executors.get(task.kind),
        })
    }

    fn purge_expired(&self, state: &mut OrchestratorState, now: DateTime<Utc>) -> Vec<TaskId> {
        let retention = self.config.retention();
        let expired: Vec<TaskId> = state
            .tasks
            .values()
            .filter(|t| t.is_terminal())
            .filter(|t| t.ended_at.is_some_and(|ended| now - ended > retention))
            .map(|t| t.id)
            .collect();

        for id in &expired {
            if let Some(task) = state.tasks.remove(id) {
                state.retired.insert(*id, task.status);
            }
            state.submission_nodes.remove(id);
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Purged tasks past the retention window");
        }
        expired
    }

    fn launch(self: &Arc<Self>, launch: Launch) {
        let Launch { ctx, lease, executor } = launch;
        let task_id = ctx.task_id;
        let kind = ctx.kind;

        let work = tokio::spawn(async move {
            match executor {
                Some(executor) => executor.execute(ctx).await,
                None => Err(ExecutionError::Unsupported(kind.as_str())),
            }
        });

        let orchestrator = Arc::clone(self);
        self.tracker.spawn(async move {
            let outcome = match work.await {
                Ok(result) => result,
                Err(join_error) if join_error.is_panic() => {
                    Err(ExecutionError::Failed(panic_message(join_error.into_panic())))
                }
                Err(_) => Err(ExecutionError::Cancelled),
            };
            orchestrator.finish(task_id, lease, outcome);
        });
    }

    /// Record an execution outcome and give the worker back.
    fn finish(&self, task_id: TaskId, lease: WorkerLease, outcome: Result<serde_json::Value, ExecutionError>) {
        let now = self.clock.now();
        let worker_id = lease.worker_id();

        let (task, submission_node) = {
            let mut state = self.state.lock();
            state.cancellations.remove(&task_id);
            let submission_node = state.submission_nodes.get(&task_id).copied();

            let Some(task) = state.tasks.get_mut(&task_id) else {
                warn!(task_id = %task_id, "Execution finished for unknown task");
                lease.release();
                return;
            };

            let transition = match &outcome {
                Ok(output) => task.complete(output.clone(), now),
                Err(ExecutionError::Cancelled) => task.cancel(now),
                Err(e) => task.fail(e.to_string(), now),
            };
            if let Err(e) = transition {
                warn!(task_id = %task_id, error = %e, "Ignoring execution outcome");
            } else if task.status != TaskStatus::Cancelled {
                let success = task.status == TaskStatus::Completed;
                if let Err(e) = self.pool.record_performance(worker_id, success, task.elapsed_ms()) {
                    warn!(worker_id = %worker_id, error = %e, "Performance not recorded");
                }
            }

            lease.release();
            (task.clone(), submission_node)
        };

        match task.status {
            TaskStatus::Completed => {
                let memory_node = self.record_result(&task, worker_id, submission_node);
                info!(task_id = %task.id, worker_id = %worker_id, elapsed_ms = task.elapsed_ms(), "Task completed");
                metrics::counter!("synapse_tasks_completed_total", "kind" => task.kind.as_str()).increment(1);
                self.event_bus.publish(OrchestratorEvent::TaskCompleted {
                    task_id: task.id,
                    worker_id,
                    elapsed_ms: task.elapsed_ms(),
                    memory_node,
                    completed_at: now,
                });
            }
            TaskStatus::Failed => {
                let memory_node = self.record_result(&task, worker_id, submission_node);
                let error = task.error.clone().unwrap_or_default();
                warn!(task_id = %task.id, worker_id = %worker_id, error = %error, "Task failed");
                metrics::counter!("synapse_tasks_failed_total", "kind" => task.kind.as_str()).increment(1);
                self.event_bus.publish(OrchestratorEvent::TaskFailed {
                    task_id: task.id,
                    worker_id,
                    error,
                    memory_node,
                    failed_at: now,
                });
            }
            TaskStatus::Cancelled => {
                info!(task_id = %task.id, worker_id = %worker_id, "Running task cancelled");
                self.cancelled(&task, now);
            }
            TaskStatus::Pending | TaskStatus::Running => {}
        }
    }

    /// Write the outcome node, linked from the submission node when known.
    fn record_result(&self, task: &Task, worker_id: WorkerId, submission_node: Option<NodeId>) -> NodeId {
        let (payload, confidence, importance, outcome_tag) = match task.status {
            TaskStatus::Completed => (
                json!({
                    "event": "task_completed",
                    "task_id": task.id,
                    "kind": task.kind,
                    "output": task.output,
                    "elapsed_ms": task.elapsed_ms(),
                }),
                SUCCESS_CONFIDENCE,
                SUCCESS_IMPORTANCE,
                "completed",
            ),
            _ => (
                json!({
                    "event": "task_failed",
                    "task_id": task.id,
                    "kind": task.kind,
                    "error": task.error,
                    "elapsed_ms": task.elapsed_ms(),
                }),
                FAILURE_CONFIDENCE,
                FAILURE_IMPORTANCE,
                "failed",
            ),
        };

        let node = self.memory.add_node(
            NewNode::new(NodeKind::Experience, payload, confidence, worker_id.to_string())
                .with_tags(["result", task.kind.as_str(), outcome_tag])
                .with_importance(importance),
        );

        if let Some(submission) = submission_node {
            if let Err(e) = self.memory.add_edge(submission, node, RelationKind::Causal, 1.0, true) {
                warn!(task_id = %task.id, error = %e, "Could not link result to submission");
            }
        }
        node
    }

    fn cancelled(&self, task: &Task, now: DateTime<Utc>) {
        metrics::counter!("synapse_tasks_cancelled_total", "kind" => task.kind.as_str()).increment(1);
        self.event_bus.publish(OrchestratorEvent::TaskCancelled {
            task_id: task.id,
            cancelled_at: now,
        });
    }

    /// Cancel a task. A pending task is cancelled immediately; a running task
    /// has its cancellation token triggered and keeps `Running` until its
    /// executor returns. Returns the status after the call.
    pub fn cancel_task(&self, task_id: TaskId) -> Result<TaskStatus, OrchestratorError> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let status = state
            .tasks
            .get(&task_id)
            .map(|t| t.status)
            .ok_or(OrchestratorError::TaskNotFound(task_id))?;

        match status {
            TaskStatus::Pending => {
                state.queue.retain(|id| *id != task_id);
                let task = state
                    .tasks
                    .get_mut(&task_id)
                    .ok_or(OrchestratorError::TaskNotFound(task_id))?;
                task.cancel(now)?;
                let task = task.clone();
                drop(state);

                info!(task_id = %task_id, "Pending task cancelled");
                self.cancelled(&task, now);
                Ok(TaskStatus::Cancelled)
            }
            TaskStatus::Running => {
                if let Some(token) = state.cancellations.get(&task_id) {
                    token.cancel();
                }
                info!(task_id = %task_id, "Cancellation requested for running task");
                Ok(TaskStatus::Running)
            }
            terminal => Err(TaskError::InvalidTransition {
                id: task_id,
                from: terminal,
                to: TaskStatus::Cancelled,
            }
            .into()),
        }
    }

    pub fn get_task(&self, task_id: TaskId) -> Option<Task> {
        self.state.lock().tasks.get(&task_id).cloned()
    }

    /// Tasks still in the table, in submission order.
    pub fn list_tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.state.lock().tasks.values().cloned().collect();
        tasks.sort_by_key(|t| t.sequence);
        tasks
    }

    pub fn workers(&self) -> Vec<Worker> {
        self.pool.workers()
    }

    pub fn set_worker_status(&self, worker_id: WorkerId, status: WorkerStatus) -> Result<(), OrchestratorError> {
        Ok(self.pool.set_status(worker_id, status)?)
    }

    pub fn status(&self) -> OrchestratorStatus {
        let tasks = {
            let state = self.state.lock();
            let mut counts = TaskCounts {
                retired: state.retired.len(),
                ..Default::default()
            };
            for task in state.tasks.values() {
                match task.status {
                    TaskStatus::Pending => counts.pending += 1,
                    TaskStatus::Running => counts.running += 1,
                    TaskStatus::Completed => counts.completed += 1,
                    TaskStatus::Failed => counts.failed += 1,
                    TaskStatus::Cancelled => counts.cancelled += 1,
                }
            }
            counts
        };

        OrchestratorStatus {
            tasks,
            workers: self.pool.counts(),
            memory: self.memory.stats(),
        }
    }

    /// No task is pending or running.
    pub fn is_idle(&self) -> bool {
        self.state.lock().tasks.values().all(Task::is_terminal)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Spawn the periodic scheduler loop. Stops when the shutdown token fires;
    /// in-flight executions keep running until [`drain`](Self::drain).
    pub fn run(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_ms = self.config.tick_interval_ms, "Starting scheduler loop");
            let mut ticker = interval(self.config.tick_interval());

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick();
                    }
                    _ = self.shutdown_token.cancelled() => {
                        info!("Shutdown signal received, stopping scheduler loop");
                        break;
                    }
                }
            }
        })
    }

    /// Wait for every in-flight execution to report back.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("executor panicked: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::{TaskKind, TaskPriority};
    use crate::infrastructure::executors::builtin_registry;
    use std::time::Duration;

    fn orchestrator() -> Arc<TaskOrchestrator> {
        TaskOrchestrator::new(
            OrchestratorConfig::default(),
            Arc::new(MemoryGraph::new()),
            builtin_registry(Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_invalid_resources_rejected() {
        let orchestrator = orchestrator();
        let spec = TaskSpec::new(TaskKind::Analysis, TaskPriority::Normal).with_resources(1.5, 0.1);

        assert!(matches!(
            orchestrator.submit_task(spec),
            Err(OrchestratorError::InvalidSubmission(_))
        ));
        assert!(orchestrator.list_tasks().is_empty());
        assert!(orchestrator.memory().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_dependency_rejected() {
        let orchestrator = orchestrator();
        let spec = TaskSpec::new(TaskKind::Analysis, TaskPriority::Normal).depends_on([TaskId::new()]);

        assert!(matches!(
            orchestrator.submit_task(spec),
            Err(OrchestratorError::InvalidSubmission(_))
        ));
    }

    #[tokio::test]
    async fn test_queue_ordered_by_priority_then_arrival() {
        let orchestrator = orchestrator();
        // Only the controller takes control tasks, so one dispatch per tick
        let spec = |p| TaskSpec::new(TaskKind::Control, p).with_resources(0.1, 0.1);

        let low = orchestrator.submit_task(spec(TaskPriority::Low)).unwrap();
        let high_a = orchestrator.submit_task(spec(TaskPriority::High)).unwrap();
        let high_b = orchestrator.submit_task(spec(TaskPriority::High)).unwrap();
        let critical = orchestrator.submit_task(spec(TaskPriority::Critical)).unwrap();

        let mut order = Vec::new();
        for _ in 0..4 {
            let report = orchestrator.tick();
            assert_eq!(report.dispatched.len(), 1);
            order.push(report.dispatched[0].0);
            orchestrator.drain().await;
        }

        assert_eq!(order, vec![critical, high_a, high_b, low]);
    }

    #[tokio::test]
    async fn test_submission_writes_experience_node() {
        let orchestrator = orchestrator();
        orchestrator
            .submit_task(TaskSpec::new(TaskKind::Learning, TaskPriority::High))
            .unwrap();

        let nodes = orchestrator.memory().recent_nodes(10);
        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert_eq!(node.kind, NodeKind::Experience);
        assert_eq!(node.origin, ORCHESTRATOR_ORIGIN);
        assert_eq!(node.confidence, SUBMISSION_CONFIDENCE);
        assert_eq!(node.importance, SUBMISSION_IMPORTANCE);
        for tag in ["task", "learning", "high"] {
            assert!(node.tags.contains(tag));
        }
    }

    #[tokio::test]
    async fn test_completion_links_result_to_submission() {
        let orchestrator = orchestrator();
        orchestrator
            .submit_task(TaskSpec::new(TaskKind::Analysis, TaskPriority::Normal).with_resources(0.1, 0.1))
            .unwrap();

        orchestrator.tick();
        orchestrator.drain().await;

        let stats = orchestrator.memory().stats();
        assert_eq!(stats.nodes, 2);
        assert_eq!(stats.edges, 1);
    }

    #[tokio::test]
    async fn test_cancel_pending_task() {
        let orchestrator = orchestrator();
        let id = orchestrator
            .submit_task(TaskSpec::new(TaskKind::Control, TaskPriority::Normal))
            .unwrap();

        assert_eq!(orchestrator.cancel_task(id).unwrap(), TaskStatus::Cancelled);
        assert!(orchestrator.tick().dispatched.is_empty());
        assert_eq!(orchestrator.get_task(id).unwrap().status, TaskStatus::Cancelled);

        // Terminal tasks cannot be cancelled again
        assert!(matches!(
            orchestrator.cancel_task(id),
            Err(OrchestratorError::Task(TaskError::InvalidTransition { .. }))
        ));
        assert!(matches!(
            orchestrator.cancel_task(TaskId::new()),
            Err(OrchestratorError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("boom")), "executor panicked: boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "executor panicked: bang");
        assert_eq!(panic_message(Box::new(7_u8)), "executor panicked: unknown panic payload");
    }
}
