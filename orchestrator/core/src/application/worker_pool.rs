// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Worker Pool
//!
//! Fixed registry of capability-tagged workers created once from the
//! configured archetypes. Matching ranks idle workers with enough resource
//! headroom by descending efficiency; reservations are handed out as
//! [`WorkerLease`]s so the consumption delta is returned exactly once.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Capability matching and resource accounting for dispatch

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::config::OrchestratorConfig;
use crate::domain::task::{ResourceRequest, Task, TaskId, TaskKind};
use crate::domain::worker::{Capability, Worker, WorkerArchetype, WorkerId, WorkerStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Unknown worker: {0}")]
    UnknownWorker(WorkerId),

    #[error("Worker {worker} is not eligible for task {task}")]
    NotEligible { worker: WorkerId, task: TaskId },

    #[error("Worker {0} is running a task")]
    WorkerBusy(WorkerId),

    #[error("Status {0:?} is managed by the scheduler and cannot be set directly")]
    ManagedStatus(WorkerStatus),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounts {
    pub total: usize,
    pub idle: usize,
    pub busy: usize,
    pub error: usize,
    pub offline: usize,
}

struct PoolState {
    workers: Vec<Worker>,
    requirements: BTreeMap<TaskKind, Capability>,
    expected_task_time_ms: u64,
    speed_bonus_cap: f64,
}

impl PoolState {
    fn worker_mut(&mut self, id: WorkerId) -> Result<&mut Worker, PoolError> {
        self.workers
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(PoolError::UnknownWorker(id))
    }

    fn is_eligible(&self, worker: &Worker, task: &Task) -> bool {
        if !worker.is_idle() || !worker.budget.fits(&task.resources) {
            return false;
        }
        match self.requirements.get(&task.kind) {
            Some(capability) => worker.capabilities.contains(*capability),
            None => true,
        }
    }
}

/// Shared handle to the worker registry.
#[derive(Clone)]
pub struct WorkerPool {
    state: Arc<Mutex<PoolState>>,
}

impl WorkerPool {
    pub fn new(
        archetypes: &[WorkerArchetype],
        requirements: BTreeMap<TaskKind, Capability>,
        expected_task_time_ms: u64,
        speed_bonus_cap: f64,
    ) -> Self {
        let workers = archetypes
            .iter()
            .flat_map(|archetype| (0..archetype.replicas).map(move |_| Worker::from_archetype(archetype)))
            .collect();

        Self {
            state: Arc::new(Mutex::new(PoolState {
                workers,
                requirements,
                expected_task_time_ms,
                speed_bonus_cap,
            })),
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(
            &config.workers,
            config.capability_requirements.clone(),
            config.expected_task_time_ms,
            config.speed_bonus_cap,
        )
    }

    /// Idle workers able to take `task` right now, best efficiency first.
    /// Equal efficiencies keep registry order.
    pub fn find_eligible(&self, task: &Task) -> Vec<Worker> {
        let state = self.state.lock();
        let mut candidates: Vec<Worker> = state
            .workers
            .iter()
            .filter(|w| state.is_eligible(w, task))
            .cloned()
            .collect();

        candidates.sort_by(|a, b| b.performance.efficiency.total_cmp(&a.performance.efficiency));
        candidates
    }

    /// Mark `worker_id` busy with `task` and set its resources aside.
    pub fn reserve(&self, worker_id: WorkerId, task: &Task) -> Result<WorkerLease, PoolError> {
        let mut state = self.state.lock();

        let eligible = {
            let worker = state
                .workers
                .iter()
                .find(|w| w.id == worker_id)
                .ok_or(PoolError::UnknownWorker(worker_id))?;
            state.is_eligible(worker, task)
        };
        if !eligible {
            return Err(PoolError::NotEligible {
                worker: worker_id,
                task: task.id,
            });
        }

        let worker = state.worker_mut(worker_id)?;
        worker.budget.consume(&task.resources);
        worker.status = WorkerStatus::Busy;
        worker.current_task = Some(task.id);

        debug!(
            worker_id = %worker_id,
            task_id = %task.id,
            cpu = worker.budget.current_cpu,
            memory = worker.budget.current_memory,
            "Worker reserved"
        );

        Ok(WorkerLease {
            pool: self.clone(),
            worker_id,
            task_id: task.id,
            request: task.resources,
            released: false,
        })
    }

    fn release_reservation(&self, worker_id: WorkerId, task_id: TaskId, request: &ResourceRequest) {
        let mut state = self.state.lock();
        let Ok(worker) = state.worker_mut(worker_id) else {
            warn!(worker_id = %worker_id, "Release for unknown worker ignored");
            return;
        };

        worker.budget.restore(request);
        if worker.current_task == Some(task_id) {
            worker.current_task = None;
        }
        // Operator-set error/offline survives the release
        if worker.status == WorkerStatus::Busy {
            worker.status = WorkerStatus::Idle;
        }

        debug!(worker_id = %worker_id, task_id = %task_id, "Worker released");
    }

    /// Fold a finished task into the worker's performance profile.
    pub fn record_performance(&self, worker_id: WorkerId, success: bool, elapsed_ms: i64) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        let expected = state.expected_task_time_ms;
        let cap = state.speed_bonus_cap;
        let worker = state.worker_mut(worker_id)?;
        worker.performance.record(success, elapsed_ms, expected, cap);
        Ok(())
    }

    /// Take a worker out of rotation or bring it back. `Busy` is owned by
    /// reservations; an occupied worker cannot be forced back to `Idle`.
    pub fn set_status(&self, worker_id: WorkerId, status: WorkerStatus) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        let worker = state.worker_mut(worker_id)?;

        match status {
            WorkerStatus::Busy => return Err(PoolError::ManagedStatus(status)),
            WorkerStatus::Idle if worker.current_task.is_some() => {
                return Err(PoolError::WorkerBusy(worker_id))
            }
            _ => {}
        }

        worker.status = status;
        Ok(())
    }

    pub fn get(&self, worker_id: WorkerId) -> Option<Worker> {
        self.state.lock().workers.iter().find(|w| w.id == worker_id).cloned()
    }

    pub fn workers(&self) -> Vec<Worker> {
        self.state.lock().workers.clone()
    }

    pub fn counts(&self) -> WorkerCounts {
        let state = self.state.lock();
        let mut counts = WorkerCounts {
            total: state.workers.len(),
            ..Default::default()
        };
        for worker in &state.workers {
            match worker.status {
                WorkerStatus::Idle => counts.idle += 1,
                WorkerStatus::Busy => counts.busy += 1,
                WorkerStatus::Error => counts.error += 1,
                WorkerStatus::Offline => counts.offline += 1,
            }
        }
        counts
    }
}

/// Reservation of one worker for one task. Returns the reserved resources
/// when released or dropped, whichever happens first.
pub struct WorkerLease {
    pool: WorkerPool,
    worker_id: WorkerId,
    task_id: TaskId,
    request: ResourceRequest,
    released: bool,
}

impl WorkerLease {
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.pool.release_reservation(self.worker_id, self.task_id, &self.request);
        }
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                worker_id = %self.worker_id,
                task_id = %self.task_id,
                "Worker lease dropped without explicit release"
            );
            self.release_once();
        }
    }
}

impl std::fmt::Debug for WorkerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLease")
            .field("worker_id", &self.worker_id)
            .field("task_id", &self.task_id)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::{TaskPriority, TaskSpec};
    use crate::domain::worker::WorkerKind;
    use chrono::Utc;

    fn task(kind: TaskKind, cpu: f64, memory: f64) -> Task {
        Task::new(
            TaskSpec::new(kind, TaskPriority::Normal).with_resources(cpu, memory),
            0,
            Utc::now(),
        )
    }

    fn default_pool() -> WorkerPool {
        WorkerPool::from_config(&OrchestratorConfig::default())
    }

    #[test]
    fn test_capability_gates_eligibility() {
        let pool = default_pool();

        let candidates = pool.find_eligible(&task(TaskKind::Prediction, 0.1, 0.1));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind, WorkerKind::Predictor);
    }

    #[test]
    fn test_budget_gates_eligibility() {
        let pool = default_pool();
        // Analyzer ceiling is 0.3 CPU
        assert!(pool.find_eligible(&task(TaskKind::Analysis, 0.31, 0.1)).is_empty());
        assert_eq!(pool.find_eligible(&task(TaskKind::Analysis, 0.3, 0.2)).len(), 1);
    }

    #[test]
    fn test_unmapped_kind_matches_any_worker_with_headroom() {
        let pool = WorkerPool::new(&WorkerArchetype::defaults(), BTreeMap::new(), 5000, 2.0);
        let candidates = pool.find_eligible(&task(TaskKind::Learning, 0.2, 0.2));
        // Controller (0.1/0.1) lacks headroom
        assert_eq!(candidates.len(), 4);
        assert!(candidates.iter().all(|w| w.kind != WorkerKind::Controller));
    }

    #[test]
    fn test_candidates_ranked_by_efficiency() {
        let archetype = WorkerArchetype::new(WorkerKind::Analyzer, [Capability::DataAnalysis], 1.0, 1.0);
        let pool = WorkerPool::new(
            &[WorkerArchetype { replicas: 3, ..archetype }],
            BTreeMap::from([(TaskKind::Analysis, Capability::DataAnalysis)]),
            5000,
            2.0,
        );
        let ids: Vec<_> = pool.workers().iter().map(|w| w.id).collect();

        pool.record_performance(ids[0], true, 10_000).unwrap();
        pool.record_performance(ids[2], true, 1_000).unwrap();

        let ranked: Vec<_> = pool
            .find_eligible(&task(TaskKind::Analysis, 0.1, 0.1))
            .iter()
            .map(|w| w.id)
            .collect();
        // 2.0 (capped), 1.0 (untouched), 0.5
        assert_eq!(ranked, vec![ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn test_reserve_and_release_restore_budget() {
        let pool = default_pool();
        let t = task(TaskKind::Optimization, 0.2, 0.15);
        let worker_id = pool.find_eligible(&t)[0].id;

        let lease = pool.reserve(worker_id, &t).unwrap();
        let busy = pool.get(worker_id).unwrap();
        assert_eq!(busy.status, WorkerStatus::Busy);
        assert_eq!(busy.current_task, Some(t.id));
        assert_eq!(busy.budget.current_cpu, 0.2);
        assert!(pool.find_eligible(&t).is_empty());

        lease.release();
        let idle = pool.get(worker_id).unwrap();
        assert_eq!(idle.status, WorkerStatus::Idle);
        assert_eq!(idle.current_task, None);
        assert_eq!(idle.budget.current_cpu, 0.0);
        assert_eq!(idle.budget.current_memory, 0.0);
    }

    #[test]
    fn test_dropped_lease_releases() {
        let pool = default_pool();
        let t = task(TaskKind::Control, 0.1, 0.1);
        let worker_id = pool.find_eligible(&t)[0].id;

        {
            let _lease = pool.reserve(worker_id, &t).unwrap();
            assert_eq!(pool.counts().busy, 1);
        }

        assert_eq!(pool.counts().busy, 0);
        assert_eq!(pool.get(worker_id).unwrap().budget.current_cpu, 0.0);
    }

    #[test]
    fn test_reserve_rejects_busy_worker() {
        let pool = default_pool();
        let first = task(TaskKind::Control, 0.05, 0.05);
        let second = task(TaskKind::Control, 0.05, 0.05);
        let worker_id = pool.find_eligible(&first)[0].id;

        let _lease = pool.reserve(worker_id, &first).unwrap();
        assert_eq!(
            pool.reserve(worker_id, &second).unwrap_err(),
            PoolError::NotEligible {
                worker: worker_id,
                task: second.id
            }
        );
    }

    #[test]
    fn test_offline_worker_is_never_eligible_and_stays_offline() {
        let pool = default_pool();
        let t = task(TaskKind::Learning, 0.1, 0.1);
        let worker_id = pool.find_eligible(&t)[0].id;

        let lease = pool.reserve(worker_id, &t).unwrap();
        pool.set_status(worker_id, WorkerStatus::Offline).unwrap();
        lease.release();

        assert_eq!(pool.get(worker_id).unwrap().status, WorkerStatus::Offline);
        assert!(pool.find_eligible(&t).is_empty());

        pool.set_status(worker_id, WorkerStatus::Idle).unwrap();
        assert_eq!(pool.find_eligible(&t).len(), 1);
    }

    #[test]
    fn test_set_status_guards_managed_states() {
        let pool = default_pool();
        let t = task(TaskKind::Learning, 0.1, 0.1);
        let worker_id = pool.find_eligible(&t)[0].id;

        assert_eq!(
            pool.set_status(worker_id, WorkerStatus::Busy).unwrap_err(),
            PoolError::ManagedStatus(WorkerStatus::Busy)
        );

        let _lease = pool.reserve(worker_id, &t).unwrap();
        assert_eq!(
            pool.set_status(worker_id, WorkerStatus::Idle).unwrap_err(),
            PoolError::WorkerBusy(worker_id)
        );
        assert!(matches!(
            pool.set_status(WorkerId::new(), WorkerStatus::Offline),
            Err(PoolError::UnknownWorker(_))
        ));
    }

    #[test]
    fn test_counts() {
        let pool = default_pool();
        let ids: Vec<_> = pool.workers().iter().map(|w| w.id).collect();
        pool.set_status(ids[0], WorkerStatus::Error).unwrap();
        pool.set_status(ids[1], WorkerStatus::Offline).unwrap();

        assert_eq!(
            pool.counts(),
            WorkerCounts {
                total: 5,
                idle: 3,
                busy: 0,
                error: 1,
                offline: 1
            }
        );
    }
}
