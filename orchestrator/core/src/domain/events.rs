// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use synapse_cortex::NodeId;

use crate::domain::decision::DecisionId;
use crate::domain::task::{TaskId, TaskKind, TaskPriority};
use crate::domain::worker::WorkerId;

/// Task lifecycle and decision events published by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    TaskSubmitted {
        task_id: TaskId,
        kind: TaskKind,
        priority: TaskPriority,
        memory_node: NodeId,
        submitted_at: DateTime<Utc>,
    },
    TaskDispatched {
        task_id: TaskId,
        worker_id: WorkerId,
        dispatched_at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: TaskId,
        worker_id: WorkerId,
        elapsed_ms: i64,
        memory_node: NodeId,
        completed_at: DateTime<Utc>,
    },
    TaskFailed {
        task_id: TaskId,
        worker_id: WorkerId,
        error: String,
        memory_node: NodeId,
        failed_at: DateTime<Utc>,
    },
    TaskCancelled {
        task_id: TaskId,
        cancelled_at: DateTime<Utc>,
    },
    TasksPurged {
        task_ids: Vec<TaskId>,
        purged_at: DateTime<Utc>,
    },
    DecisionMade {
        decision_id: DecisionId,
        selected: String,
        memory_node: NodeId,
        decided_at: DateTime<Utc>,
    },
}

impl OrchestratorEvent {
    /// Task the event concerns, if it concerns exactly one.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            OrchestratorEvent::TaskSubmitted { task_id, .. }
            | OrchestratorEvent::TaskDispatched { task_id, .. }
            | OrchestratorEvent::TaskCompleted { task_id, .. }
            | OrchestratorEvent::TaskFailed { task_id, .. }
            | OrchestratorEvent::TaskCancelled { task_id, .. } => Some(*task_id),
            OrchestratorEvent::TasksPurged { .. } | OrchestratorEvent::DecisionMade { .. } => None,
        }
    }
}
