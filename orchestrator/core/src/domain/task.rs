// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Aggregate
//!
//! A unit of schedulable work with a priority, a resource request and a set
//! of dependencies on other tasks.
//!
//! ## Lifecycle
//! | From | To | Trigger |
//! |------|----|---------|
//! | `Pending` | `Running` | dispatched to a worker by the scheduler tick |
//! | `Pending` | `Cancelled` | `cancel_task` before dispatch |
//! | `Running` | `Completed` | executor returned a result |
//! | `Running` | `Failed` | executor returned an error or panicked |
//! | `Running` | `Cancelled` | executor observed its cancellation token |
//!
//! `Completed`, `Failed` and `Cancelled` are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::worker::WorkerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Analysis,
    Prediction,
    Optimization,
    Control,
    Learning,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Analysis,
        TaskKind::Prediction,
        TaskKind::Optimization,
        TaskKind::Control,
        TaskKind::Learning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Analysis => "analysis",
            TaskKind::Prediction => "prediction",
            TaskKind::Optimization => "optimization",
            TaskKind::Control => "control",
            TaskKind::Learning => "learning",
        }
    }
}

/// Declaration order gives the ranking: `Low < Normal < High < Critical`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

/// Resource shares a task asks a worker to set aside while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// CPU share in [0, 1]
    pub cpu: f64,
    /// Memory share in [0, 1]
    pub memory: f64,
    #[serde(default)]
    pub network: bool,
}

impl ResourceRequest {
    pub fn new(cpu: f64, memory: f64) -> Self {
        Self {
            cpu,
            memory,
            network: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        let share = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        share(self.cpu) && share(self.memory)
    }
}

/// What a caller submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub kind: TaskKind,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default)]
    pub resources: ResourceRequest,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
}

impl TaskSpec {
    pub fn new(kind: TaskKind, priority: TaskPriority) -> Self {
        Self {
            kind,
            priority,
            description: String::new(),
            input: serde_json::Value::Null,
            resources: ResourceRequest::default(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }

    pub fn with_resources(mut self, cpu: f64, memory: f64) -> Self {
        self.resources.cpu = cpu;
        self.resources.memory = memory;
        self
    }

    pub fn with_network(mut self) -> Self {
        self.resources.network = true;
        self
    }

    pub fn depends_on(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub description: String,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub resources: ResourceRequest,
    pub dependencies: Vec<TaskId>,
    pub assigned_workers: Vec<WorkerId>,
    pub progress: f64,
    pub error: Option<String>,
    /// Arrival order, the FIFO tiebreaker within a priority band.
    pub sequence: u64,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
}

impl Task {
    pub fn new(spec: TaskSpec, sequence: u64, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::new(),
            kind: spec.kind,
            priority: spec.priority,
            status: TaskStatus::Pending,
            description: spec.description,
            input: spec.input,
            output: None,
            resources: spec.resources,
            dependencies: spec.dependencies,
            assigned_workers: Vec::new(),
            progress: 0.0,
            error: None,
            sequence,
            submitted_at,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, allowed_from: &[TaskStatus], to: TaskStatus) -> Result<(), TaskError> {
        if !allowed_from.contains(&self.status) {
            return Err(TaskError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn start(&mut self, worker: WorkerId, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.transition(&[TaskStatus::Pending], TaskStatus::Running)?;
        self.assigned_workers = vec![worker];
        self.started_at = Some(now);
        Ok(())
    }

    pub fn complete(&mut self, output: serde_json::Value, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.transition(&[TaskStatus::Running], TaskStatus::Completed)?;
        self.output = Some(output);
        self.progress = 1.0;
        self.ended_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.transition(&[TaskStatus::Running], TaskStatus::Failed)?;
        self.error = Some(error.into());
        self.ended_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.transition(&[TaskStatus::Pending, TaskStatus::Running], TaskStatus::Cancelled)?;
        self.ended_at = Some(now);
        Ok(())
    }

    /// Wall-clock execution time, zero when the task never started or ended.
    pub fn elapsed_ms(&self) -> i64 {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0),
            _ => 0,
        }
    }
}
