// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Work Executor Port
//!
//! The orchestrator never performs task work itself. Each [`TaskKind`] is
//! bound to a [`WorkExecutor`] in an [`ExecutorRegistry`]; the scheduler hands
//! the executor an [`ExecutionContext`] and records whatever comes back.
//!
//! Cancellation is cooperative: executors should watch
//! [`ExecutionContext::cancellation`] and return [`ExecutionError::Cancelled`]
//! once it fires.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::task::{TaskId, TaskKind};
use crate::domain::worker::{WorkerId, WorkerKind};

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub input: Value,
    pub worker_id: WorkerId,
    pub worker_kind: WorkerKind,
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("{0}")]
    Failed(String),

    #[error("execution cancelled")]
    Cancelled,

    #[error("no executor registered for task kind '{0}'")]
    Unsupported(&'static str),
}

#[async_trait]
pub trait WorkExecutor: Send + Sync {
    async fn execute(&self, ctx: ExecutionContext) -> Result<Value, ExecutionError>;
}

/// Task kind to executor bindings.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<TaskKind, Arc<dyn WorkExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: TaskKind, executor: Arc<dyn WorkExecutor>) -> &mut Self {
        self.executors.insert(kind, executor);
        self
    }

    pub fn with(mut self, kind: TaskKind, executor: Arc<dyn WorkExecutor>) -> Self {
        self.register(kind, executor);
        self
    }

    /// Bind one executor to every task kind.
    pub fn uniform(executor: Arc<dyn WorkExecutor>) -> Self {
        let mut registry = Self::new();
        for kind in TaskKind::ALL {
            registry.register(kind, executor.clone());
        }
        registry
    }

    pub fn get(&self, kind: TaskKind) -> Option<Arc<dyn WorkExecutor>> {
        self.executors.get(&kind).cloned()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.executors.keys().map(TaskKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("ExecutorRegistry").field("kinds", &kinds).finish()
    }
}
