// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod decision_engine;
pub mod orchestrator;
pub mod worker_pool;

pub use decision_engine::DecisionEngine;
pub use orchestrator::{OrchestratorError, OrchestratorStatus, TaskCounts, TaskOrchestrator, TickReport};
pub use worker_pool::{PoolError, WorkerCounts, WorkerLease, WorkerPool};
