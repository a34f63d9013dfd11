// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Task, worker and decision types plus the ports the application layer
//! drives (`WorkExecutor`, `ScoringStrategy`).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and invariants, no runtime dependencies

pub mod config;
pub mod decision;
pub mod events;
pub mod executor;
pub mod task;
pub mod worker;

pub use config::{ConfigError, OrchestratorConfig};
pub use decision::{Decision, DecisionError, DecisionId, DecisionOption, OptionScore, ScoredOption, ScoringStrategy};
pub use events::OrchestratorEvent;
pub use executor::{ExecutionContext, ExecutionError, ExecutorRegistry, WorkExecutor};
pub use task::{ResourceRequest, Task, TaskError, TaskId, TaskKind, TaskPriority, TaskSpec, TaskStatus};
pub use worker::{
    Capability, CapabilitySet, PerformanceProfile, ResourceBudget, Worker, WorkerArchetype, WorkerId,
    WorkerKind, WorkerStatus,
};
