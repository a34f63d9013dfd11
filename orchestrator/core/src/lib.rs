// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `synapse-orchestrator-core`
//!
//! In-process task orchestration engine. Tasks are queued by priority, held
//! back until their dependencies complete, and dispatched to capability-tagged
//! workers with spare resource budget. Every submission, outcome and decision
//! is recorded in a [`synapse_cortex::MemoryGraph`].
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | tasks, workers, decisions, config, executor and scoring ports |
//! | [`application`] | Application | `TaskOrchestrator`, `WorkerPool`, `DecisionEngine` |
//! | [`infrastructure`] | Infrastructure | event bus, built-in executors, static scoring |

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::*;
pub use infrastructure::{builtin_registry, EventBus, StaticScoringStrategy};
