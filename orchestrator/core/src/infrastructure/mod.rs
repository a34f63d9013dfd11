// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod executors;
pub mod scoring;

pub use event_bus::{EventBus, EventBusError, EventReceiver, TaskEventReceiver};
pub use executors::builtin_registry;
pub use scoring::StaticScoringStrategy;
