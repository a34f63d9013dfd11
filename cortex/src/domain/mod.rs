// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cortex Domain Layer
//!
//! Pure types for the knowledge graph. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`graph`] | `MemoryNode`, `MemoryEdge`, `NewNode`, `CortexError` |
//! | [`importance`] | recency / frequency / connectivity scoring |
//! | [`clock`] | `Clock`, `SystemClock`, `ManualClock` |

pub mod clock;
pub mod graph;
pub mod importance;

pub use clock::*;
pub use graph::*;
