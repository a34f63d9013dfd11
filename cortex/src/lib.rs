// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `synapse-cortex` — Knowledge Graph Memory
//!
//! A mutable, append-biased graph of typed knowledge nodes and weighted
//! relationship edges. The orchestrator records task history and decisions
//! here; any other collaborator may ingest its own nodes and edges.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | node/edge entities, importance scoring, clock port |
//! | [`application`] | Application | `MemoryGraph` with indexes, search, traversal |
//! | [`infrastructure`] | Infrastructure | JSON snapshot files |

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::*;
