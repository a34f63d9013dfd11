// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod memory_graph;

pub use memory_graph::{
    GraphSnapshot, GraphStats, MemoryGraph, SearchCriteria, DEFAULT_MAX_DEPTH, DEFAULT_MAX_RESULTS,
};
