// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! JSON file persistence for graph snapshots
//!
//! The graph itself is in-memory only; hosts that want durability write a
//! [`GraphSnapshot`] out and restore it with `MemoryGraph::from_snapshot`.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::application::GraphSnapshot;
use crate::domain::graph::CortexError;

pub fn write_snapshot(snapshot: &GraphSnapshot, path: impl AsRef<Path>) -> Result<(), CortexError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| CortexError::Snapshot(e.to_string()))?;
    fs::write(path, json).map_err(|e| CortexError::Snapshot(format!("{}: {}", path.display(), e)))?;

    info!(
        path = %path.display(),
        nodes = snapshot.nodes.len(),
        edges = snapshot.edges.len(),
        "Wrote memory graph snapshot"
    );
    Ok(())
}

pub fn read_snapshot(path: impl AsRef<Path>) -> Result<GraphSnapshot, CortexError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| CortexError::Snapshot(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&content).map_err(|e| CortexError::Snapshot(e.to_string()))
}
