// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Knowledge graph entities for the Cortex
//!
//! Nodes carry a typed payload plus the access statistics the importance
//! score is derived from. Edges are directed, weighted relations; a
//! bidirectional edge is reachable from both endpoints during traversal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Node identifier in the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Edge identifier in the knowledge graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub Uuid);

impl EdgeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of knowledge a node records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Concept,
    Fact,
    Pattern,
    Rule,
    Experience,
    Prediction,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Concept => "concept",
            NodeKind::Fact => "fact",
            NodeKind::Pattern => "pattern",
            NodeKind::Rule => "rule",
            NodeKind::Experience => "experience",
            NodeKind::Prediction => "prediction",
        }
    }
}

/// Type of relation an edge expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Causal,
    Similarity,
    Temporal,
    Hierarchical,
    Inference,
}

/// Node in the knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub payload: Value,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub origin: String,
    pub tags: BTreeSet<String>,
    pub access_count: u64,
    pub last_accessed_at: DateTime<Utc>,
    pub importance: f64,
    /// Adjacent node ids (back-references maintained by edge creation).
    pub adjacency: Vec<NodeId>,
}

impl MemoryNode {
    /// Add a neighbour unless it is already present.
    pub(crate) fn link(&mut self, neighbour: NodeId) {
        if !self.adjacency.contains(&neighbour) {
            self.adjacency.push(neighbour);
        }
    }
}

/// Edge in the knowledge graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEdge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub kind: RelationKind,
    pub weight: f64,
    pub bidirectional: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for [`crate::application::MemoryGraph::add_node`].
#[derive(Debug, Clone)]
pub struct NewNode {
    pub kind: NodeKind,
    pub payload: Value,
    pub confidence: f64,
    pub origin: String,
    pub tags: BTreeSet<String>,
    /// Importance to seed before the node is first read. Falls back to the
    /// confidence-only score when absent.
    pub importance: Option<f64>,
}

impl NewNode {
    pub fn new(kind: NodeKind, payload: Value, confidence: f64, origin: impl Into<String>) -> Self {
        Self {
            kind,
            payload,
            confidence: clamp_unit(confidence),
            origin: origin.into(),
            tags: BTreeSet::new(),
            importance: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = Some(clamp_unit(importance));
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CortexError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("Snapshot I/O failed: {0}")]
    Snapshot(String),
}

/// Clamp into [0, 1]; NaN collapses to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
