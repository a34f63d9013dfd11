// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # MemoryGraph — Knowledge Graph Store
//!
//! Owns every [`MemoryNode`] and [`MemoryEdge`] and keeps four auxiliary
//! indexes in step with node insertion:
//!
//! | Index | Key | Used by |
//! |-------|-----|---------|
//! | by kind | [`NodeKind`] | `search_nodes` kind filter |
//! | by tag | tag string | `search_nodes` tag filter (OR match) |
//! | by origin | origin label | `search_nodes` origin filter |
//! | by recency | creation time, newest first | `recent_nodes` |
//!
//! ## Access tracking
//!
//! [`MemoryGraph::get_node`] is the only read that counts as an access: it
//! bumps `access_count`, moves `last_accessed_at` and recomputes
//! `importance` before returning. Search and traversal rank on the stored
//! importance and leave access statistics untouched.
//!
//! ## Concurrency
//!
//! All state sits behind one `parking_lot::RwLock`; writers (including
//! `get_node`) are serialized, readers share. No lock is held across an
//! `.await`, so the graph is safe to share between executor tasks.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::clock::{Clock, SystemClock};
use crate::domain::graph::{
    clamp_unit, CortexError, EdgeId, MemoryEdge, MemoryNode, NewNode, NodeId, NodeKind,
    RelationKind,
};
use crate::domain::importance;

pub const DEFAULT_MAX_DEPTH: usize = 2;
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Filters for [`MemoryGraph::search_nodes`]. All present filters are ANDed;
/// `tags` matches a node carrying any one of the listed tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub kind: Option<NodeKind>,
    pub tags: Option<Vec<String>>,
    /// Case-insensitive substring of the JSON-encoded payload.
    pub text: Option<String>,
    pub origin: Option<String>,
    pub min_confidence: Option<f64>,
    pub limit: Option<usize>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = Some(min);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Node and edge totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
}

/// Serializable copy of the graph's node and edge collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<MemoryNode>,
    pub edges: Vec<MemoryEdge>,
}

#[derive(Default)]
struct GraphIndexes {
    by_kind: HashMap<NodeKind, HashSet<NodeId>>,
    by_tag: HashMap<String, HashSet<NodeId>>,
    by_origin: HashMap<String, HashSet<NodeId>>,
    /// Newest first; ties keep insertion order.
    by_recency: Vec<(DateTime<Utc>, u64, NodeId)>,
}

impl GraphIndexes {
    fn insert(&mut self, node: &MemoryNode, seq: u64) {
        self.by_kind.entry(node.kind).or_default().insert(node.id);
        for tag in &node.tags {
            self.by_tag.entry(tag.clone()).or_default().insert(node.id);
        }
        self.by_origin
            .entry(node.origin.clone())
            .or_default()
            .insert(node.id);

        let key = (node.created_at, Reverse(seq));
        let position = self
            .by_recency
            .partition_point(|(created, s, _)| (*created, Reverse(*s)) > key);
        self.by_recency.insert(position, (node.created_at, seq, node.id));
    }
}

#[derive(Default)]
struct GraphState {
    nodes: HashMap<NodeId, MemoryNode>,
    /// Insertion sequence per node, the tiebreaker for every ranking.
    sequence: HashMap<NodeId, u64>,
    next_seq: u64,
    edges: Vec<MemoryEdge>,
    indexes: GraphIndexes,
}

impl GraphState {
    fn insert_node(&mut self, node: MemoryNode) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.indexes.insert(&node, seq);
        self.sequence.insert(node.id, seq);
        self.nodes.insert(node.id, node);
    }

    fn seq(&self, id: &NodeId) -> u64 {
        self.sequence.get(id).copied().unwrap_or(u64::MAX)
    }

    fn link(&mut self, edge: &MemoryEdge) {
        if let Some(from) = self.nodes.get_mut(&edge.from) {
            from.link(edge.to);
        }
        if edge.bidirectional {
            if let Some(to) = self.nodes.get_mut(&edge.to) {
                to.link(edge.from);
            }
        }
    }

    /// Ids passing the indexed filters, or `None` when no indexed filter applies.
    fn indexed_candidates(&self, criteria: &SearchCriteria) -> Option<HashSet<NodeId>> {
        let mut candidates: Option<HashSet<NodeId>> = None;

        let mut narrow = |set: HashSet<NodeId>| {
            candidates = Some(match candidates.take() {
                Some(current) => current.intersection(&set).copied().collect(),
                None => set,
            });
        };

        if let Some(kind) = criteria.kind {
            narrow(self.indexes.by_kind.get(&kind).cloned().unwrap_or_default());
        }

        if let Some(origin) = &criteria.origin {
            narrow(self.indexes.by_origin.get(origin).cloned().unwrap_or_default());
        }

        if let Some(tags) = criteria.tags.as_ref().filter(|t| !t.is_empty()) {
            let mut union = HashSet::new();
            for tag in tags {
                if let Some(ids) = self.indexes.by_tag.get(tag) {
                    union.extend(ids.iter().copied());
                }
            }
            narrow(union);
        }

        candidates
    }
}

/// The knowledge graph memory store.
pub struct MemoryGraph {
    state: RwLock<GraphState>,
    clock: Arc<dyn Clock>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(GraphState::default()),
            clock,
        }
    }

    /// Rebuild a graph from a snapshot. Adjacency lists and indexes are
    /// derived again from the edge list; an edge naming a missing node
    /// rejects the whole snapshot.
    pub fn from_snapshot(snapshot: GraphSnapshot, clock: Arc<dyn Clock>) -> Result<Self, CortexError> {
        let mut state = GraphState::default();

        for mut node in snapshot.nodes {
            node.adjacency.clear();
            state.insert_node(node);
        }

        for edge in snapshot.edges {
            for endpoint in [edge.from, edge.to] {
                if !state.nodes.contains_key(&endpoint) {
                    return Err(CortexError::UnknownNode(endpoint));
                }
            }
            state.link(&edge);
            state.edges.push(edge);
        }

        Ok(Self {
            state: RwLock::new(state),
            clock,
        })
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Insert a node. Always succeeds.
    pub fn add_node(&self, new_node: NewNode) -> NodeId {
        let now = self.clock.now();
        let importance = new_node
            .importance
            .unwrap_or_else(|| importance::initial_importance(new_node.confidence));

        let node = MemoryNode {
            id: NodeId::new(),
            kind: new_node.kind,
            payload: new_node.payload,
            confidence: clamp_unit(new_node.confidence),
            created_at: now,
            origin: new_node.origin,
            tags: new_node.tags,
            access_count: 0,
            last_accessed_at: now,
            importance,
            adjacency: Vec::new(),
        };
        let id = node.id;

        debug!(node_id = %id, kind = node.kind.as_str(), origin = %node.origin, "Adding memory node");
        self.state.write().insert_node(node);

        id
    }

    /// Relate two existing nodes. Nothing is written if either endpoint is missing.
    pub fn add_edge(
        &self,
        from: NodeId,
        to: NodeId,
        kind: RelationKind,
        weight: f64,
        bidirectional: bool,
    ) -> Result<EdgeId, CortexError> {
        let mut state = self.state.write();

        for endpoint in [from, to] {
            if !state.nodes.contains_key(&endpoint) {
                return Err(CortexError::UnknownNode(endpoint));
            }
        }

        let edge = MemoryEdge {
            id: EdgeId::new(),
            from,
            to,
            kind,
            weight: clamp_unit(weight),
            bidirectional,
            created_at: self.clock.now(),
        };
        let id = edge.id;

        state.link(&edge);
        state.edges.push(edge);

        debug!(edge_id = %id, %from, %to, ?kind, "Adding memory edge");
        Ok(id)
    }

    /// Read a node, recording the access and refreshing its importance.
    pub fn get_node(&self, id: NodeId) -> Result<MemoryNode, CortexError> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let node = state.nodes.get_mut(&id).ok_or(CortexError::NodeNotFound(id))?;

        let recency = importance::recency(node.last_accessed_at, now);
        node.access_count += 1;
        node.last_accessed_at = now;
        node.importance = importance::importance(
            node.confidence,
            recency,
            importance::frequency(node.access_count),
            importance::connectivity(node.adjacency.len()),
        );

        Ok(node.clone())
    }

    /// Read a node without counting an access.
    pub fn peek_node(&self, id: NodeId) -> Option<MemoryNode> {
        self.state.read().nodes.get(&id).cloned()
    }

    /// Filter and rank nodes by `0.7·importance + 0.3·recency ratio`,
    /// ties in insertion order.
    pub fn search_nodes(&self, criteria: &SearchCriteria) -> Vec<MemoryNode> {
        let now = self.clock.now();
        let state = self.state.read();
        let needle = criteria.text.as_ref().map(|t| t.to_lowercase());

        let candidates: Vec<&MemoryNode> = match state.indexed_candidates(criteria) {
            Some(ids) => ids.iter().filter_map(|id| state.nodes.get(id)).collect(),
            None => state.nodes.values().collect(),
        };

        let mut ranked: Vec<(f64, u64, &MemoryNode)> = candidates
            .into_iter()
            .filter(|node| match criteria.min_confidence {
                Some(min) => node.confidence >= min,
                None => true,
            })
            .filter(|node| match &needle {
                Some(needle) => node.payload.to_string().to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .map(|node| {
                let score = 0.7 * node.importance
                    + 0.3 * importance::recency_ratio(node.last_accessed_at, now);
                (score, state.seq(&node.id), node)
            })
            .collect();

        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        let limit = criteria.limit.unwrap_or(usize::MAX);
        ranked
            .into_iter()
            .take(limit)
            .map(|(_, _, node)| node.clone())
            .collect()
    }

    /// Breadth-first neighbourhood of `id`, excluding `id` itself, ranked by
    /// `importance / (distance + 1)`. An unknown start yields nothing.
    pub fn find_related(&self, id: NodeId, max_depth: usize, max_results: usize) -> Vec<MemoryNode> {
        let state = self.state.read();
        if !state.nodes.contains_key(&id) {
            return Vec::new();
        }

        let mut visited = HashSet::from([id]);
        let mut queue = VecDeque::from([(id, 0usize)]);
        let mut related: Vec<(f64, &MemoryNode)> = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            let Some(node) = state.nodes.get(&current) else {
                continue;
            };

            if depth > 0 {
                related.push((node.importance / (depth as f64 + 1.0), node));
            }

            if depth == max_depth {
                continue;
            }

            for neighbour in &node.adjacency {
                if visited.insert(*neighbour) {
                    queue.push_back((*neighbour, depth + 1));
                }
            }
        }

        // Stable: equal scores keep breadth-first discovery order.
        related.sort_by(|a, b| b.0.total_cmp(&a.0));
        related
            .into_iter()
            .take(max_results)
            .map(|(_, node)| node.clone())
            .collect()
    }

    /// Newest nodes first.
    pub fn recent_nodes(&self, limit: usize) -> Vec<MemoryNode> {
        let state = self.state.read();
        state
            .indexes
            .by_recency
            .iter()
            .filter_map(|(_, _, id)| state.nodes.get(id).cloned())
            .take(limit)
            .collect()
    }

    /// Edges leaving `id`, plus bidirectional edges arriving at it.
    pub fn edges_of(&self, id: NodeId) -> Vec<MemoryEdge> {
        self.state
            .read()
            .edges
            .iter()
            .filter(|edge| edge.from == id || (edge.bidirectional && edge.to == id))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        let state = self.state.read();
        GraphStats {
            nodes: state.nodes.len(),
            edges: state.edges.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out nodes (insertion order) and edges.
    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.state.read();
        let mut nodes: Vec<&MemoryNode> = state.nodes.values().collect();
        nodes.sort_by_key(|node| state.seq(&node.id));

        GraphSnapshot {
            nodes: nodes.into_iter().cloned().collect(),
            edges: state.edges.clone(),
        }
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}
