// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Decision Record
//!
//! Immutable outcome of a multi-criteria choice among discrete options.
//!
//! Each option is scored through a [`ScoringStrategy`] on three axes and the
//! option maximising `0.4·confidence + 0.4·impact − 0.2·cost` is selected.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use synapse_cortex::{clamp_unit, NodeId};
use thiserror::Error;
use uuid::Uuid;

const CONFIDENCE_WEIGHT: f64 = 0.4;
const IMPACT_WEIGHT: f64 = 0.4;
const COST_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecisionId(pub Uuid);

impl DecisionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DecisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A candidate the caller wants ranked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOption {
    pub id: String,
    #[serde(default)]
    pub description: String,
}

impl DecisionOption {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// Per-option scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionScore {
    pub confidence: f64,
    pub impact: f64,
    pub cost: f64,
}

impl OptionScore {
    pub fn new(confidence: f64, impact: f64, cost: f64) -> Self {
        Self {
            confidence: clamp_unit(confidence),
            impact: clamp_unit(impact),
            cost: clamp_unit(cost),
        }
    }

    pub fn combined(&self) -> f64 {
        CONFIDENCE_WEIGHT * self.confidence + IMPACT_WEIGHT * self.impact
            - COST_WEIGHT * self.cost
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredOption {
    pub option: DecisionOption,
    pub score: OptionScore,
    pub combined: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub context: String,
    pub options: Vec<ScoredOption>,
    pub selected: String,
    pub reasoning: Vec<String>,
    pub made_at: DateTime<Utc>,
    /// Experience node recording this decision in the memory graph.
    pub memory_node: NodeId,
}

impl Decision {
    pub fn selected_option(&self) -> Option<&ScoredOption> {
        self.options.iter().find(|o| o.option.id == self.selected)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecisionError {
    #[error("No options supplied for decision context '{0}'")]
    NoOptions(String),

    #[error("Scoring failed for option '{option}': {reason}")]
    Scoring { option: String, reason: String },
}

/// Source of per-option scores. Implementations may consult external
/// models; they must not rely on shared mutable state between calls.
#[async_trait]
pub trait ScoringStrategy: Send + Sync {
    async fn score(&self, context: &str, option: &DecisionOption) -> Result<OptionScore, DecisionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_score_weights() {
        let score = OptionScore::new(1.0, 0.5, 0.5);
        assert!((score.combined() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_scores_are_clamped() {
        let score = OptionScore::new(1.7, -0.2, f64::NAN);
        assert_eq!(score.confidence, 1.0);
        assert_eq!(score.impact, 0.0);
        assert_eq!(score.cost, 0.0);
    }
}
