// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Static Scoring Strategy
//
// Deterministic ScoringStrategy backed by a lookup table keyed by option id.
// Unknown options receive the fallback score.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::decision::{DecisionError, DecisionOption, OptionScore, ScoringStrategy};

#[derive(Debug, Clone)]
pub struct StaticScoringStrategy {
    fallback: OptionScore,
    scores: HashMap<String, OptionScore>,
}

impl StaticScoringStrategy {
    pub fn new(fallback: OptionScore) -> Self {
        Self {
            fallback,
            scores: HashMap::new(),
        }
    }

    pub fn with_score(mut self, option_id: impl Into<String>, score: OptionScore) -> Self {
        self.insert(option_id, score);
        self
    }

    pub fn insert(&mut self, option_id: impl Into<String>, score: OptionScore) {
        // Re-clamp in case the score was built field by field
        let score = OptionScore::new(score.confidence, score.impact, score.cost);
        self.scores.insert(option_id.into(), score);
    }
}

impl Default for StaticScoringStrategy {
    fn default() -> Self {
        Self::new(OptionScore::new(0.5, 0.5, 0.5))
    }
}

#[async_trait]
impl ScoringStrategy for StaticScoringStrategy {
    async fn score(&self, _context: &str, option: &DecisionOption) -> Result<OptionScore, DecisionError> {
        Ok(self.scores.get(&option.id).copied().unwrap_or(self.fallback))
    }
}
