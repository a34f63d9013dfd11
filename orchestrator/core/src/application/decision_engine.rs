// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Decision Engine
//!
//! Ranks a set of discrete options with an injected [`ScoringStrategy`] and
//! keeps every outcome as an immutable [`Decision`]: once in the in-process
//! log and once as an `experience` node tagged `decision` in the memory graph.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Multi-criteria selection with a persisted rationale

use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use synapse_cortex::{MemoryGraph, NewNode, NodeKind};
use tracing::info;

use crate::domain::decision::{
    Decision, DecisionError, DecisionId, DecisionOption, OptionScore, ScoredOption, ScoringStrategy,
};
use crate::domain::events::OrchestratorEvent;
use crate::infrastructure::event_bus::EventBus;

pub(crate) const DECISION_ORIGIN: &str = "orchestrator";
const DECISION_IMPORTANCE: f64 = 0.8;

pub struct DecisionEngine {
    memory: Arc<MemoryGraph>,
    strategy: Arc<dyn ScoringStrategy>,
    event_bus: EventBus,
    log: RwLock<Vec<Decision>>,
}

impl DecisionEngine {
    pub fn new(memory: Arc<MemoryGraph>, strategy: Arc<dyn ScoringStrategy>, event_bus: EventBus) -> Self {
        Self {
            memory,
            strategy,
            event_bus,
            log: RwLock::new(Vec::new()),
        }
    }

    /// Score every option and select the best combined score. Ties go to
    /// the option declared first.
    pub async fn decide(&self, context: &str, options: Vec<DecisionOption>) -> Result<Decision, DecisionError> {
        if options.is_empty() {
            return Err(DecisionError::NoOptions(context.to_string()));
        }

        let mut scored = Vec::with_capacity(options.len());
        for option in options {
            let raw = self.strategy.score(context, &option).await?;
            let score = OptionScore::new(raw.confidence, raw.impact, raw.cost);
            scored.push(ScoredOption {
                combined: score.combined(),
                option,
                score,
            });
        }

        let mut best = 0;
        for (index, candidate) in scored.iter().enumerate().skip(1) {
            if candidate.combined > scored[best].combined {
                best = index;
            }
        }
        let selected = &scored[best];

        let reasoning = vec![
            format!("Selected option {} based on highest combined score", selected.option.id),
            format!("Confidence: {:.2}", selected.score.confidence),
            format!("Expected impact: {:.2}", selected.score.impact),
            format!("Estimated cost: {:.2}", selected.score.cost),
            format!("Combined score: {:.2}", selected.combined),
        ];

        let id = DecisionId::new();
        let made_at = self.memory.clock().now();
        let memory_node = self.memory.add_node(
            NewNode::new(
                NodeKind::Experience,
                json!({
                    "decision_id": id,
                    "context": context,
                    "selected": selected.option.id,
                    "options": scored,
                    "reasoning": reasoning,
                }),
                selected.score.confidence,
                DECISION_ORIGIN,
            )
            .with_tags(["decision", "autonomous"])
            .with_importance(DECISION_IMPORTANCE),
        );

        let decision = Decision {
            id,
            context: context.to_string(),
            selected: selected.option.id.clone(),
            options: scored,
            reasoning,
            made_at,
            memory_node,
        };

        info!(
            decision_id = %decision.id,
            selected = %decision.selected,
            options = decision.options.len(),
            "Decision made"
        );
        metrics::counter!("synapse_decisions_total").increment(1);

        self.log.write().push(decision.clone());
        self.event_bus.publish(OrchestratorEvent::DecisionMade {
            decision_id: decision.id,
            selected: decision.selected.clone(),
            memory_node,
            decided_at: made_at,
        });

        Ok(decision)
    }

    pub fn get_decision(&self, id: DecisionId) -> Option<Decision> {
        self.log.read().iter().find(|d| d.id == id).cloned()
    }

    /// Every decision made so far, oldest first.
    pub fn decisions(&self) -> Vec<Decision> {
        self.log.read().clone()
    }
}
