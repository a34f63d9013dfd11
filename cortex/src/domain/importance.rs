// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Importance scoring
//!
//! `importance = confidence × (0.3·recency + 0.4·frequency + 0.3·connectivity)`
//!
//! - recency: `exp(-Δt / 1 day)` where Δt is the time since the previous access
//! - frequency: `ln(accesses + 1) / ln(100)`, saturating at 1
//! - connectivity: adjacency size over 10, saturating at 1

use chrono::{DateTime, Utc};

use super::graph::clamp_unit;

const RECENCY_WEIGHT: f64 = 0.3;
const FREQUENCY_WEIGHT: f64 = 0.4;
const CONNECTIVITY_WEIGHT: f64 = 0.3;

const DECAY_MILLIS: f64 = 24.0 * 60.0 * 60.0 * 1000.0;
const FREQUENCY_SATURATION: f64 = 100.0;
const CONNECTIVITY_CAP: f64 = 10.0;

pub fn recency(last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed = (now - last_accessed).num_milliseconds().max(0) as f64;
    (-elapsed / DECAY_MILLIS).exp()
}

pub fn frequency(access_count: u64) -> f64 {
    ((access_count as f64 + 1.0).ln() / FREQUENCY_SATURATION.ln()).min(1.0)
}

pub fn connectivity(neighbours: usize) -> f64 {
    (neighbours as f64 / CONNECTIVITY_CAP).clamp(0.0, 1.0)
}

pub fn importance(confidence: f64, recency: f64, frequency: f64, connectivity: f64) -> f64 {
    let blend = RECENCY_WEIGHT * recency
        + FREQUENCY_WEIGHT * frequency
        + CONNECTIVITY_WEIGHT * connectivity;
    clamp_unit(confidence * blend)
}

/// Score of a node that has never been read and has no edges.
pub fn initial_importance(confidence: f64) -> f64 {
    importance(confidence, 1.0, 0.0, 0.0)
}

/// Secondary search signal: last access relative to now, in (0, 1].
pub fn recency_ratio(last_accessed: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let now_ms = now.timestamp_millis() as f64;
    if now_ms <= 0.0 {
        return 0.0;
    }
    (last_accessed.timestamp_millis() as f64 / now_ms).min(1.0)
}
