// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Built-in Work Executors
//
// Deterministic stand-ins for the five task kinds. Each one derives its
// result from the task input only, optionally waits a configured delay
// (abandoning the wait when the task is cancelled), and fails on request
// when the input carries `"fail": "<reason>"`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::executor::{ExecutionContext, ExecutionError, ExecutorRegistry, WorkExecutor};
use crate::domain::task::TaskKind;

/// Longest forecast the prediction executor will produce.
pub const MAX_FORECAST_HORIZON: u64 = 1_000;

/// Registry with the built-in executor bound to every task kind.
pub fn builtin_registry(delay: Duration) -> ExecutorRegistry {
    ExecutorRegistry::new()
        .with(TaskKind::Analysis, Arc::new(AnalysisExecutor { delay }))
        .with(TaskKind::Prediction, Arc::new(PredictionExecutor { delay }))
        .with(TaskKind::Optimization, Arc::new(OptimizationExecutor { delay }))
        .with(TaskKind::Control, Arc::new(ControlExecutor { delay }))
        .with(TaskKind::Learning, Arc::new(LearningExecutor { delay }))
}

async fn simulate_work(ctx: &ExecutionContext, delay: Duration) -> Result<(), ExecutionError> {
    if ctx.is_cancelled() {
        return Err(ExecutionError::Cancelled);
    }
    if !delay.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = ctx.cancellation.cancelled() => return Err(ExecutionError::Cancelled),
        }
    }
    if let Some(reason) = ctx.input.get("fail").and_then(Value::as_str) {
        return Err(ExecutionError::Failed(reason.to_string()));
    }
    Ok(())
}

fn numbers(input: &Value, field: &str) -> Vec<f64> {
    input
        .get(field)
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub struct AnalysisExecutor {
    pub delay: Duration,
}

#[async_trait]
impl WorkExecutor for AnalysisExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<Value, ExecutionError> {
        simulate_work(&ctx, self.delay).await?;

        let data = numbers(&ctx.input, "data");
        let avg = mean(&data);
        let variance = mean(&data.iter().map(|v| (v - avg).powi(2)).collect::<Vec<_>>());
        let spread = variance.sqrt();

        let anomalies: Vec<f64> = data
            .iter()
            .copied()
            .filter(|v| spread > 0.0 && (v - avg).abs() > 2.0 * spread)
            .collect();

        let mut patterns = Vec::new();
        if let (Some(first), Some(last)) = (data.first(), data.last()) {
            if last > first {
                patterns.push("upward trend");
            } else if last < first {
                patterns.push("downward trend");
            } else {
                patterns.push("stable level");
            }
        }

        Ok(json!({
            "summary": format!("Analyzed {} data points", data.len()),
            "mean": avg,
            "patterns": patterns,
            "anomalies": anomalies,
            "insights": [format!("{} anomalies beyond two standard deviations", anomalies.len())],
            "confidence": if data.is_empty() { 0.5 } else { 0.85 },
        }))
    }
}

pub struct PredictionExecutor {
    pub delay: Duration,
}

#[async_trait]
impl WorkExecutor for PredictionExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<Value, ExecutionError> {
        simulate_work(&ctx, self.delay).await?;

        let series = numbers(&ctx.input, "series");
        let horizon = ctx.input.get("horizon").and_then(Value::as_u64).unwrap_or(3);
        if horizon > MAX_FORECAST_HORIZON {
            return Err(ExecutionError::Failed(format!(
                "forecast horizon {horizon} exceeds the limit of {MAX_FORECAST_HORIZON}"
            )));
        }

        // Extrapolate the mean step between consecutive observations
        let steps: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
        let step = mean(&steps);
        let last = series.last().copied().unwrap_or(0.0);
        let forecast: Vec<f64> = (1..=horizon).map(|h| last + step * h as f64).collect();

        Ok(json!({
            "forecast": forecast,
            "confidence": if series.len() >= 2 { 0.8 } else { 0.4 },
            "factors": ["historical trend"],
            "risks": if step < 0.0 { vec!["declining trajectory"] } else { Vec::new() },
            "recommendations": ["monitor key metrics"],
        }))
    }
}

pub struct OptimizationExecutor {
    pub delay: Duration,
}

#[async_trait]
impl WorkExecutor for OptimizationExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<Value, ExecutionError> {
        simulate_work(&ctx, self.delay).await?;

        let mut optimized = ctx.input.get("config").cloned().unwrap_or_else(|| json!({}));
        if let Value::Object(map) = &mut optimized {
            map.insert("optimized".into(), Value::Bool(true));
        }

        Ok(json!({
            "optimized_config": optimized,
            "expected_improvement": 0.15,
            "tradeoffs": ["higher memory use for lower latency"],
            "implementation_plan": ["apply configuration", "observe", "roll back on regression"],
        }))
    }
}

pub struct ControlExecutor {
    pub delay: Duration,
}

#[async_trait]
impl WorkExecutor for ControlExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<Value, ExecutionError> {
        simulate_work(&ctx, self.delay).await?;

        let threshold = ctx.input.get("threshold").and_then(Value::as_f64).unwrap_or(0.85);

        Ok(json!({
            "action": "parameter_adjustment",
            "parameters": { "threshold": threshold },
            "result": "applied",
            "impact": "system parameters adjusted",
        }))
    }
}

pub struct LearningExecutor {
    pub delay: Duration,
}

#[async_trait]
impl WorkExecutor for LearningExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<Value, ExecutionError> {
        simulate_work(&ctx, self.delay).await?;

        let samples = ctx.input.get("samples").and_then(Value::as_u64).unwrap_or(0);

        Ok(json!({
            "model": "updated",
            "samples": samples,
            "accuracy": 0.92,
            "insights": [format!("incorporated {} samples", samples)],
            "recommendations": ["retrain when accuracy drops below 0.85"],
        }))
    }
}
