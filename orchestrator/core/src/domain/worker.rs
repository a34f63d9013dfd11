// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Worker Entity
//!
//! A capability-tagged execution slot with a bounded resource budget and a
//! running performance profile. Workers are created once from a list of
//! [`WorkerArchetype`]s and mutated only by the orchestrator while it
//! dispatches and retires tasks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::domain::task::{ResourceRequest, TaskId, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub Uuid);

impl WorkerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability archetype of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    Analyzer,
    Predictor,
    Optimizer,
    Controller,
    Learner,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Analyzer => "analyzer",
            WorkerKind::Predictor => "predictor",
            WorkerKind::Optimizer => "optimizer",
            WorkerKind::Controller => "controller",
            WorkerKind::Learner => "learner",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    DataAnalysis,
    PatternRecognition,
    AnomalyDetection,
    Forecasting,
    TrendAnalysis,
    RiskAssessment,
    ResourceAllocation,
    PerformanceTuning,
    CostOptimization,
    SystemControl,
    Automation,
    AdaptiveTuning,
    KnowledgeExtraction,
    ModelTraining,
    Adaptation,
}

impl Capability {
    /// Capability a worker must declare to take a task of `kind` under the
    /// default requirement table.
    pub fn default_requirement(kind: TaskKind) -> Capability {
        match kind {
            TaskKind::Analysis => Capability::DataAnalysis,
            TaskKind::Prediction => Capability::Forecasting,
            TaskKind::Optimization => Capability::ResourceAllocation,
            TaskKind::Control => Capability::SystemControl,
            TaskKind::Learning => Capability::KnowledgeExtraction,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn insert(&mut self, capability: Capability) -> bool {
        self.0.insert(capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Error,
    Offline,
}

/// Resource ceiling and current consumption, both as shares in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceBudget {
    pub max_cpu: f64,
    pub max_memory: f64,
    pub current_cpu: f64,
    pub current_memory: f64,
}

impl ResourceBudget {
    pub fn new(max_cpu: f64, max_memory: f64) -> Self {
        Self {
            max_cpu,
            max_memory,
            current_cpu: 0.0,
            current_memory: 0.0,
        }
    }

    pub fn fits(&self, request: &ResourceRequest) -> bool {
        self.current_cpu + request.cpu <= self.max_cpu
            && self.current_memory + request.memory <= self.max_memory
    }

    pub fn within_ceiling(&self) -> bool {
        self.current_cpu <= self.max_cpu && self.current_memory <= self.max_memory
    }

    pub(crate) fn consume(&mut self, request: &ResourceRequest) {
        self.current_cpu += request.cpu;
        self.current_memory += request.memory;
    }

    pub(crate) fn restore(&mut self, request: &ResourceRequest) {
        self.current_cpu = (self.current_cpu - request.cpu).max(0.0);
        self.current_memory = (self.current_memory - request.memory).max(0.0);
    }
}

/// Running performance statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceProfile {
    pub tasks_completed: u64,
    /// Running mean execution time in milliseconds.
    pub average_time_ms: f64,
    pub success_rate: f64,
    pub efficiency: f64,
}

impl Default for PerformanceProfile {
    fn default() -> Self {
        Self {
            tasks_completed: 0,
            average_time_ms: 0.0,
            success_rate: 1.0,
            efficiency: 1.0,
        }
    }
}

impl PerformanceProfile {
    /// Fold one finished task into the profile.
    ///
    /// `efficiency = success_rate × min(expected / actual, speed_cap)`; an
    /// instantaneous run earns the full speed bonus.
    pub fn record(&mut self, success: bool, elapsed_ms: i64, expected_ms: u64, speed_cap: f64) {
        self.tasks_completed += 1;
        let n = self.tasks_completed as f64;
        let elapsed = elapsed_ms.max(0) as f64;

        self.average_time_ms = (self.average_time_ms * (n - 1.0) + elapsed) / n;

        let outcome = if success { 1.0 } else { 0.0 };
        self.success_rate = (self.success_rate * (n - 1.0) + outcome) / n;

        let speed_factor = if elapsed > 0.0 {
            (expected_ms as f64 / elapsed).min(speed_cap)
        } else {
            speed_cap
        };
        self.efficiency = self.success_rate * speed_factor;
    }
}

/// Startup template for one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerArchetype {
    pub kind: WorkerKind,
    pub capabilities: CapabilitySet,
    pub max_cpu: f64,
    pub max_memory: f64,
    /// How many identical workers to create.
    #[serde(default = "default_replicas")]
    pub replicas: usize,
}

fn default_replicas() -> usize {
    1
}

impl WorkerArchetype {
    pub fn new(
        kind: WorkerKind,
        capabilities: impl IntoIterator<Item = Capability>,
        max_cpu: f64,
        max_memory: f64,
    ) -> Self {
        Self {
            kind,
            capabilities: capabilities.into_iter().collect(),
            max_cpu,
            max_memory,
            replicas: 1,
        }
    }

    /// One worker per archetype.
    pub fn defaults() -> Vec<WorkerArchetype> {
        use Capability::*;
        vec![
            WorkerArchetype::new(
                WorkerKind::Analyzer,
                [DataAnalysis, PatternRecognition, AnomalyDetection],
                0.3,
                0.2,
            ),
            WorkerArchetype::new(
                WorkerKind::Predictor,
                [Forecasting, TrendAnalysis, RiskAssessment],
                0.4,
                0.3,
            ),
            WorkerArchetype::new(
                WorkerKind::Optimizer,
                [ResourceAllocation, PerformanceTuning, CostOptimization],
                0.2,
                0.2,
            ),
            WorkerArchetype::new(
                WorkerKind::Controller,
                [SystemControl, Automation, AdaptiveTuning],
                0.1,
                0.1,
            ),
            WorkerArchetype::new(
                WorkerKind::Learner,
                [KnowledgeExtraction, ModelTraining, Adaptation],
                0.5,
                0.4,
            ),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub kind: WorkerKind,
    pub status: WorkerStatus,
    pub capabilities: CapabilitySet,
    pub budget: ResourceBudget,
    pub performance: PerformanceProfile,
    pub current_task: Option<TaskId>,
}

impl Worker {
    pub fn from_archetype(archetype: &WorkerArchetype) -> Self {
        Self {
            id: WorkerId::new(),
            kind: archetype.kind,
            status: WorkerStatus::Idle,
            capabilities: archetype.capabilities.clone(),
            budget: ResourceBudget::new(archetype.max_cpu, archetype.max_memory),
            performance: PerformanceProfile::default(),
            current_task: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == WorkerStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_archetypes_cover_every_task_kind() {
        let archetypes = WorkerArchetype::defaults();
        assert_eq!(archetypes.len(), 5);

        for kind in TaskKind::ALL {
            let required = Capability::default_requirement(kind);
            assert!(archetypes.iter().any(|a| a.capabilities.contains(required)));
        }
    }

    #[test]
    fn test_budget_fits_and_restores() {
        let mut budget = ResourceBudget::new(0.3, 0.2);
        let request = ResourceRequest::new(0.3, 0.2);

        assert!(budget.fits(&request));
        budget.consume(&request);
        assert!(!budget.fits(&ResourceRequest::new(0.01, 0.0)));
        assert!(budget.within_ceiling());

        budget.restore(&request);
        assert_eq!(budget.current_cpu, 0.0);
        assert_eq!(budget.current_memory, 0.0);
    }

    #[test]
    fn test_performance_running_means() {
        let mut profile = PerformanceProfile::default();

        profile.record(true, 5000, 5000, 2.0);
        assert_eq!(profile.tasks_completed, 1);
        assert_eq!(profile.average_time_ms, 5000.0);
        assert_eq!(profile.success_rate, 1.0);
        assert_eq!(profile.efficiency, 1.0);

        profile.record(false, 1000, 5000, 2.0);
        assert_eq!(profile.tasks_completed, 2);
        assert_eq!(profile.average_time_ms, 3000.0);
        assert_eq!(profile.success_rate, 0.5);
        // speed bonus capped at 2x
        assert_eq!(profile.efficiency, 1.0);
    }

    #[test]
    fn test_instant_run_earns_full_speed_bonus() {
        let mut profile = PerformanceProfile::default();
        profile.record(true, 0, 5000, 2.0);
        assert_eq!(profile.efficiency, 2.0);
    }

    #[test]
    fn test_capability_set_serializes_as_list() {
        let set: CapabilitySet = [Capability::Forecasting, Capability::DataAnalysis]
            .into_iter()
            .collect();
        let encoded = serde_json::to_string(&set).unwrap();
        assert_eq!(encoded, "[\"data_analysis\",\"forecasting\"]");
    }
}
