// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Workload Files
//
// A workload is a YAML document of named tasks and decisions:
//
//   tasks:
//     - name: ingest
//       kind: analysis
//       priority: high
//       input: { data: [1, 2, 3] }
//     - name: forecast
//       kind: prediction
//       depends_on: [ingest]
//   decisions:
//     - context: scale for the evening peak
//       options:
//         - { id: scale-out, confidence: 0.9, impact: 0.8, cost: 0.3 }
//         - { id: wait, confidence: 0.6, impact: 0.2, cost: 0.0 }
//
// Dependencies refer to tasks declared earlier in the file, so the
// declaration order is always a valid submission order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use synapse_core::{
    DecisionOption, OptionScore, OrchestratorError, ResourceRequest, StaticScoringStrategy, TaskId, TaskKind,
    TaskOrchestrator, TaskPriority, TaskSpec,
};

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("Failed to read workload {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid workload YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Duplicate task name '{0}'")]
    DuplicateTask(String),

    #[error("Task '{task}' depends on '{dependency}', which is not declared before it")]
    UnknownDependency { task: String, dependency: String },

    #[error("Decision '{0}' has no options")]
    EmptyDecision(String),

    #[error("Option '{0}' is declared twice with different scores")]
    ConflictingScores(String),

    #[error("Task '{task}' was rejected: {source}")]
    Rejected {
        task: String,
        #[source]
        source: OrchestratorError,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workload {
    #[serde(default)]
    pub tasks: Vec<WorkloadTask>,
    #[serde(default)]
    pub decisions: Vec<WorkloadDecision>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadTask {
    pub name: String,
    pub kind: TaskKind,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default)]
    pub resources: ResourceRequest,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadDecision {
    pub context: String,
    pub options: Vec<WorkloadOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadOption {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "neutral")]
    pub confidence: f64,
    #[serde(default = "neutral")]
    pub impact: f64,
    #[serde(default = "neutral")]
    pub cost: f64,
}

fn neutral() -> f64 {
    0.5
}

impl WorkloadOption {
    fn score(&self) -> OptionScore {
        OptionScore::new(self.confidence, self.impact, self.cost)
    }
}

impl WorkloadDecision {
    pub fn options(&self) -> Vec<DecisionOption> {
        self.options
            .iter()
            .map(|o| DecisionOption::new(o.id.clone(), o.description.clone()))
            .collect()
    }
}

impl Workload {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, WorkloadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| WorkloadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, WorkloadError> {
        let workload: Workload = serde_yaml::from_str(yaml)?;
        workload.validate()?;
        Ok(workload)
    }

    pub fn validate(&self) -> Result<(), WorkloadError> {
        let mut declared: Vec<&str> = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            if declared.contains(&task.name.as_str()) {
                return Err(WorkloadError::DuplicateTask(task.name.clone()));
            }
            if let Some(missing) = task.depends_on.iter().find(|d| !declared.contains(&d.as_str())) {
                return Err(WorkloadError::UnknownDependency {
                    task: task.name.clone(),
                    dependency: missing.clone(),
                });
            }
            declared.push(&task.name);
        }

        for decision in &self.decisions {
            if decision.options.is_empty() {
                return Err(WorkloadError::EmptyDecision(decision.context.clone()));
            }
        }
        self.scoring().map(|_| ())
    }

    /// Score table for every option in the workload. The same option id may
    /// appear in several decisions only with the same scores.
    pub fn scoring(&self) -> Result<StaticScoringStrategy, WorkloadError> {
        let mut scores: HashMap<&str, OptionScore> = HashMap::new();
        for option in self.decisions.iter().flat_map(|d| &d.options) {
            let score = option.score();
            match scores.get(option.id.as_str()) {
                Some(existing) if *existing != score => {
                    return Err(WorkloadError::ConflictingScores(option.id.clone()));
                }
                _ => {
                    scores.insert(&option.id, score);
                }
            }
        }

        Ok(scores
            .into_iter()
            .fold(StaticScoringStrategy::default(), |strategy, (id, score)| {
                strategy.with_score(id, score)
            }))
    }

    /// Submit every task in declaration order. Returns the assigned ids in
    /// the same order, paired with the task names.
    pub fn submit(&self, orchestrator: &TaskOrchestrator) -> Result<Vec<(String, TaskId)>, WorkloadError> {
        let mut ids: HashMap<&str, TaskId> = HashMap::with_capacity(self.tasks.len());
        let mut submitted = Vec::with_capacity(self.tasks.len());

        for task in &self.tasks {
            let dependencies = task
                .depends_on
                .iter()
                .map(|name| {
                    ids.get(name.as_str()).copied().ok_or_else(|| WorkloadError::UnknownDependency {
                        task: task.name.clone(),
                        dependency: name.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let mut spec = TaskSpec::new(task.kind, task.priority)
                .with_description(task.description.clone())
                .with_input(task.input.clone())
                .depends_on(dependencies);
            spec.resources = task.resources;

            let id = orchestrator.submit_task(spec).map_err(|source| WorkloadError::Rejected {
                task: task.name.clone(),
                source,
            })?;
            ids.insert(&task.name, id);
            submitted.push((task.name.clone(), id));
        }

        Ok(submitted)
    }
}
