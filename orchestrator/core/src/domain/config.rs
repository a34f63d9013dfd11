// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator Configuration
//
// YAML document describing the scheduler cadence, worker fleet, and
// performance baselines. Loaded with the following precedence:
// - explicit path (`--config`)
// - SYNAPSE_CONFIG_PATH
// - ./synapse-config.yaml
// - ~/.synapse/config.yaml
// - /etc/synapse/config.yaml
// followed by SYNAPSE_* environment overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::task::TaskKind;
use crate::domain::worker::{Capability, WorkerArchetype};

pub const CONFIG_FILE_NAME: &str = "synapse-config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read or write config at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Scheduler tick period in milliseconds
    pub tick_interval_ms: u64,

    /// How long terminal tasks stay visible before they are purged
    pub retention_secs: u64,

    /// Baseline task duration for the worker efficiency speed factor
    pub expected_task_time_ms: u64,

    /// Upper bound on the efficiency speed factor
    pub speed_bonus_cap: f64,

    /// Elapsed time at which a running task's progress estimate saturates
    pub progress_horizon_ms: u64,

    pub event_bus_capacity: usize,

    /// Artificial latency applied by the built-in executors
    pub executor_delay_ms: u64,

    pub workers: Vec<WorkerArchetype>,

    /// Capability a worker must declare to take a task of the given kind.
    /// Kinds left out of the table can run on any idle worker with headroom.
    pub capability_requirements: BTreeMap<TaskKind, Capability>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            retention_secs: 3_600,
            expected_task_time_ms: 5_000,
            speed_bonus_cap: 2.0,
            progress_horizon_ms: 10_000,
            event_bus_capacity: 1_000,
            executor_delay_ms: 0,
            workers: WorkerArchetype::defaults(),
            capability_requirements: TaskKind::ALL
                .into_iter()
                .map(|kind| (kind, Capability::default_requirement(kind)))
                .collect(),
        }
    }
}

impl OrchestratorConfig {
    /// Never zero, so an interval timer can be built from it.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Saturates at the largest representable span.
    pub fn retention(&self) -> chrono::Duration {
        i64::try_from(self.retention_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::TimeDelta::MAX)
    }

    pub fn required_capability(&self, kind: TaskKind) -> Option<Capability> {
        self.capability_requirements.get(&kind).copied()
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml_string()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// First existing file in the discovery order, skipping the explicit path.
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SYNAPSE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from(format!("./{CONFIG_FILE_NAME}"));
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".synapse").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/synapse/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load with discovery, falling back to defaults. An explicit path must
    /// exist and parse.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_u64("SYNAPSE_TICK_INTERVAL_MS") {
            self.tick_interval_ms = value;
        }
        if let Some(value) = env_u64("SYNAPSE_RETENTION_SECS") {
            self.retention_secs = value;
        }
        if let Some(value) = env_u64("SYNAPSE_EXPECTED_TASK_TIME_MS") {
            self.expected_task_time_ms = value;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".into()));
        }
        if self.progress_horizon_ms == 0 {
            return Err(ConfigError::Invalid("progress_horizon_ms must be positive".into()));
        }
        if self.event_bus_capacity == 0 {
            return Err(ConfigError::Invalid("event_bus_capacity must be positive".into()));
        }
        if !self.speed_bonus_cap.is_finite() || self.speed_bonus_cap <= 0.0 {
            return Err(ConfigError::Invalid("speed_bonus_cap must be a positive number".into()));
        }
        if self.workers.is_empty() {
            return Err(ConfigError::Invalid("at least one worker archetype is required".into()));
        }

        let share = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        for archetype in &self.workers {
            if !share(archetype.max_cpu) || !share(archetype.max_memory) {
                return Err(ConfigError::Invalid(format!(
                    "worker '{}' resource ceilings must be within [0, 1]",
                    archetype.kind.as_str()
                )));
            }
            if archetype.replicas == 0 {
                return Err(ConfigError::Invalid(format!(
                    "worker '{}' must have at least one replica",
                    archetype.kind.as_str()
                )));
            }
        }

        for (kind, capability) in &self.capability_requirements {
            if !self.workers.iter().any(|w| w.capabilities.contains(*capability)) {
                tracing::warn!(
                    kind = kind.as_str(),
                    ?capability,
                    "No configured worker declares the capability this task kind requires"
                );
            }
        }

        Ok(())
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(value) => {
            tracing::info!("Environment override: {}={}", name, value);
            Some(value)
        }
        Err(_) => {
            tracing::warn!("Invalid value for {}: '{}'. Expected an integer. Ignoring.", name, raw);
            None
        }
    }
}
