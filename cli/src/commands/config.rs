// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use synapse_core::domain::config::CONFIG_FILE_NAME;
use synapse_core::OrchestratorConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file populated with the defaults
    Generate {
        /// Output path (default: ./synapse-config.yaml)
        #[arg(short, long, default_value = CONFIG_FILE_NAME)]
        output: PathBuf,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output } => generate(output),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = OrchestratorConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. SYNAPSE_CONFIG_PATH: {}",
            std::env::var("SYNAPSE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./{}", CONFIG_FILE_NAME);
        println!("  4. ~/.synapse/config.yaml");
        println!("  5. /etc/synapse/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Scheduler:".bold());
    println!("  Tick interval: {}ms", config.tick_interval_ms);
    println!("  Retention: {}s", config.retention_secs);
    println!("  Expected task time: {}ms", config.expected_task_time_ms);
    println!("  Speed bonus cap: {}", config.speed_bonus_cap);
    println!("  Progress horizon: {}ms", config.progress_horizon_ms);
    println!("  Event bus capacity: {}", config.event_bus_capacity);
    println!();

    println!("{}", "Workers:".bold());
    for archetype in &config.workers {
        let capabilities: Vec<String> = archetype
            .capabilities
            .iter()
            .map(|c| format!("{c:?}"))
            .collect();
        println!(
            "  {} x{} (cpu {:.2}, memory {:.2})",
            archetype.kind.as_str().bold(),
            archetype.replicas,
            archetype.max_cpu,
            archetype.max_memory
        );
        println!("    Capabilities: {}", capabilities.join(", "));
    }
    println!();

    println!("{}", "Capability requirements:".bold());
    for (kind, capability) in &config.capability_requirements {
        println!("  {} → {:?}", kind.as_str(), capability);
    }

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = OrchestratorConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: PathBuf) -> Result<()> {
    OrchestratorConfig::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
