// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workload execution
//!
//! Builds an in-process engine (memory graph, orchestrator, decision engine),
//! submits a workload, runs the scheduler until nothing can make further
//! progress, then prints a summary.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use synapse_core::{
    builtin_registry, Decision, DecisionEngine, OrchestratorConfig, OrchestratorStatus, Task, TaskId,
    TaskOrchestrator, TaskStatus,
};
use synapse_cortex::{GraphSnapshot, MemoryGraph};

use crate::workload::Workload;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Workload file (YAML)
    #[arg(short, long, value_name = "FILE")]
    pub workload: PathBuf,

    /// Write a memory graph snapshot to this file when the run ends
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Cancel unfinished tasks after this many seconds
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,
}

/// Everything a finished run leaves behind.
#[derive(Debug)]
pub struct RunOutcome {
    /// Workload task names with their final state. `None` once purged.
    pub tasks: Vec<(String, Option<Task>)>,
    pub decisions: Vec<Decision>,
    pub status: OrchestratorStatus,
    pub snapshot: GraphSnapshot,
    pub timed_out: bool,
}

pub async fn handle_command(args: RunArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = OrchestratorConfig::load_or_default(config_override).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let workload = Workload::from_yaml_file(&args.workload)
        .with_context(|| format!("Failed to load workload {:?}", args.workload))?;

    let outcome = execute(config, &workload, Duration::from_secs(args.timeout_secs)).await?;
    print_summary(&outcome);

    if let Some(path) = &args.snapshot {
        synapse_cortex::infrastructure::write_snapshot(&outcome.snapshot, path)
            .with_context(|| format!("Failed to write snapshot to {:?}", path))?;
        println!(
            "{}",
            format!("✓ Memory snapshot written: {}", path.display()).green()
        );
    }

    if outcome.timed_out {
        bail!("Workload did not finish within {}s", args.timeout_secs);
    }
    Ok(())
}

/// Run a workload against a fresh engine. Decisions are made concurrently
/// with task execution.
pub async fn execute(config: OrchestratorConfig, workload: &Workload, timeout: Duration) -> Result<RunOutcome> {
    let memory = Arc::new(MemoryGraph::new());
    let executors = builtin_registry(Duration::from_millis(config.executor_delay_ms));
    let tick = config.tick_interval();
    let orchestrator = TaskOrchestrator::new(config, memory.clone(), executors);
    let engine = DecisionEngine::new(memory.clone(), Arc::new(workload.scoring()?), orchestrator.event_bus());

    let mut events = orchestrator.event_bus().subscribe();
    let submitted = workload.submit(&orchestrator)?;
    info!(
        tasks = submitted.len(),
        decisions = workload.decisions.len(),
        "Workload submitted"
    );

    let scheduler = orchestrator.clone().run();

    let decisions = try_join_all(
        workload
            .decisions
            .iter()
            .map(|d| engine.decide(&d.context, d.options())),
    )
    .await
    .context("Decision failed")?;

    let timed_out = tokio::time::timeout(timeout, async {
        while !settle(&orchestrator) {
            tokio::select! {
                _ = events.recv() => {}
                _ = tokio::time::sleep(tick) => {}
            }
        }
    })
    .await
    .is_err();

    if timed_out {
        warn!(timeout_ms = timeout.as_millis() as u64, "Workload timed out, cancelling unfinished tasks");
        for task in orchestrator.list_tasks().iter().filter(|t| !t.is_terminal()) {
            if let Err(e) = orchestrator.cancel_task(task.id) {
                warn!(task_id = %task.id, error = %e, "Failed to cancel task");
            }
        }
    }

    orchestrator.shutdown_token().cancel();
    scheduler.await.context("Scheduler loop terminated abnormally")?;
    orchestrator.drain().await;

    Ok(RunOutcome {
        tasks: submitted
            .into_iter()
            .map(|(name, id)| (name, orchestrator.get_task(id)))
            .collect(),
        decisions,
        status: orchestrator.status(),
        snapshot: memory.snapshot(),
        timed_out,
    })
}

/// True once no task can make further progress. Pending tasks stuck behind a
/// failed or cancelled dependency are cancelled along the way.
fn settle(orchestrator: &TaskOrchestrator) -> bool {
    let tasks = orchestrator.list_tasks();
    let statuses: HashMap<TaskId, TaskStatus> = tasks.iter().map(|t| (t.id, t.status)).collect();

    let mut settled = true;
    for task in &tasks {
        match task.status {
            TaskStatus::Running => settled = false,
            TaskStatus::Pending => {
                let blocked = task
                    .dependencies
                    .iter()
                    .any(|d| matches!(statuses.get(d), Some(TaskStatus::Failed | TaskStatus::Cancelled)));
                if !blocked {
                    settled = false;
                } else if let Err(e) = orchestrator.cancel_task(task.id) {
                    warn!(task_id = %task.id, error = %e, "Failed to cancel blocked task");
                    settled = false;
                } else {
                    warn!(task_id = %task.id, "Dependency did not complete, task cancelled");
                }
            }
            _ => {}
        }
    }
    settled
}

fn print_summary(outcome: &RunOutcome) {
    println!();
    println!("{}", "Tasks:".bold());
    for (name, task) in &outcome.tasks {
        match task {
            Some(task) => {
                let status = match task.status {
                    TaskStatus::Completed => "completed".green(),
                    TaskStatus::Failed => "failed".red(),
                    TaskStatus::Cancelled => "cancelled".yellow(),
                    TaskStatus::Running => "running".dimmed(),
                    TaskStatus::Pending => "pending".dimmed(),
                };
                println!(
                    "  {:<20} {:<13} {:<10} {}ms",
                    name.bold(),
                    task.kind.as_str(),
                    status,
                    task.elapsed_ms()
                );
                if let Some(error) = &task.error {
                    println!("    {}", error.red());
                }
            }
            None => println!("  {:<20} {}", name.bold(), "(purged)".dimmed()),
        }
    }

    if !outcome.decisions.is_empty() {
        println!();
        println!("{}", "Decisions:".bold());
        for decision in &outcome.decisions {
            let combined = decision.selected_option().map(|o| o.combined).unwrap_or_default();
            println!("  {} → {} ({:.2})", decision.context, decision.selected.bold(), combined);
        }
    }

    let status = &outcome.status;
    println!();
    println!("{}", "Status:".bold());
    println!(
        "  Tasks: {} completed, {} failed, {} cancelled",
        status.tasks.completed, status.tasks.failed, status.tasks.cancelled
    );
    println!(
        "  Workers: {} total, {} idle, {} busy, {} error, {} offline",
        status.workers.total, status.workers.idle, status.workers.busy, status.workers.error, status.workers.offline
    );
    println!("  Memory: {} nodes, {} edges", status.memory.nodes, status.memory.edges);
}
