//! Implementation of the `foilopt runs` commands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use super::open_database;
use crate::adapters::sqlite::SqliteRunRepository;
use crate::cli::id_resolver::resolve_run;
use crate::cli::output::{fmt_opt, list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{Config, IterationSummary, OptimizationRun, RunStatus};
use crate::domain::ports::{RunFilter, RunRepository};

#[derive(Args, Debug)]
pub struct RunsArgs {
    #[command(subcommand)]
    pub command: RunsCommands,
}

#[derive(Subcommand, Debug)]
pub enum RunsCommands {
    /// List runs, newest first
    List {
        /// Filter by status (running, suspended, completed, failed)
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show a run's settings and per-batch progress
    Show {
        /// Run id, id prefix, or session label
        run: String,
    },
}

#[derive(Debug, Serialize)]
pub struct RunListOutput {
    pub runs: Vec<OptimizationRun>,
    pub total: usize,
}

impl CommandOutput for RunListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "session", "status", "state", "budget", "created"]);
        for run in &self.runs {
            table.add_row(vec![
                run.id.to_string()[..8].to_string(),
                run.session.clone(),
                run.status.to_string(),
                run.state.to_string(),
                run.config.budget.to_string(),
                run.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]);
        }
        render_list("run", &table, self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct RunDetailOutput {
    pub run: OptimizationRun,
    pub summaries: Vec<IterationSummary>,
}

impl CommandOutput for RunDetailOutput {
    fn to_human(&self) -> String {
        let run = &self.run;
        let mut lines = vec![
            format!("Run:        {}", run.id),
            format!("Session:    {}", run.session),
            format!("Status:     {} ({})", run.status, run.state),
        ];
        if let Some(reason) = &run.reason {
            lines.push(format!("Reason:     {reason}"));
        }
        lines.push(format!(
            "Search:     budget {}, batch {}, seed {}, Re {:.0}",
            run.config.budget, run.config.batch_size, run.config.seed, run.config.reynolds
        ));
        for constraint in &run.config.constraints {
            lines.push(format!("Constraint: {constraint}"));
        }
        lines.push(format!("Created:    {}", run.created_at.to_rfc3339()));
        if let Some(done) = run.completed_at {
            lines.push(format!("Completed:  {}", done.to_rfc3339()));
        }

        if !self.summaries.is_empty() {
            let mut table = list_table(&[
                "batch", "evals", "feasible", "failures", "explore", "exploit", "radius", "best cd", "best",
            ]);
            for s in &self.summaries {
                table.add_row(vec![
                    s.batch.to_string(),
                    s.evaluated.to_string(),
                    s.feasible.to_string(),
                    s.failures.to_string(),
                    s.explore_count.to_string(),
                    s.exploit_count.to_string(),
                    fmt_opt(s.trust_radius, 3),
                    fmt_opt(s.best_drag, 5),
                    truncate(s.best_geometry_id.as_deref().unwrap_or("-"), 24),
                ]);
            }
            lines.push(String::new());
            lines.push(table.to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: RunsArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let repo = SqliteRunRepository::new(pool.clone());

    match args.command {
        RunsCommands::List { status, limit } => {
            let status = status
                .map(|s| {
                    RunStatus::from_str(&s).ok_or_else(|| anyhow!("Unknown run status '{s}'"))
                })
                .transpose()?;
            let runs = repo
                .list(RunFilter {
                    status,
                    limit: Some(limit),
                })
                .await?;
            let total = runs.len();
            output(&RunListOutput { runs, total }, json_mode);
        }
        RunsCommands::Show { run } => {
            let run = resolve_run(&pool, &run).await?;
            let summaries = repo.summaries(run.id).await?;
            output(&RunDetailOutput { run, summaries }, json_mode);
        }
    }
    Ok(())
}
