//! CLI command implementations and the wiring they share.

pub mod history;
pub mod init;
pub mod report;
pub mod resume;
pub mod run;
pub mod runs;
pub mod tool;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use console::style;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::adapters::solvers::{HttpCfdSolver, SurrogateSolver};
use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig};
use crate::application::{LoopEvent, OptimizationLoop};
use crate::cli::output::{fmt_opt, progress_bar};
use crate::domain::models::{
    Config, EvaluatorConfig, LoopState, RunConfig, RunOutcome, SolverBackend,
};
use crate::domain::ports::CfdSolver;
use crate::services::{EvaluatorGateway, RetryPolicy};

/// Open the project database; it must have been created by `foilopt init`.
pub async fn open_database(config: &Config) -> Result<SqlitePool> {
    let path = &config.database.path;
    if !Path::new(path).exists() {
        bail!("No database at {path}. Run 'foilopt init' first.");
    }
    initialize_database(
        &database_url(path),
        Some(PoolConfig::with_max_connections(config.database.max_connections)),
    )
    .await
    .with_context(|| format!("Failed to open database at {path}"))
}

pub fn build_solver(evaluator: &EvaluatorConfig, run: &RunConfig) -> Result<Arc<dyn CfdSolver>> {
    match evaluator.backend {
        SolverBackend::Surrogate => Ok(Arc::new(SurrogateSolver::new(
            run.seed,
            evaluator.surrogate_noise,
        ))),
        SolverBackend::Http => {
            let endpoint = evaluator
                .endpoint
                .as_deref()
                .context("evaluator.endpoint must be set for the http backend")?;
            let solver = HttpCfdSolver::new(
                endpoint,
                evaluator.requests_per_second,
                Duration::from_millis(run.evaluation_timeout_ms),
            )?;
            Ok(Arc::new(solver))
        }
    }
}

pub fn build_gateway(evaluator: &EvaluatorConfig, run: &RunConfig) -> Result<EvaluatorGateway> {
    let solver = build_solver(evaluator, run)?;
    Ok(EvaluatorGateway::new(
        solver,
        RetryPolicy::from_config(&evaluator.retry),
        run.reynolds,
    ))
}

/// Final summary printed by `run` and `resume`.
#[derive(Debug, Serialize)]
pub struct RunSummaryOutput {
    pub run_id: Uuid,
    pub session: Option<String>,
    pub state: LoopState,
    pub reason: String,
    pub batches: u32,
    pub evaluations: usize,
    pub best_geometry_id: Option<String>,
    pub best_cl: Option<f64>,
    pub best_cd: Option<f64>,
    pub best_parameters: Option<String>,
    pub persisted: bool,
}

impl RunSummaryOutput {
    pub fn new(outcome: &RunOutcome, session: Option<String>, persisted: bool) -> Self {
        let best = outcome.best.as_ref();
        Self {
            run_id: outcome.run_id,
            session,
            state: outcome.state,
            reason: outcome.reason.clone(),
            batches: outcome.batches,
            evaluations: outcome.evaluations,
            best_geometry_id: best.map(|r| r.geometry_id.clone()),
            best_cl: best.and_then(|r| r.outcome.lift()),
            best_cd: best.and_then(|r| r.outcome.drag()),
            best_parameters: best.map(|r| r.parameters.to_string()),
            persisted,
        }
    }
}

impl crate::cli::output::CommandOutput for RunSummaryOutput {
    fn to_human(&self) -> String {
        let state = match self.state {
            LoopState::Converged | LoopState::BudgetExhausted => style(self.state).green().bold(),
            LoopState::Idle => style(self.state).yellow().bold(),
            LoopState::Failed => style(self.state).red().bold(),
            _ => style(self.state).magenta().bold(),
        };
        let mut lines = vec![format!(
            "Run {} finished: {state}",
            self.session.as_deref().unwrap_or(&self.run_id.to_string())
        )];
        lines.push(format!("  reason:      {}", self.reason));
        lines.push(format!(
            "  evaluations: {} in {} batches",
            self.evaluations, self.batches
        ));
        match &self.best_geometry_id {
            Some(id) => {
                lines.push(format!("  best:        {id}"));
                lines.push(format!(
                    "               Cl {}  Cd {}",
                    fmt_opt(self.best_cl, 4),
                    fmt_opt(self.best_cd, 5)
                ));
                if let Some(params) = &self.best_parameters {
                    lines.push(format!("               {params}"));
                }
            }
            None => lines.push("  best:        no feasible design".to_string()),
        }
        if !self.persisted {
            lines.push(style("  (dry run: nothing was persisted)").dim().to_string());
        }
        if self.state == LoopState::Idle {
            lines.push(format!("\nResume with: foilopt resume {}", self.run_id));
        }
        lines.join("\n")
    }
}

/// Drive the loop to completion, showing progress unless `json_mode` and
/// turning Ctrl-C into a shutdown request at the next batch boundary.
pub async fn drive(
    optimizer: OptimizationLoop,
    total: usize,
    already_done: usize,
    json_mode: bool,
) -> Result<RunOutcome> {
    let (tx, rx) = mpsc::channel(256);
    let optimizer = optimizer.with_events(tx);

    let handle = optimizer.shutdown_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.shutdown();
        }
    });

    let progress = (!json_mode).then(|| spawn_progress(rx, total, already_done));

    let result = optimizer.run().await;
    drop(optimizer);
    interrupt.abort();
    if let Some(progress) = progress {
        let _ = progress.await;
    }
    Ok(result?)
}

fn spawn_progress(
    mut rx: mpsc::Receiver<LoopEvent>,
    total: usize,
    already_done: usize,
) -> JoinHandle<()> {
    let pb = progress_bar(total as u64);
    pb.set_position(already_done.min(total) as u64);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                LoopEvent::BatchStarted {
                    batch,
                    explore,
                    exploit,
                    ..
                } => pb.set_message(format!("batch {batch} ({explore} explore / {exploit} exploit)")),
                LoopEvent::CandidateEvaluated { .. } => pb.inc(1),
                LoopEvent::BatchCompleted(summary) => {
                    if let Some(cd) = summary.best_drag {
                        pb.set_message(format!("best Cd {cd:.5}"));
                    }
                }
                LoopEvent::Finished { state, .. } => {
                    pb.finish_with_message(state.to_string());
                    break;
                }
            }
        }
        if !pb.is_finished() {
            pb.abandon();
        }
    })
}

/// `run` and `resume` exit non-zero when the loop itself failed.
pub fn ensure_not_failed(outcome: &RunOutcome) -> Result<()> {
    if outcome.state == LoopState::Failed {
        bail!("Run {} failed: {}", outcome.run_id, outcome.reason);
    }
    Ok(())
}
