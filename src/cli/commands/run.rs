//! Implementation of the `foilopt run` command.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tracing::info;
use uuid::Uuid;

use super::{build_gateway, drive, ensure_not_failed, open_database, RunSummaryOutput};
use crate::adapters::geometry::NacaGeometryGenerator;
use crate::adapters::memory::InMemoryHistoryStore;
use crate::adapters::sqlite::{SqliteHistoryStore, SqliteRunRepository};
use crate::application::OptimizationLoop;
use crate::cli::output::output;
use crate::domain::models::{Config, OptimizationRun, RunConfig, SolverBackend};
use crate::domain::ports::{HistoryStore, RunRepository};
use crate::services::RetryPolicy;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Evaluate with the surrogate solver and keep history in memory only
    #[arg(long)]
    pub dry_run: bool,

    /// Seed for candidate generation (and the surrogate's noise)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Maximum number of evaluations
    #[arg(long)]
    pub budget: Option<usize>,

    /// Candidates per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Maximum concurrent solver calls
    #[arg(long)]
    pub max_in_flight: Option<usize>,
}

impl RunArgs {
    fn apply(&self, mut search: RunConfig) -> RunConfig {
        if let Some(seed) = self.seed {
            search.seed = seed;
        }
        if let Some(budget) = self.budget {
            search.budget = budget;
        }
        if let Some(batch_size) = self.batch_size {
            search.batch_size = batch_size;
        }
        if let Some(max_in_flight) = self.max_in_flight {
            search.max_in_flight = max_in_flight;
        }
        search
    }
}

pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let search = args.apply(config.search.clone());
    search.validate().context("Invalid search configuration")?;

    let mut evaluator = config.evaluator.clone();
    if args.dry_run {
        evaluator.backend = SolverBackend::Surrogate;
    }
    let gateway = Arc::new(build_gateway(&evaluator, &search)?);
    let geometry = Arc::new(NacaGeometryGenerator::default());
    let budget = search.budget;

    if args.dry_run {
        let store: Arc<dyn HistoryStore> = Arc::new(InMemoryHistoryStore::new(Uuid::new_v4()));
        info!(run_id = %store.run_id(), "dry run started");
        let optimizer = OptimizationLoop::new(search, geometry, gateway, store)?;
        let outcome = drive(optimizer, budget, 0, json_mode).await?;
        output(&RunSummaryOutput::new(&outcome, None, false), json_mode);
        return ensure_not_failed(&outcome);
    }

    let pool = open_database(config).await?;
    let runs = Arc::new(SqliteRunRepository::new(pool.clone()));
    let run = OptimizationRun::new(search.clone(), Utc::now());
    runs.create(&run).await.context("Failed to create run")?;
    info!(run_id = %run.id, session = %run.session, "run created");

    let store: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::new(pool, run.id));
    let optimizer = OptimizationLoop::new(search, geometry, gateway, store)?
        .with_run_repository(runs)
        .with_append_retry(RetryPolicy::from_config(&config.database.append_retry));
    let outcome = drive(optimizer, budget, 0, json_mode).await?;

    output(&RunSummaryOutput::new(&outcome, Some(run.session), true), json_mode);
    ensure_not_failed(&outcome)
}
