//! Implementation of the `foilopt resume` command.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use super::{build_gateway, drive, ensure_not_failed, open_database, RunSummaryOutput};
use crate::adapters::geometry::NacaGeometryGenerator;
use crate::adapters::sqlite::{SqliteHistoryStore, SqliteRunRepository};
use crate::application::OptimizationLoop;
use crate::cli::id_resolver::resolve_run;
use crate::cli::output::output;
use crate::domain::models::Config;
use crate::domain::ports::{HistoryStore, RunRepository};
use crate::services::RetryPolicy;

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Run id, id prefix, or session label
    pub run: String,
}

pub async fn execute(args: ResumeArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let run = resolve_run(&pool, &args.run).await?;
    if !run.status.is_resumable() {
        bail!(
            "Run {} is {} and cannot be resumed",
            run.session,
            run.status
        );
    }

    let runs = Arc::new(SqliteRunRepository::new(pool.clone()));
    let existing = runs
        .load_history(run.id)
        .await
        .context("Failed to load run history")?
        .len();
    info!(run_id = %run.id, existing, "resuming run");

    // Search settings come from the run, not the current project config.
    let gateway = Arc::new(build_gateway(&config.evaluator, &run.config)?);
    let store: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::new(pool, run.id));
    let optimizer = OptimizationLoop::new(
        run.config.clone(),
        Arc::new(NacaGeometryGenerator::default()),
        gateway,
        store,
    )?
    .with_run_repository(runs)
    .with_append_retry(RetryPolicy::from_config(&config.database.append_retry));

    let outcome = drive(optimizer, run.config.budget, existing, json_mode).await?;
    output(&RunSummaryOutput::new(&outcome, Some(run.session), true), json_mode);
    ensure_not_failed(&outcome)
}
