//! Implementation of the `foilopt history` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::open_database;
use crate::adapters::sqlite::SqliteRunRepository;
use crate::cli::id_resolver::resolve_run;
use crate::cli::output::{fmt_opt, list_table, output, render_list, CommandOutput};
use crate::domain::models::{Config, Constraint, HistoryRecord};
use crate::domain::ports::RunRepository;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Run id, id prefix, or session label
    pub run: String,

    /// Show only the most recent N records
    #[arg(long)]
    pub tail: Option<usize>,

    /// Show failed evaluations only
    #[arg(long)]
    pub failures: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryOutput {
    pub session: String,
    pub records: Vec<HistoryRecord>,
    #[serde(skip)]
    constraints: Vec<Constraint>,
}

impl CommandOutput for HistoryOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["iter", "batch", "geometry", "cl", "cd", "l/d", "result"]);
        for record in &self.records {
            let result = match record.outcome.failure {
                Some(reason) => reason.as_str().to_string(),
                None if record.is_feasible(&self.constraints) => "feasible".to_string(),
                None => "infeasible".to_string(),
            };
            table.add_row(vec![
                record.iteration.to_string(),
                record.batch.to_string(),
                record.geometry_id.clone(),
                fmt_opt(record.outcome.lift(), 4),
                fmt_opt(record.outcome.drag(), 5),
                fmt_opt(
                    record.outcome.coefficients.map(|c| c.lift_to_drag()),
                    1,
                ),
                result,
            ]);
        }
        format!(
            "History of {}\n{}",
            self.session,
            render_list("record", &table, self.records.len())
        )
    }
}

pub async fn execute(args: HistoryArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let run = resolve_run(&pool, &args.run).await?;
    let history = SqliteRunRepository::new(pool).load_history(run.id).await?;

    let mut records: Vec<HistoryRecord> = history
        .iter()
        .filter(|r| !args.failures || r.is_failure())
        .cloned()
        .collect();
    if let Some(tail) = args.tail {
        let skip = records.len().saturating_sub(tail);
        records.drain(..skip);
    }

    let out = HistoryOutput {
        session: run.session,
        records,
        constraints: run.config.constraints,
    };
    output(&out, json_mode);
    Ok(())
}
