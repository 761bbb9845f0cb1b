//! Implementation of the `foilopt report` command.

use anyhow::Result;
use clap::Args;
use console::style;

use super::open_database;
use crate::adapters::sqlite::SqliteRunRepository;
use crate::cli::id_resolver::resolve_run;
use crate::cli::output::{fmt_opt, output, CommandOutput};
use crate::domain::models::Config;
use crate::domain::ports::RunRepository;
use crate::services::RunReport;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Run id, id prefix, or session label
    pub run: String,
}

impl CommandOutput for RunReport {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Report for {} ({})", style(&self.session).bold(), self.run_id),
            format!("  status:        {} / {}", self.status, self.state),
        ];
        if let Some(reason) = &self.reason {
            lines.push(format!("  reason:        {reason}"));
        }
        lines.push(format!(
            "  evaluations:   {} in {} batches, {} feasible",
            self.evaluations, self.batches, self.feasible_count
        ));
        lines.push(format!("  constraints:   {}", self.constraints.join(", ")));
        lines.push(format!(
            "  satisfied:     {}",
            if self.constraint_satisfied {
                style("yes").green()
            } else {
                style("no").red()
            }
        ));
        lines.push(format!("  initial Cd:    {}", fmt_opt(self.initial_cd, 5)));
        lines.push(format!("  final Cd:      {}", fmt_opt(self.final_cd, 5)));
        lines.push(format!(
            "  improvement:   {}",
            self.improvement_pct
                .map_or_else(|| "-".to_string(), |p| format!("{p:.1}%"))
        ));
        if let Some(best) = &self.best {
            lines.push(format!(
                "  best design:   {} (iteration {})",
                best.geometry_id, best.iteration
            ));
            lines.push(format!("                 {}", best.parameters));
            lines.push(format!(
                "                 Cl {:.4}  Cd {:.5}  L/D {:.1}",
                best.lift, best.drag, best.lift_to_drag
            ));
        }
        if !self.failures.is_empty() {
            lines.push("  failures:".to_string());
            for (reason, count) in &self.failures {
                lines.push(format!("    {reason:<20} {count}"));
            }
        }
        lines.join("\n")
    }
}

pub async fn execute(args: ReportArgs, config: &Config, json_mode: bool) -> Result<()> {
    let pool = open_database(config).await?;
    let run = resolve_run(&pool, &args.run).await?;
    let history = SqliteRunRepository::new(pool).load_history(run.id).await?;
    output(&RunReport::build(&run, &history), json_mode);
    Ok(())
}
