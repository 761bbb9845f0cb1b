//! Command-line interface.

pub mod commands;
pub mod id_resolver;
pub mod output;

use clap::{Parser, Subcommand};
use console::style;

use commands::{
    history::HistoryArgs, init::InitArgs, report::ReportArgs, resume::ResumeArgs, run::RunArgs,
    runs::RunsArgs, tool::ToolArgs,
};

#[derive(Parser, Debug)]
#[command(name = "foilopt")]
#[command(about = "Constrained airfoil shape optimization against a CFD evaluator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output results as JSON
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .foilopt/ with a default config and an empty database
    Init(InitArgs),
    /// Start a new optimization run
    Run(RunArgs),
    /// Continue a suspended or interrupted run from its stored history
    Resume(ResumeArgs),
    /// List and inspect runs
    Runs(RunsArgs),
    /// Show the evaluation history of a run
    History(HistoryArgs),
    /// Summarize a run: best design, improvement, failure breakdown
    Report(ReportArgs),
    /// Execute one JSON tool request (generate, evaluate, propose_next)
    Tool(ToolArgs),
}

/// Print the error and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err}", style("Error:").red().bold());
        for cause in err.chain().skip(1) {
            eprintln!("  {} {cause}", style("caused by:").dim());
        }
    }
    std::process::exit(1)
}
