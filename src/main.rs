//! foilopt CLI entry point.

use clap::Parser;

use foilopt::cli::{commands, handle_error, Cli, Commands};
use foilopt::infrastructure::config::ConfigLoader;
use foilopt::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli.command, cli.json).await {
        handle_error(err, cli.json);
    }
}

async fn run(command: Commands, json: bool) -> anyhow::Result<()> {
    // Missing config files fall back to defaults, so this also works before `init`.
    let config = ConfigLoader::load()?;
    let _logger = LoggerImpl::init(&LogConfig::from_settings(&config.logging)?)?;

    match command {
        Commands::Init(args) => commands::init::execute(args, json).await,
        Commands::Run(args) => commands::run::execute(args, &config, json).await,
        Commands::Resume(args) => commands::resume::execute(args, &config, json).await,
        Commands::Runs(args) => commands::runs::execute(args, &config, json).await,
        Commands::History(args) => commands::history::execute(args, &config, json).await,
        Commands::Report(args) => commands::report::execute(args, &config, json).await,
        Commands::Tool(args) => commands::tool::execute(args, &config).await,
    }
}
