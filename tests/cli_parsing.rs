use clap::Parser;

use foilopt::cli::commands::runs::RunsCommands;
use foilopt::cli::{Cli, Commands};

#[test]
fn test_parse_run_with_overrides() {
    let cli = Cli::try_parse_from([
        "foilopt", "run", "--dry-run", "--seed", "9", "--budget", "24", "--batch-size", "6",
    ])
    .unwrap();

    match cli.command {
        Commands::Run(args) => {
            assert!(args.dry_run);
            assert_eq!(args.seed, Some(9));
            assert_eq!(args.budget, Some(24));
            assert_eq!(args.batch_size, Some(6));
            assert_eq!(args.max_in_flight, None);
        }
        other => panic!("Wrong command: {other:?}"),
    }
    assert!(!cli.json);
}

#[test]
fn test_json_flag_is_global() {
    let cli = Cli::try_parse_from(["foilopt", "report", "3f2a", "--json"]).unwrap();
    assert!(cli.json);
    match cli.command {
        Commands::Report(args) => assert_eq!(args.run, "3f2a"),
        other => panic!("Wrong command: {other:?}"),
    }
}

#[test]
fn test_parse_runs_list_and_show() {
    let cli = Cli::try_parse_from(["foilopt", "runs", "list", "--status", "suspended"]).unwrap();
    match cli.command {
        Commands::Runs(args) => match args.command {
            RunsCommands::List { status, limit } => {
                assert_eq!(status.as_deref(), Some("suspended"));
                assert_eq!(limit, 20);
            }
            other => panic!("Wrong runs command: {other:?}"),
        },
        other => panic!("Wrong command: {other:?}"),
    }

    let cli = Cli::try_parse_from(["foilopt", "runs", "show", "opt-20260101-120000-abcd1234"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Runs(args) if matches!(args.command, RunsCommands::Show { .. })
    ));
}

#[test]
fn test_parse_history_filters() {
    let cli = Cli::try_parse_from(["foilopt", "history", "abc", "--tail", "5", "--failures"]).unwrap();
    match cli.command {
        Commands::History(args) => {
            assert_eq!(args.tail, Some(5));
            assert!(args.failures);
        }
        other => panic!("Wrong command: {other:?}"),
    }
}

#[test]
fn test_parse_tool_from_file() {
    let cli = Cli::try_parse_from(["foilopt", "tool", "--file", "request.json"]).unwrap();
    match cli.command {
        Commands::Tool(args) => assert_eq!(args.file.unwrap().to_str(), Some("request.json")),
        other => panic!("Wrong command: {other:?}"),
    }
}

#[test]
fn test_resume_requires_run() {
    assert!(Cli::try_parse_from(["foilopt", "resume"]).is_err());
    assert!(Cli::try_parse_from(["foilopt", "launch"]).is_err());
}
