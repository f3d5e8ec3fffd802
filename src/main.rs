//! CLI entry point for pinfetch.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod cli;
mod commands;
mod config;
mod logging;

use cli::{Cli, Command};
use config::{LoadedConfig, Settings, TOKEN_ENV_VAR};

/// Process outcome mapped to an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    Success,
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::from(1),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    match run(cli).await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ProcessExit> {
    if let Command::Init(args) = &cli.command {
        logging::init_tracing(&logging::default_level(cli.quiet, cli.verbose, None), None)?;
        let path = cli
            .config
            .clone()
            .or_else(config::resolve_default_config_path);
        return commands::run_init_command(path.as_deref(), args);
    }

    let loaded: LoadedConfig = config::load_config(cli.config.as_deref())?;
    let settings = Settings::resolve(&loaded, std::env::var(TOKEN_ENV_VAR).ok());

    let level = logging::default_level(cli.quiet, cli.verbose, settings.log_level.as_deref());
    logging::init_tracing(&level, settings.log_file.as_deref())?;
    debug!(
        config = ?loaded.path,
        loaded_from_file = loaded.loaded_from_file,
        "configuration resolved"
    );

    match cli.command {
        Command::Init(_) => Ok(ProcessExit::Success),
        Command::Watch(args) => commands::run_watch_command(&settings, args.force).await,
        Command::RunOnce(args) => {
            commands::run_once_command(&settings, &args.url, args.force.force).await
        }
        Command::Status => commands::run_status_command(&settings),
        Command::History(args) => {
            commands::run_history_command(&settings, args.human, args.failed_only)
        }
        Command::RemoveHistory(args) => {
            commands::run_remove_history_command(&settings, args.url.as_deref(), args.all)
        }
    }
}
