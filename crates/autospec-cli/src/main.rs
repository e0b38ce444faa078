//! `autospec` CLI entry point (SPEC_FULL.md §10.3): thin argument
//! parsing and dispatch into the orchestrator and DAG executor. No
//! business logic lives here; every subcommand is a few lines of glue
//! around a public core function.

mod args;
mod commands;
mod exit_code;
mod logging;

use anyhow::Result;
use clap::Parser;

use args::{Cli, Command, DagCommand, LogFormatArg};
use autospec_config::types::LogFormat;
use autospec_config::ConfigOverrides;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_root = commands::resolve_project_root(cli.project_root.clone())?;

    let log_format = cli.log_format.map(|f| match f {
        LogFormatArg::Human => LogFormat::Human,
        LogFormatArg::Json => LogFormat::Json,
    });

    let overrides = ConfigOverrides {
        project_root: Some(project_root.clone()),
        agent_command: cli.agent_command.clone(),
        log_format,
        ..Default::default()
    };
    let config = autospec_config::load(&project_root, overrides)?;

    logging::init(cli.verbose, config.log_format);

    let code = match cli.command {
        Command::Run(args) => commands::run(&project_root, &config, args).await?,
        Command::Retry(args::RetryCommand::Reset(args)) => commands::retry_reset(&config, args).await?,
        Command::Dag(dag) => match dag.command {
            DagCommand::Validate(args) => commands::dag_validate(args).await?,
            DagCommand::Run(args) => commands::dag_run(&project_root, &config, args).await?,
            DagCommand::Merge(args) => commands::dag_merge(&project_root, &config, args).await?,
        },
    };

    std::process::exit(code);
}
