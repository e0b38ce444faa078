//! CLI argument definitions (SPEC_FULL.md §10.3), mirroring the
//! structure of `cortex-cli/src/dag_cmd/args.rs`: one `Parser` per
//! command group, one `Subcommand` enum per group with subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "autospec",
    version,
    about = "Drive a spec-driven implementation pipeline, alone or across a dependency DAG."
)]
pub struct Cli {
    /// Project root to operate in (defaults to the current directory).
    #[arg(long, global = true)]
    pub project_root: Option<PathBuf>,

    /// Override the resolved agent command template.
    #[arg(long, global = true)]
    pub agent_command: Option<String>,

    /// Emit structured JSON logs instead of the human-formatted default.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Increase log verbosity (`-v` debug, `-vv` trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Human,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the canonical stage pipeline against one spec.
    Run(RunArgs),

    /// Retry-state management.
    #[command(subcommand)]
    Retry(RetryCommand),

    /// Multi-spec DAG workflow commands.
    Dag(DagArgs),
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Spec id or directory name. Defaults to the current branch's spec,
    /// or the most recently modified spec directory.
    pub spec: Option<String>,

    /// Restrict the run to these stages (still executed in canonical order).
    #[arg(long = "only", value_delimiter = ',')]
    pub only: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum RetryCommand {
    /// Clear retry-attempt history for a spec, or one stage of it.
    Reset(RetryResetArgs),
}

#[derive(Debug, Parser)]
pub struct RetryResetArgs {
    pub spec: String,
    pub stage: Option<String>,
}

#[derive(Debug, Parser)]
pub struct DagArgs {
    #[command(subcommand)]
    pub command: DagCommand,
}

#[derive(Debug, Subcommand)]
pub enum DagCommand {
    /// Parse and validate a workflow file without running it.
    Validate(DagValidateArgs),

    /// Schedule and run a workflow file.
    Run(DagRunArgs),

    /// Merge a completed workflow's final layer into its base branch.
    Merge(DagMergeArgs),
}

#[derive(Debug, Parser)]
pub struct DagValidateArgs {
    pub file: PathBuf,
}

#[derive(Debug, Parser)]
pub struct DagRunArgs {
    pub file: PathBuf,

    /// Limit the run to these spec ids (combine with `--clean` to retry
    /// a previously Failed spec).
    #[arg(long = "only", value_delimiter = ',')]
    pub only: Vec<String>,

    /// Discard a prior Failed status for specs named in `--only`.
    #[arg(long)]
    pub clean: bool,

    /// Stop launching new specs in a layer as soon as one fails.
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Debug, Parser)]
pub struct DagMergeArgs {
    pub file: PathBuf,

    /// Skip (rather than abort on) Completed specs with no verified commits.
    #[arg(long)]
    pub skip_no_commits: bool,

    /// Merge regardless of any spec's commit status.
    #[arg(long)]
    pub force: bool,
}
