//! Command dispatch: each function builds the inputs a core crate's
//! public API needs and calls it directly — no flag does more than that
//! (SPEC_FULL.md §10.3).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use autospec_agent::AgentInvoker;
use autospec_artifact::ArtifactStore;
use autospec_config::types::{Configuration, Stage};
use autospec_dag::{
    build_schedule, merge_to_base, resolve_dag_id, DagExecutor, DagFile, DagRunOptions, MergeOptions, RunStateHandle,
};
use autospec_git::Git;
use autospec_orchestrator::{spec_ref, Pipeline};
use autospec_retry::RetryStore;

use crate::args::{DagMergeArgs, DagRunArgs, DagValidateArgs, RetryResetArgs, RunArgs};
use crate::exit_code;

pub async fn run(project_root: &Path, config: &Configuration, args: RunArgs) -> Result<i32> {
    let repo = Git::new(project_root.to_path_buf());
    let spec = spec_ref::resolve(&config.specs_root, args.spec.as_deref(), &repo)
        .await
        .context("resolving target spec")?;

    let only = parse_stages(&args.only)?;
    let artifacts = ArtifactStore::new();
    let retries = RetryStore::new(config.state_dir.join("retry"));
    let invoker = AgentInvoker::new();
    let pipeline = Pipeline::new(&artifacts, &retries, &invoker);

    match pipeline
        .run(project_root, &spec, only.as_deref(), config, CancellationToken::new())
        .await
    {
        Ok(outcome) => {
            tracing::info!(spec_id = %spec.id, stages = outcome.completed_stages.len(), "run complete");
            Ok(exit_code::SUCCESS)
        }
        Err(err) => {
            tracing::error!(spec_id = %spec.id, error = %err, "run failed");
            Ok(exit_code::for_orchestrator_error(&err))
        }
    }
}

pub async fn retry_reset(config: &Configuration, args: RetryResetArgs) -> Result<i32> {
    let retries = RetryStore::new(config.state_dir.join("retry"));
    match args.stage {
        Some(stage) => retries.reset(&args.spec, &stage).await?,
        None => retries.reset_all(&args.spec).await?,
    }
    Ok(exit_code::SUCCESS)
}

pub async fn dag_validate(args: DagValidateArgs) -> Result<i32> {
    let (dag_file, _) = load_workflow(&args.file)?;
    match build_schedule(&dag_file) {
        Ok(schedule) => {
            for (idx, layer) in schedule.iter().enumerate() {
                println!("layer {idx}: {}", layer.join(", "));
            }
            Ok(exit_code::SUCCESS)
        }
        Err(err) => {
            eprintln!("{err}");
            Ok(exit_code::VALIDATION_FAILED)
        }
    }
}

pub async fn dag_run(project_root: &Path, config: &Configuration, args: DagRunArgs) -> Result<i32> {
    let (dag_file, dag_id) = load_workflow(&args.file)?;
    let schedule = build_schedule(&dag_file)?;

    let cache_home = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
    let executor = DagExecutor::new(project_root.to_path_buf(), config, cache_home, None);

    let options = DagRunOptions {
        only: if args.only.is_empty() { None } else { Some(args.only) },
        clean: args.clean,
        fail_fast: args.fail_fast,
    };

    let outcome = match executor
        .run(&args.file, &dag_id, &dag_file, &schedule, config, options, CancellationToken::new())
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("{err}");
            return Ok(exit_code::for_dag_error(&err));
        }
    };

    for (spec_id, state) in &outcome.final_states {
        println!("{spec_id}: {:?}", state.status);
    }

    if outcome.stopped_early {
        Ok(exit_code::VALIDATION_FAILED)
    } else {
        Ok(exit_code::SUCCESS)
    }
}

pub async fn dag_merge(project_root: &Path, config: &Configuration, args: DagMergeArgs) -> Result<i32> {
    let (dag_file, dag_id) = load_workflow(&args.file)?;
    let schedule = build_schedule(&dag_file)?;

    let (_, run_state) = RunStateHandle::open(&args.file).await?;

    let primary = Git::new(project_root.to_path_buf());
    let options = MergeOptions {
        skip_no_commits: args.skip_no_commits,
        force: args.force,
    };

    match merge_to_base(
        &primary,
        &run_state,
        &dag_file,
        &dag_id,
        schedule.len(),
        &config.dag.base_branch,
        options,
    )
    .await
    {
        Ok(outcome) => {
            println!("merged {} into {}", outcome.merged_branch, config.dag.base_branch);
            if !outcome.skipped_specs.is_empty() {
                println!("skipped: {}", outcome.skipped_specs.join(", "));
            }
            Ok(exit_code::SUCCESS)
        }
        Err(err) => {
            eprintln!("{err}");
            Ok(exit_code::for_dag_error(&err))
        }
    }
}

fn load_workflow(path: &Path) -> Result<(DagFile, String)> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let dag_file = DagFile::parse(path, &contents)?;
    let dag_id = resolve_dag_id(&dag_file.dag, &std::collections::HashSet::new());
    Ok((dag_file, dag_id))
}

fn parse_stages(raw: &[String]) -> Result<Option<Vec<Stage>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let stages = raw
        .iter()
        .map(|s| parse_stage(s))
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(stages))
}

fn parse_stage(raw: &str) -> Result<Stage> {
    Stage::CANONICAL_ORDER
        .iter()
        .copied()
        .find(|stage| stage.as_str() == raw)
        .ok_or_else(|| anyhow::anyhow!("unknown stage '{raw}'"))
}

pub fn resolve_project_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("resolving current directory"),
    }
}
