//! The DAG executor (spec.md §4.9): runs a scheduled workflow layer by
//! layer, bounding per-layer concurrency, provisioning worktrees,
//! invoking the single-spec pipeline inside each one, verifying and
//! merging commits into the layer's staging branch, and persisting
//! resumable run state throughout.
//!
//! Grounded on `cortex-cli::dag_cmd::scheduler::DagScheduler::run_parallel`
//! for the bounded-concurrency shape; reimplemented with
//! `futures::stream::buffer_unordered` instead of semaphore-gated
//! `tokio::spawn`, since every per-spec unit of work here is a single
//! `&self` async call rather than an independently owned task.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use autospec_artifact::ArtifactStore;
use autospec_agent::AgentInvoker;
use autospec_config::types::Configuration;
use autospec_git::{CreateOptions, Git, WorktreeManager, WorktreeRecord};
use autospec_orchestrator::{Pipeline, SpecRef};
use autospec_retry::RetryStore;

use crate::commit_recovery::{recover, RecoveryContext};
use crate::error::Result;
use crate::log_store::{self, SpecLog};
use crate::run_state::{CommitStatus, DagRunState, RunStateHandle, SpecRunState, SpecStatus};
use crate::workflow::DagFile;

#[derive(Debug, Clone, Default)]
pub struct DagRunOptions {
    /// Limit to these spec ids; combined with `clean`, allows retrying
    /// a spec previously marked `Failed`.
    pub only: Option<Vec<String>>,
    pub clean: bool,
    pub fail_fast: bool,
}

#[derive(Debug, Clone)]
pub struct DagRunOutcome {
    pub dag_id: String,
    pub final_states: HashMap<String, SpecRunState>,
    pub stopped_early: bool,
}

pub struct DagExecutor {
    project_root: PathBuf,
    worktree_manager: WorktreeManager,
    artifacts: ArtifactStore,
    retries: RetryStore,
    invoker: AgentInvoker,
    cache_home: PathBuf,
    project_id: String,
    staging_lock: Mutex<()>,
}

impl DagExecutor {
    pub fn new(project_root: PathBuf, config: &Configuration, cache_home: PathBuf, remote_url: Option<&str>) -> Self {
        let worktree_manager = WorktreeManager::new(
            Git::new(project_root.clone()),
            config.state_dir.join("worktrees.yaml"),
            to_git_worktree_config(&config.worktree),
        );
        let project_id = log_store::project_id(&project_root, remote_url);

        Self {
            project_root,
            worktree_manager,
            artifacts: ArtifactStore::new(),
            retries: RetryStore::new(config.state_dir.join("retry")),
            invoker: AgentInvoker::new(),
            cache_home,
            project_id,
            staging_lock: Mutex::new(()),
        }
    }

    /// Run (or resume) a scheduled workflow to completion or to its
    /// first stopping point.
    pub async fn run(
        &self,
        workflow_path: &Path,
        dag_id: &str,
        dag_file: &DagFile,
        schedule: &[Vec<String>],
        config: &Configuration,
        options: DagRunOptions,
        cancel: CancellationToken,
    ) -> Result<DagRunOutcome> {
        let (run_state, _initial) = RunStateHandle::open(workflow_path).await?;
        run_state.reset_interrupted().await?;

        let base_branch = dag_file
            .execution
            .base_branch
            .clone()
            .unwrap_or_else(|| config.dag.base_branch.clone());
        let max_parallel = dag_file.execution.max_parallel.unwrap_or(config.dag.max_parallel).max(1);
        let fail_fast = options.fail_fast || dag_file.execution.fail_fast.unwrap_or(false);

        let staging = self.ensure_staging_worktree(dag_id, &base_branch).await?;

        let mut previous_branch = base_branch;
        let mut stopped_early = false;

        for (layer_idx, spec_ids) in schedule.iter().enumerate() {
            if stopped_early {
                for spec_id in spec_ids {
                    self.mark_blocked_if_pending(&run_state, spec_id).await?;
                }
                continue;
            }

            let stage_branch = format!("dag/{dag_id}/stage-L{layer_idx}");
            self.ensure_layer_branch(&staging, &stage_branch, &previous_branch).await?;

            let layer_failed = self
                .run_layer(
                    dag_id,
                    spec_ids,
                    &stage_branch,
                    &staging,
                    &run_state,
                    config,
                    &options,
                    fail_fast,
                    max_parallel,
                    cancel.clone(),
                )
                .await?;

            previous_branch = stage_branch;
            if layer_failed {
                stopped_early = true;
            }
        }

        let final_states = self.collect_states(&run_state, dag_file).await;
        Ok(DagRunOutcome {
            dag_id: dag_id.to_string(),
            final_states,
            stopped_early,
        })
    }

    async fn run_layer(
        &self,
        dag_id: &str,
        spec_ids: &[String],
        stage_branch: &str,
        staging: &Git,
        run_state: &RunStateHandle,
        config: &Configuration,
        options: &DagRunOptions,
        fail_fast: bool,
        max_parallel: usize,
        cancel: CancellationToken,
    ) -> Result<bool> {
        let failed_flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));

        let results: Vec<bool> = stream::iter(spec_ids.iter().cloned())
            .map(|spec_id| {
                let failed_flag = failed_flag.clone();
                let cancel = cancel.clone();
                async move {
                    if self.should_skip(run_state, &spec_id, options).await.unwrap_or(false) {
                        return true;
                    }

                    if fail_fast && failed_flag.load(std::sync::atomic::Ordering::SeqCst) {
                        let _ = self.mark_skipped(run_state, &spec_id).await;
                        return false;
                    }

                    let ok = self
                        .run_one_spec(dag_id, &spec_id, stage_branch, staging, run_state, config, cancel)
                        .await
                        .unwrap_or(false);

                    if !ok {
                        failed_flag.store(true, std::sync::atomic::Ordering::SeqCst);
                    }
                    ok
                }
            })
            .buffer_unordered(max_parallel)
            .collect()
            .await;

        Ok(results.iter().any(|ok| !ok))
    }

    async fn run_one_spec(
        &self,
        dag_id: &str,
        spec_id: &str,
        stage_branch: &str,
        staging: &Git,
        run_state: &RunStateHandle,
        config: &Configuration,
        cancel: CancellationToken,
    ) -> Result<bool> {
        let branch = format!("dag/{dag_id}/{spec_id}");
        let worktree_name = format!("{dag_id}-{spec_id}");
        let record = self.ensure_worktree(&worktree_name, &branch, stage_branch).await?;
        let worktree_git = Git::new(record.path.clone());

        let log_path = self.log_path_for(dag_id, spec_id);
        let log = SpecLog::new(log_path.clone(), config.dag.max_log_size);
        let mut state = SpecRunState {
            status: SpecStatus::Running,
            worktree_path: Some(record.path.clone()),
            branch: Some(branch.clone()),
            log_path: Some(log_path),
            ..SpecRunState::default()
        };
        run_state.set(spec_id, state.clone()).await?;
        let _ = log
            .append(&format!("starting in worktree {}", record.path.display()))
            .await;

        let scoped_config = self.worktree_scoped_config(config, &record.path);
        let spec_ref = SpecRef {
            id: spec_id.to_string(),
            dir: scoped_config.specs_root.join(spec_id),
        };

        let pipeline = Pipeline::new(&self.artifacts, &self.retries, &self.invoker);
        if let Err(err) = pipeline.run(&record.path, &spec_ref, None, &scoped_config, cancel.clone()).await {
            let _ = log.append(&format!("pipeline failed: {err}")).await;
            state.status = SpecStatus::Failed;
            state.attempt_count += 1;
            state.updated_at = chrono::Utc::now();
            run_state.set(spec_id, state).await?;
            return Ok(false);
        }
        let _ = log.append("pipeline complete, verifying commits").await;

        let ctx = RecoveryContext {
            spec_id,
            worktree: &record.path,
            branch: &branch,
            base_branch: stage_branch,
            dag_id,
        };
        let verification = recover(
            &worktree_git,
            &ctx,
            &config.dag,
            &config.agent_command,
            &self.invoker,
            cancel,
        )
        .await?;

        if !verification.passed() {
            let _ = log.append("commit verification failed").await;
            state.status = SpecStatus::Failed;
            state.commit_status = CommitStatus::Failed;
            state.attempt_count += 1;
            state.updated_at = chrono::Utc::now();
            run_state.set(spec_id, state).await?;
            return Ok(false);
        }

        state.commit_status = CommitStatus::Committed;
        state.commit_sha = Some(verification.head_sha.clone());

        {
            let _guard = self.staging_lock.lock().await;
            staging.merge(&branch, &format!("merge {spec_id} into {stage_branch}")).await?;
        }

        state.status = SpecStatus::Completed;
        state.updated_at = chrono::Utc::now();
        run_state.set(spec_id, state).await?;
        let _ = log.append(&format!("merged into {stage_branch}")).await;

        Ok(true)
    }

    async fn ensure_worktree(&self, name: &str, branch: &str, base_branch: &str) -> Result<WorktreeRecord> {
        if let Some(existing) = self.worktree_manager.list().await?.into_iter().find(|w| w.name == name) {
            return Ok(existing);
        }
        Ok(self
            .worktree_manager
            .create(name, branch, base_branch, CreateOptions::default())
            .await?)
    }

    async fn ensure_staging_worktree(&self, dag_id: &str, base_branch: &str) -> Result<Git> {
        let name = format!("{dag_id}-stage");
        let initial_branch = format!("dag/{dag_id}/stage-L0");
        let record = self.ensure_worktree(&name, &initial_branch, base_branch).await?;
        Ok(Git::new(record.path))
    }

    async fn ensure_layer_branch(&self, staging: &Git, stage_branch: &str, base: &str) -> Result<()> {
        let _guard = self.staging_lock.lock().await;
        if staging.branch_exists(stage_branch).await {
            staging.checkout(stage_branch).await?;
        } else {
            staging.checkout_new_branch(stage_branch, base).await?;
        }
        Ok(())
    }

    async fn should_skip(&self, run_state: &RunStateHandle, spec_id: &str, options: &DagRunOptions) -> Result<bool> {
        let snapshot = run_state.snapshot().await?;
        let state = snapshot.get(spec_id);
        Ok(match state.status {
            SpecStatus::Completed | SpecStatus::Skipped => true,
            SpecStatus::Failed => {
                let retry_requested = options
                    .only
                    .as_ref()
                    .map(|only| only.iter().any(|s| s == spec_id))
                    .unwrap_or(false);
                !(retry_requested && options.clean)
            }
            SpecStatus::Pending | SpecStatus::Running | SpecStatus::Blocked => false,
        })
    }

    async fn mark_skipped(&self, run_state: &RunStateHandle, spec_id: &str) -> Result<()> {
        let mut state = run_state.snapshot().await?.get(spec_id);
        state.status = SpecStatus::Skipped;
        state.updated_at = chrono::Utc::now();
        run_state.set(spec_id, state).await
    }

    async fn mark_blocked_if_pending(&self, run_state: &RunStateHandle, spec_id: &str) -> Result<()> {
        let mut state = run_state.snapshot().await?.get(spec_id);
        if matches!(state.status, SpecStatus::Pending) {
            state.status = SpecStatus::Blocked;
            state.updated_at = chrono::Utc::now();
            run_state.set(spec_id, state).await?;
        }
        Ok(())
    }

    async fn collect_states(&self, run_state: &RunStateHandle, dag_file: &DagFile) -> HashMap<String, SpecRunState> {
        let snapshot: DagRunState = run_state.snapshot().await.unwrap_or_default();
        dag_file
            .feature_ids()
            .into_iter()
            .map(|id| (id.to_string(), snapshot.get(id)))
            .collect()
    }

    fn log_path_for(&self, dag_id: &str, spec_id: &str) -> PathBuf {
        log_store::log_path(&self.cache_home, &self.project_id, dag_id, spec_id)
    }

    fn worktree_scoped_config(&self, config: &Configuration, worktree_path: &Path) -> Configuration {
        let mut scoped = config.clone();
        scoped.specs_root = rebase_into_worktree(&self.project_root, worktree_path, &config.specs_root);
        scoped
    }
}

fn rebase_into_worktree(project_root: &Path, worktree_path: &Path, configured: &Path) -> PathBuf {
    if configured.is_relative() {
        return worktree_path.join(configured);
    }
    match configured.strip_prefix(project_root) {
        Ok(relative) => worktree_path.join(relative),
        Err(_) => configured.to_path_buf(),
    }
}

fn to_git_worktree_config(c: &autospec_config::types::WorktreeConfig) -> autospec_git::WorktreeConfig {
    autospec_git::WorktreeConfig {
        base_dir: c.base_dir.clone(),
        prefix: c.prefix.clone(),
        setup_script: c.setup_script.clone(),
        auto_setup: c.auto_setup,
        copy_dirs: c.copy_dirs.clone(),
        setup_timeout: c.setup_timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebase_relative_specs_root_joins_worktree() {
        let result = rebase_into_worktree(Path::new("/repo"), Path::new("/worktrees/001"), Path::new("specs"));
        assert_eq!(result, PathBuf::from("/worktrees/001/specs"));
    }

    #[test]
    fn rebase_absolute_specs_root_under_project_strips_prefix() {
        let result = rebase_into_worktree(
            Path::new("/repo"),
            Path::new("/worktrees/001"),
            Path::new("/repo/specs"),
        );
        assert_eq!(result, PathBuf::from("/worktrees/001/specs"));
    }

    #[test]
    fn rebase_absolute_specs_root_outside_project_is_unchanged() {
        let result = rebase_into_worktree(
            Path::new("/repo"),
            Path::new("/worktrees/001"),
            Path::new("/shared/specs"),
        );
        assert_eq!(result, PathBuf::from("/shared/specs"));
    }
}
