//! The explicit `dag merge` operation (spec.md §4.9.1, §3 "Final merge
//! into user's base branch is explicit"): a pre-flight pass over every
//! `Completed` spec's recorded commit status, then one merge of the
//! workflow's final layer staging branch into `base_branch`.

use autospec_git::Git;

use crate::error::{DagError, Result};
use crate::run_state::{CommitStatus, DagRunState, SpecStatus};
use crate::workflow::DagFile;

#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Skip (rather than abort on) Completed specs with no verified commits.
    pub skip_no_commits: bool,
    /// Merge regardless of any spec's commit status.
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub merged_branch: String,
    pub skipped_specs: Vec<String>,
}

/// Run the merge pre-flight across every feature the workflow declares,
/// then merge the final layer's staging branch into `base_branch`.
///
/// `primary` must already have `base_branch` as its working branch, or
/// be pointed at a repo where checking it out is safe (the caller's
/// primary working tree, not a spec worktree).
pub async fn merge_to_base(
    primary: &Git,
    run_state: &DagRunState,
    dag_file: &DagFile,
    dag_id: &str,
    layer_count: usize,
    base_branch: &str,
    options: MergeOptions,
) -> Result<MergeOutcome> {
    if layer_count == 0 {
        return Err(DagError::MergePreflightFailed {
            spec_id: dag_id.to_string(),
            detail: "workflow has no scheduled layers".to_string(),
        });
    }

    let mut skipped = Vec::new();
    for feature_id in dag_file.feature_ids() {
        let state = run_state.get(feature_id);
        if state.status != SpecStatus::Completed {
            continue;
        }
        if state.commit_status == CommitStatus::Committed {
            continue;
        }
        if options.force || options.skip_no_commits {
            skipped.push(feature_id.to_string());
            continue;
        }
        return Err(DagError::MergePreflightFailed {
            spec_id: feature_id.to_string(),
            detail: "spec has no verified commits ahead of its layer base".to_string(),
        });
    }

    let final_branch = format!("dag/{dag_id}/stage-L{}", layer_count - 1);
    primary.checkout(base_branch).await?;
    primary
        .merge(&final_branch, &format!("merge dag '{dag_id}' into {base_branch}"))
        .await?;

    Ok(MergeOutcome {
        merged_branch: final_branch,
        skipped_specs: skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_state::SpecRunState;
    use crate::workflow::DagFile;
    use std::process::Command;

    fn run(dir: &std::path::Path, args: &[&str]) {
        let status = Command::new("git").current_dir(dir).args(args).status().unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo_with_dag_branch(dir: &std::path::Path) {
        run(dir, &["init", "-q"]);
        run(dir, &["config", "user.email", "test@example.com"]);
        run(dir, &["config", "user.name", "test"]);
        std::fs::write(dir.join("a.txt"), "a").unwrap();
        run(dir, &["add", "-A"]);
        run(dir, &["commit", "-q", "-m", "base"]);
        run(dir, &["branch", "dag/nightly/stage-L0"]);
        run(dir, &["checkout", "-q", "dag/nightly/stage-L0"]);
        std::fs::write(dir.join("b.txt"), "b").unwrap();
        run(dir, &["add", "-A"]);
        run(dir, &["commit", "-q", "-m", "feature work"]);
        run(dir, &["checkout", "-q", "master"]);
    }

    fn sample_dag() -> DagFile {
        DagFile::parse(
            std::path::Path::new("nightly.yaml"),
            "layers:\n  - features:\n      - id: 001-add-cache\n",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn preflight_aborts_when_a_completed_spec_has_no_commits() {
        let dir = tempfile::tempdir().unwrap();
        init_repo_with_dag_branch(dir.path());
        let git = Git::new(dir.path());

        let mut run_state = DagRunState::default();
        run_state.specs.insert(
            "001-add-cache".to_string(),
            SpecRunState {
                status: SpecStatus::Completed,
                commit_status: CommitStatus::Pending,
                ..SpecRunState::default()
            },
        );

        let result = merge_to_base(
            &git,
            &run_state,
            &sample_dag(),
            "nightly",
            1,
            "master",
            MergeOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(DagError::MergePreflightFailed { .. })));
    }

    #[tokio::test]
    async fn force_skips_preflight_and_merges_anyway() {
        let dir = tempfile::tempdir().unwrap();
        init_repo_with_dag_branch(dir.path());
        let git = Git::new(dir.path());

        let mut run_state = DagRunState::default();
        run_state.specs.insert(
            "001-add-cache".to_string(),
            SpecRunState {
                status: SpecStatus::Completed,
                commit_status: CommitStatus::Pending,
                ..SpecRunState::default()
            },
        );

        let options = MergeOptions { force: true, skip_no_commits: false };
        let outcome = merge_to_base(&git, &run_state, &sample_dag(), "nightly", 1, "master", options)
            .await
            .unwrap();
        assert_eq!(outcome.merged_branch, "dag/nightly/stage-L0");
        assert_eq!(outcome.skipped_specs, vec!["001-add-cache".to_string()]);
        assert!(dir.path().join("b.txt").exists());
    }

    #[tokio::test]
    async fn verified_commits_merge_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        init_repo_with_dag_branch(dir.path());
        let git = Git::new(dir.path());

        let mut run_state = DagRunState::default();
        run_state.specs.insert(
            "001-add-cache".to_string(),
            SpecRunState {
                status: SpecStatus::Completed,
                commit_status: CommitStatus::Committed,
                ..SpecRunState::default()
            },
        );

        let outcome = merge_to_base(
            &git,
            &run_state,
            &sample_dag(),
            "nightly",
            1,
            "master",
            MergeOptions::default(),
        )
        .await
        .unwrap();
        assert!(outcome.skipped_specs.is_empty());
        assert!(dir.path().join("b.txt").exists());
    }
}
