//! A thin async wrapper over the `git` binary.
//!
//! Grounded on `cortex-engine::git_ops::Git` for the argument/output
//! shape of each operation, and on `cortex-utils::git`'s timeout-wrapped
//! command runner — reimplemented with `tokio::process::Command` and
//! `tokio::time::timeout` since the rest of this workspace is async.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use crate::error::{GitError, Result};

/// Default timeout applied to any git subprocess invocation.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations against a single repository (or worktree) checkout.
#[derive(Debug, Clone)]
pub struct Git {
    repo_path: PathBuf,
    timeout: Duration,
}

impl Git {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_path).args(args);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| GitError::Timeout {
                args: args.join(" "),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(GitError::Spawn)?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(GitError::CommandFailed {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }

    pub fn is_repo(&self) -> bool {
        self.repo_path.join(".git").exists()
    }

    pub async fn current_branch(&self) -> Result<String> {
        Ok(self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await?.trim().to_string())
    }

    /// The full SHA of `HEAD`, used for both commit-verification and
    /// merge-staging capture (spec.md §9 resolves this open question:
    /// the SHA is captured at both points rather than once).
    pub async fn head_sha(&self) -> Result<String> {
        Ok(self.run(&["rev-parse", "HEAD"]).await?.trim().to_string())
    }

    pub async fn repo_root(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(self.run(&["rev-parse", "--show-toplevel"]).await?.trim()))
    }

    /// True iff there are zero uncommitted changes (staged, unstaged, or untracked).
    pub async fn is_clean(&self) -> Result<bool> {
        let output = self.run(&["status", "--porcelain"]).await?;
        Ok(output.trim().is_empty())
    }

    /// Number of commits on HEAD that are not reachable from `base`.
    pub async fn commits_ahead_of(&self, base: &str) -> Result<u32> {
        let output = self.run(&["rev-list", "--count", &format!("{base}..HEAD")]).await?;
        Ok(output.trim().parse().unwrap_or(0))
    }

    pub async fn add_all(&self) -> Result<()> {
        self.run(&["add", "-A"]).await?;
        Ok(())
    }

    pub async fn commit(&self, message: &str) -> Result<String> {
        self.run(&["commit", "-m", message]).await?;
        self.head_sha().await
    }

    pub async fn checkout_new_branch(&self, branch: &str, base: &str) -> Result<()> {
        self.run(&["checkout", "-b", branch, base]).await?;
        Ok(())
    }

    pub async fn checkout(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", branch]).await?;
        Ok(())
    }

    pub async fn merge(&self, branch: &str, message: &str) -> Result<()> {
        self.run(&["merge", "--no-ff", "-m", message, branch]).await?;
        Ok(())
    }

    pub async fn branch_exists(&self, branch: &str) -> bool {
        self.run(&["rev-parse", "--verify", &format!("refs/heads/{branch}")])
            .await
            .is_ok()
    }

    pub async fn worktree_add(&self, path: &Path, branch: &str, base: &str) -> Result<()> {
        self.run(&[
            "worktree",
            "add",
            "-b",
            branch,
            &path.to_string_lossy(),
            base,
        ])
        .await?;
        Ok(())
    }

    pub async fn worktree_remove(&self, path: &Path, force: bool) -> Result<()> {
        let path_str = path.to_string_lossy().into_owned();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);
        self.run(&args).await?;
        Ok(())
    }

    pub async fn worktree_prune(&self) -> Result<()> {
        self.run(&["worktree", "prune"]).await?;
        Ok(())
    }
}
