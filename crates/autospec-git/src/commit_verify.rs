//! Commit verification (spec.md §5.4): after an implement-stage agent
//! session reports success, confirm it actually produced real commits
//! rather than an empty session.

use crate::error::Result;
use crate::repo::Git;

/// Outcome of checking one worktree against its layer base branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitVerification {
    pub is_clean: bool,
    pub commits_ahead: u32,
    /// HEAD at the moment of verification.
    pub head_sha: String,
}

impl CommitVerification {
    /// Passes iff there are zero uncommitted changes and at least one
    /// real commit ahead of the base branch.
    pub fn passed(&self) -> bool {
        self.is_clean && self.commits_ahead > 0
    }
}

/// Run the verification against a worktree's Git checkout.
pub async fn verify(worktree: &Git, base_branch: &str) -> Result<CommitVerification> {
    let is_clean = worktree.is_clean().await?;
    let commits_ahead = worktree.commits_ahead_of(base_branch).await?;
    let head_sha = worktree.head_sha().await?;

    Ok(CommitVerification {
        is_clean,
        commits_ahead,
        head_sha,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn run(dir: &std::path::Path, args: &[&str]) {
        let status = Command::new("git").current_dir(dir).args(args).status().unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    #[tokio::test]
    async fn empty_session_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["init", "-q"]);
        run(dir.path(), &["config", "user.email", "test@example.com"]);
        run(dir.path(), &["config", "user.name", "test"]);
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        run(dir.path(), &["add", "-A"]);
        run(dir.path(), &["commit", "-q", "-m", "base"]);
        run(dir.path(), &["branch", "base"]);

        let git = Git::new(dir.path());
        let result = verify(&git, "base").await.unwrap();
        assert!(!result.passed());
        assert_eq!(result.commits_ahead, 0);
    }

    #[tokio::test]
    async fn real_commit_passes_verification() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["init", "-q"]);
        run(dir.path(), &["config", "user.email", "test@example.com"]);
        run(dir.path(), &["config", "user.name", "test"]);
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        run(dir.path(), &["add", "-A"]);
        run(dir.path(), &["commit", "-q", "-m", "base"]);
        run(dir.path(), &["branch", "base"]);

        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        run(dir.path(), &["add", "-A"]);
        run(dir.path(), &["commit", "-q", "-m", "implement feature"]);

        let git = Git::new(dir.path());
        let result = verify(&git, "base").await.unwrap();
        assert!(result.passed());
        assert_eq!(result.commits_ahead, 1);
    }

    #[tokio::test]
    async fn uncommitted_changes_fail_verification_even_with_commits_ahead() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["init", "-q"]);
        run(dir.path(), &["config", "user.email", "test@example.com"]);
        run(dir.path(), &["config", "user.name", "test"]);
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        run(dir.path(), &["add", "-A"]);
        run(dir.path(), &["commit", "-q", "-m", "base"]);
        run(dir.path(), &["branch", "base"]);

        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        run(dir.path(), &["add", "-A"]);
        run(dir.path(), &["commit", "-q", "-m", "implement feature"]);
        std::fs::write(dir.path().join("c.txt"), "c").unwrap();

        let git = Git::new(dir.path());
        let result = verify(&git, "base").await.unwrap();
        assert!(!result.passed());
        assert!(!result.is_clean);
    }
}
