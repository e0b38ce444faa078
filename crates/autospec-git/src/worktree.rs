//! Worktree lifecycle: create, seed, run setup, and tear down isolated
//! Git worktrees for per-spec execution (spec.md §5.2).

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GitError, Result};
use crate::registry::{WorktreeRecord, WorktreeRegistry};
use crate::repo::Git;

/// Static configuration for worktree creation, resolved once from the
/// tool's configuration record and reused across specs.
#[derive(Debug, Clone)]
pub struct WorktreeConfig {
    pub base_dir: PathBuf,
    pub prefix: String,
    pub setup_script: Option<PathBuf>,
    pub auto_setup: bool,
    pub copy_dirs: Vec<String>,
    pub setup_timeout: Duration,
}

impl Default for WorktreeConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".autospec/worktrees"),
            prefix: String::new(),
            setup_script: None,
            auto_setup: false,
            copy_dirs: vec![".autospec".to_string()],
            setup_timeout: Duration::from_secs(120),
        }
    }
}

/// Per-call overrides for `create`.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Explicit path; overrides `base_dir`/`prefix` computation.
    pub path: Option<PathBuf>,
    /// Skip rollback-on-setup-failure, leaving the worktree for inspection.
    pub no_rollback: bool,
}

pub struct WorktreeManager {
    primary_repo: Git,
    registry: WorktreeRegistry,
    config: WorktreeConfig,
}

impl WorktreeManager {
    pub fn new(primary_repo: Git, registry_path: impl Into<PathBuf>, config: WorktreeConfig) -> Self {
        Self {
            primary_repo,
            registry: WorktreeRegistry::new(registry_path),
            config,
        }
    }

    fn compute_path(&self, name: &str, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.base_dir.join(format!("{}{}", self.config.prefix, name)))
    }

    /// `Create(name, branch, path?, opts)`: checkout a new worktree on
    /// `branch` forked from `base_branch`, seed configured directories,
    /// optionally run the setup script, and register it.
    pub async fn create(
        &self,
        name: &str,
        branch: &str,
        base_branch: &str,
        opts: CreateOptions,
    ) -> Result<WorktreeRecord> {
        if let Some(existing) = self.registry.get(name).await? {
            return Err(GitError::WorktreeAlreadyTracked {
                name: name.to_string(),
                path: existing.path,
            });
        }

        let path = self.compute_path(name, opts.path.as_deref());
        if path.exists() {
            return Err(GitError::WorktreePathExists { path });
        }

        self.primary_repo.worktree_add(&path, branch, base_branch).await?;

        if let Err(err) = self.seed_and_setup(&path).await {
            if !opts.no_rollback {
                let _ = self.primary_repo.worktree_remove(&path, true).await;
            }
            return Err(err);
        }

        let record = WorktreeRecord {
            name: name.to_string(),
            path,
            branch: branch.to_string(),
            base_branch: base_branch.to_string(),
            created_at: chrono::Utc::now(),
        };
        self.registry.insert(record.clone()).await?;

        tracing::info!(name, branch, path = %record.path.display(), "created worktree");
        Ok(record)
    }

    async fn seed_and_setup(&self, path: &Path) -> Result<()> {
        let primary_root = self.primary_repo.repo_path();
        for dir in &self.config.copy_dirs {
            let src = primary_root.join(dir);
            if src.exists() {
                copy_dir_recursive(&src, &path.join(dir)).await?;
            }
        }

        if self.config.auto_setup {
            if let Some(script) = &self.config.setup_script {
                run_setup_script(script, path, self.config.setup_timeout).await?;
            }
        }

        Ok(())
    }

    /// Idempotent: removing an already-absent worktree succeeds silently.
    pub async fn remove(&self, name: &str, force: bool) -> Result<()> {
        let Some(record) = self.registry.get(name).await? else {
            tracing::debug!(name, "remove: worktree not tracked, nothing to do");
            return Ok(());
        };

        if record.path.exists() {
            self.primary_repo.worktree_remove(&record.path, force).await?;
        }
        self.registry.remove(name).await
    }

    pub async fn prune(&self) -> Result<Vec<WorktreeRecord>> {
        self.primary_repo.worktree_prune().await?;
        self.registry.prune_missing().await
    }

    pub async fn list(&self) -> Result<Vec<WorktreeRecord>> {
        self.registry.list().await
    }
}

async fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dst).await.map_err(|source| GitError::Io {
        path: dst.to_path_buf(),
        source,
    })?;

    let mut entries = tokio::fs::read_dir(src).await.map_err(|source| GitError::Io {
        path: src.to_path_buf(),
        source,
    })?;

    while let Some(entry) = entries.next_entry().await.map_err(|source| GitError::Io {
        path: src.to_path_buf(),
        source,
    })? {
        let file_type = entry.file_type().await.map_err(|source| GitError::Io {
            path: entry.path(),
            source,
        })?;
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            Box::pin(copy_dir_recursive(&entry.path(), &dst_path)).await?;
        } else if file_type.is_file() {
            tokio::fs::copy(entry.path(), &dst_path)
                .await
                .map_err(|source| GitError::Io {
                    path: entry.path(),
                    source,
                })?;
        }
    }

    Ok(())
}

async fn run_setup_script(script: &Path, cwd: &Path, timeout: Duration) -> Result<()> {
    let mut cmd = tokio::process::Command::new(script);
    cmd.current_dir(cwd);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| GitError::SetupScriptTimeout {
            timeout_secs: timeout.as_secs(),
        })?
        .map_err(GitError::Spawn)?;

    if output.status.success() {
        Ok(())
    } else {
        Err(GitError::SetupScriptFailed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn init_repo(dir: &Path) {
        let run = |args: &[&str]| {
            Command::new("git").current_dir(dir).args(args).output().unwrap();
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "test"]);
        std::fs::write(dir.join("README.md"), "hello").unwrap();
        run(&["add", "-A"]);
        run(&["commit", "-q", "-m", "initial"]);
    }

    #[tokio::test]
    async fn create_registers_and_seeds_worktree() {
        let primary_dir = tempfile::tempdir().unwrap();
        init_repo(primary_dir.path());
        std::fs::create_dir_all(primary_dir.path().join(".autospec")).unwrap();
        std::fs::write(primary_dir.path().join(".autospec/config.yaml"), "k: v").unwrap();

        let state_dir = tempfile::tempdir().unwrap();
        let worktrees_dir = tempfile::tempdir().unwrap();

        let git = Git::new(primary_dir.path());
        let config = WorktreeConfig {
            base_dir: worktrees_dir.path().to_path_buf(),
            ..Default::default()
        };
        let manager = WorktreeManager::new(git, state_dir.path().join("worktrees.yaml"), config);

        let record = manager
            .create("001-add-cache", "dag/nightly/001-add-cache", "main", CreateOptions::default())
            .await
            .unwrap();

        assert!(record.path.join(".autospec/config.yaml").exists());
        assert_eq!(manager.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let primary_dir = tempfile::tempdir().unwrap();
        init_repo(primary_dir.path());

        let state_dir = tempfile::tempdir().unwrap();
        let git = Git::new(primary_dir.path());
        let manager = WorktreeManager::new(git, state_dir.path().join("worktrees.yaml"), WorktreeConfig::default());

        manager.remove("never-created", false).await.unwrap();
        manager.remove("never-created", false).await.unwrap();
    }

    #[tokio::test]
    async fn create_rejects_existing_path() {
        let primary_dir = tempfile::tempdir().unwrap();
        init_repo(primary_dir.path());

        let state_dir = tempfile::tempdir().unwrap();
        let worktrees_dir = tempfile::tempdir().unwrap();
        let existing = worktrees_dir.path().join("taken");
        std::fs::create_dir_all(&existing).unwrap();

        let git = Git::new(primary_dir.path());
        let config = WorktreeConfig {
            base_dir: worktrees_dir.path().to_path_buf(),
            ..Default::default()
        };
        let manager = WorktreeManager::new(git, state_dir.path().join("worktrees.yaml"), config);

        let err = manager
            .create("taken", "dag/nightly/taken", "main", CreateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::WorktreePathExists { .. }));
    }
}
