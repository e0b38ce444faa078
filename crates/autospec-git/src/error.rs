//! Error type for Git operations and worktree management.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GitError>;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git command timed out after {timeout_secs}s: git {args}")]
    Timeout { args: String, timeout_secs: u64 },

    #[error("git {args} failed: {stderr}")]
    CommandFailed { args: String, stderr: String },

    #[error("worktree path already exists: {path}")]
    WorktreePathExists { path: PathBuf },

    #[error("worktree '{name}' is already tracked at {path}")]
    WorktreeAlreadyTracked { name: String, path: PathBuf },

    #[error("worktree '{name}' is not tracked")]
    WorktreeNotTracked { name: String },

    #[error("worktree setup script exited non-zero (code {code:?}): {stderr}")]
    SetupScriptFailed { code: Option<i32>, stderr: String },

    #[error("worktree setup script timed out after {timeout_secs}s")]
    SetupScriptTimeout { timeout_secs: u64 },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt worktree registry {path}: {source}")]
    CorruptRegistry {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
