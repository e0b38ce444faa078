//! Persistent record of worktrees this tool has created, so `prune` and
//! idempotent `Remove` work across process restarts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GitError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreeRecord {
    pub name: String,
    pub path: PathBuf,
    pub branch: String,
    pub base_branch: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    worktrees: Vec<WorktreeRecord>,
}

/// A registry file under the state directory, one entry per live worktree.
pub struct WorktreeRegistry {
    path: PathBuf,
}

impl WorktreeRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<RegistryFile> {
        if !self.path.exists() {
            return Ok(RegistryFile::default());
        }
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| GitError::Io {
                path: self.path.clone(),
                source,
            })?;
        serde_yaml::from_str(&contents).map_err(|source| GitError::CorruptRegistry {
            path: self.path.clone(),
            source,
        })
    }

    async fn write(&self, file: &RegistryFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| GitError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let yaml = serde_yaml::to_string(file).expect("RegistryFile is always serializable");
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "worktrees".to_string());
        let tmp_path = self.path.with_file_name(format!(".{file_name}.tmp"));
        tokio::fs::write(&tmp_path, yaml.as_bytes())
            .await
            .map_err(|source| GitError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| GitError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Option<WorktreeRecord>> {
        let file = self.read().await?;
        Ok(file.worktrees.into_iter().find(|w| w.name == name))
    }

    pub async fn list(&self) -> Result<Vec<WorktreeRecord>> {
        Ok(self.read().await?.worktrees)
    }

    pub async fn insert(&self, record: WorktreeRecord) -> Result<()> {
        let mut file = self.read().await?;
        file.worktrees.retain(|w| w.name != record.name);
        file.worktrees.push(record);
        self.write(&file).await
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        let mut file = self.read().await?;
        file.worktrees.retain(|w| w.name != name);
        self.write(&file).await
    }

    /// Drop any tracked worktree whose path no longer exists on disk.
    pub async fn prune_missing(&self) -> Result<Vec<WorktreeRecord>> {
        let mut file = self.read().await?;
        let (gone, kept): (Vec<_>, Vec<_>) = file
            .worktrees
            .into_iter()
            .partition(|w| !worktree_path_exists(&w.path));
        file.worktrees = kept;
        self.write(&file).await?;
        Ok(gone)
    }
}

fn worktree_path_exists(path: &Path) -> bool {
    path.exists()
}
