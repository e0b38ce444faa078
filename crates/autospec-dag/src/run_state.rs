//! Persistent DAG run state (spec.md §3 "DAG run state", §4.10): one
//! record per spec in the workflow, atomically written to a sidecar
//! `<workflow>.state.yaml` file keyed by workflow filename.
//!
//! All external mutations funnel through [`RunStateHandle`], which owns
//! a single writer task fed by an `mpsc` channel (spec.md §4.9
//! "Cross-spec shared state is the DAG run state file only; updates to
//! it go through a single writer goroutine fed by a channel to
//! guarantee ordering") so concurrent layer workers never race a
//! read-modify-write against the same file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::{DagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Blocked,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    Pending,
    Committed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecRunState {
    pub status: SpecStatus,
    pub worktree_path: Option<PathBuf>,
    pub branch: Option<String>,
    pub log_path: Option<PathBuf>,
    pub commit_status: CommitStatus,
    pub commit_sha: Option<String>,
    pub attempt_count: u32,
    pub current_stage: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Default for SpecRunState {
    fn default() -> Self {
        Self {
            status: SpecStatus::Pending,
            worktree_path: None,
            branch: None,
            log_path: None,
            commit_status: CommitStatus::Pending,
            commit_sha: None,
            attempt_count: 0,
            current_stage: None,
            updated_at: chrono::Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DagRunState {
    pub specs: HashMap<String, SpecRunState>,
}

impl DagRunState {
    pub fn get(&self, spec_id: &str) -> SpecRunState {
        self.specs.get(spec_id).cloned().unwrap_or_default()
    }

    /// Specs left `Running` by an interrupted run are rewritten to
    /// `Pending` so the next resume retries them (spec.md §4.9
    /// cancellation semantics).
    pub fn reset_interrupted(&mut self) {
        for state in self.specs.values_mut() {
            if state.status == SpecStatus::Running {
                state.status = SpecStatus::Pending;
                state.updated_at = chrono::Utc::now();
            }
        }
    }
}

fn state_path(workflow_path: &Path) -> PathBuf {
    let mut path = workflow_path.as_os_str().to_owned();
    path.push(".state.yaml");
    PathBuf::from(path)
}

async fn read(path: &Path) -> Result<DagRunState> {
    if !path.exists() {
        return Ok(DagRunState::default());
    }
    let contents = tokio::fs::read_to_string(path).await.map_err(|source| DagError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| DagError::CorruptRunState {
        path: path.to_path_buf(),
        source,
    })
}

async fn write(path: &Path, state: &DagRunState) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|source| DagError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let yaml = serde_yaml::to_string(state).expect("DagRunState is always serializable");

    let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    tokio::fs::write(&tmp_path, yaml.as_bytes())
        .await
        .map_err(|source| DagError::Io { path: tmp_path.clone(), source })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|source| DagError::Io { path: path.to_path_buf(), source })?;
    Ok(())
}

enum Mutation {
    Set {
        spec_id: String,
        state: SpecRunState,
        reply: oneshot::Sender<Result<()>>,
    },
    ResetInterrupted {
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<DagRunState>,
    },
}

/// A handle to the single writer task owning one workflow's run-state
/// file. Cloning the handle is cheap (it clones an `mpsc::Sender`);
/// every clone funnels through the same serializer.
#[derive(Clone)]
pub struct RunStateHandle {
    tx: mpsc::Sender<Mutation>,
}

impl RunStateHandle {
    /// Spawn the writer task and load the current on-disk state
    /// (migrating in-place edits performed outside this process).
    pub async fn open(workflow_path: &Path) -> Result<(Self, DagRunState)> {
        let path = state_path(workflow_path);
        let initial = read(&path).await?;

        let (tx, mut rx) = mpsc::channel::<Mutation>(64);
        let writer_path = path.clone();
        tokio::spawn(async move {
            let mut state = match read(&writer_path).await {
                Ok(state) => state,
                Err(_) => DagRunState::default(),
            };

            while let Some(mutation) = rx.recv().await {
                match mutation {
                    Mutation::Set { spec_id, state: spec_state, reply } => {
                        state.specs.insert(spec_id, spec_state);
                        let result = write(&writer_path, &state).await;
                        let _ = reply.send(result);
                    }
                    Mutation::ResetInterrupted { reply } => {
                        state.reset_interrupted();
                        let result = write(&writer_path, &state).await;
                        let _ = reply.send(result);
                    }
                    Mutation::Snapshot { reply } => {
                        let _ = reply.send(state.clone());
                    }
                }
            }
        });

        Ok((Self { tx }, initial))
    }

    pub async fn set(&self, spec_id: impl Into<String>, state: SpecRunState) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Mutation::Set {
                spec_id: spec_id.into(),
                state,
                reply: reply_tx,
            })
            .await
            .map_err(|_| DagError::RunBusy("writer task gone".to_string()))?;
        reply_rx.await.map_err(|_| DagError::RunBusy("writer task gone".to_string()))?
    }

    /// The current state for every spec this handle has ever written,
    /// for reporting and for deciding what the next layer may skip.
    pub async fn snapshot(&self) -> Result<DagRunState> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Mutation::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| DagError::RunBusy("writer task gone".to_string()))?;
        reply_rx.await.map_err(|_| DagError::RunBusy("writer task gone".to_string()))
    }

    pub async fn reset_interrupted(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Mutation::ResetInterrupted { reply: reply_tx })
            .await
            .map_err(|_| DagError::RunBusy("writer task gone".to_string()))?;
        reply_rx.await.map_err(|_| DagError::RunBusy("writer task gone".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_through_sidecar_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let workflow_path = dir.path().join("nightly.yaml");
        tokio::fs::write(&workflow_path, "dag: {}\nlayers: []\n").await.unwrap();

        let (handle, initial) = RunStateHandle::open(&workflow_path).await.unwrap();
        assert!(initial.specs.is_empty());

        let mut spec_state = SpecRunState::default();
        spec_state.status = SpecStatus::Completed;
        handle.set("001-add-cache", spec_state).await.unwrap();

        let reloaded = read(&state_path(&workflow_path)).await.unwrap();
        assert_eq!(reloaded.get("001-add-cache").status, SpecStatus::Completed);
    }

    #[tokio::test]
    async fn reset_interrupted_rewrites_running_to_pending() {
        let dir = tempfile::tempdir().unwrap();
        let workflow_path = dir.path().join("nightly.yaml");
        tokio::fs::write(&workflow_path, "dag: {}\nlayers: []\n").await.unwrap();

        let (handle, _) = RunStateHandle::open(&workflow_path).await.unwrap();
        let mut running = SpecRunState::default();
        running.status = SpecStatus::Running;
        handle.set("001-add-cache", running).await.unwrap();

        handle.reset_interrupted().await.unwrap();

        let reloaded = read(&state_path(&workflow_path)).await.unwrap();
        assert_eq!(reloaded.get("001-add-cache").status, SpecStatus::Pending);
    }
}
