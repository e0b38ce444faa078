//! A single stage's retry record: attempt count plus the last failure's
//! summary and kind, for injection into the next retry prompt.

use serde::{Deserialize, Serialize};

/// Why an attempt failed. The single closed taxonomy threaded through
/// every error that crosses a stage/spec boundary (retry records, the
/// orchestrator, the DAG executor); the CLI maps it to an exit code
/// without inspecting error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A stage prerequisite was missing. Fatal and non-retryable where
    /// raised, but still recorded here if a caller chooses to track it.
    Preflight,
    /// The produced artifact failed schema or referential validation.
    Validation,
    /// The agent subprocess exited non-zero, was signaled, or timed out.
    Agent,
    /// Commit verification found uncommitted changes or no commits
    /// ahead of the base branch.
    CommitVerification,
    /// Concurrent-run detection or a corrupt state file.
    State,
    /// SIGINT or a deadline interrupted the attempt.
    Cancelled,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Preflight => "preflight",
            FailureKind::Validation => "validation",
            FailureKind::Agent => "agent",
            FailureKind::CommitVerification => "commit_verification",
            FailureKind::State => "state",
            FailureKind::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Persistent per-stage retry state for one spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryRecord {
    pub attempt_count: u32,
    pub last_error_summary: String,
    pub last_failure_kind: FailureKind,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl RetryRecord {
    fn first_failure(failure_kind: FailureKind, summary: impl Into<String>) -> Self {
        Self {
            attempt_count: 1,
            last_error_summary: summary.into(),
            last_failure_kind: failure_kind,
            updated_at: chrono::Utc::now(),
        }
    }

    fn record_failure(&mut self, failure_kind: FailureKind, summary: impl Into<String>) {
        self.attempt_count += 1;
        self.last_error_summary = summary.into();
        self.last_failure_kind = failure_kind;
        self.updated_at = chrono::Utc::now();
    }
}

/// Per-spec retry state: one entry per stage. Serialized to a single
/// YAML file per spec (spec.md §4.2: "one JSON/YAML file under a state
/// directory").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecRetryState {
    #[serde(default)]
    pub stages: std::collections::BTreeMap<String, RetryRecord>,
}

impl SpecRetryState {
    pub fn attempts(&self, stage: &str) -> u32 {
        self.stages.get(stage).map(|r| r.attempt_count).unwrap_or(0)
    }

    pub fn increment(&mut self, stage: &str, failure_kind: FailureKind, summary: impl Into<String>) {
        let summary = summary.into();
        match self.stages.get_mut(stage) {
            Some(record) => record.record_failure(failure_kind, summary),
            None => {
                self.stages
                    .insert(stage.to_string(), RetryRecord::first_failure(failure_kind, summary));
            }
        }
    }

    pub fn reset(&mut self, stage: &str) {
        self.stages.remove(stage);
    }

    pub fn reset_all(&mut self) {
        self.stages.clear();
    }
}
