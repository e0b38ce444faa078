//! `DagError` wraps every lower-level error the scheduler, run-state
//! store, and executor can surface, attaching a [`FailureKind`] so the
//! CLI boundary maps to an exit code without inspecting error text
//! (mirrors `autospec_orchestrator::OrchestratorError`).

use std::path::PathBuf;

use autospec_retry::FailureKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DagError>;

#[derive(Debug, Error)]
pub enum DagError {
    #[error("failed to parse DAG workflow {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("duplicate feature id '{0}' in DAG workflow")]
    DuplicateFeatureId(String),

    #[error("feature '{feature}' depends on unknown feature '{dependency}'")]
    UnknownDependency { feature: String, dependency: String },

    #[error("feature '{feature}' depends on '{dependency}', which is not in a strictly earlier layer")]
    CrossLayerDependency { feature: String, dependency: String },

    #[error("dependency cycle detected among: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("DAG workflow '{0}' is already being run by another invocation")]
    RunBusy(String),

    #[error("corrupt DAG run state at {path}: {source}")]
    CorruptRunState {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("layer {layer} aborted: spec '{spec_id}' failed commit verification after {attempts} attempt(s)")]
    CommitVerificationFailed { layer: usize, spec_id: String, attempts: u32 },

    #[error("merge pre-flight failed: spec '{spec_id}' has {detail}")]
    MergePreflightFailed { spec_id: String, detail: String },

    #[error(transparent)]
    Git(#[from] autospec_git::GitError),

    #[error(transparent)]
    Agent(#[from] autospec_agent::AgentError),

    #[error(transparent)]
    Retry(#[from] autospec_retry::RetryError),

    #[error(transparent)]
    Orchestrator(#[from] autospec_orchestrator::OrchestratorError),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cancelled")]
    Cancelled,
}

impl DagError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            DagError::Parse { .. } => FailureKind::Validation,
            DagError::DuplicateFeatureId(_) => FailureKind::Validation,
            DagError::UnknownDependency { .. } => FailureKind::Validation,
            DagError::CrossLayerDependency { .. } => FailureKind::Validation,
            DagError::Cycle(_) => FailureKind::Validation,
            DagError::RunBusy(_) => FailureKind::State,
            DagError::CorruptRunState { .. } => FailureKind::State,
            DagError::CommitVerificationFailed { .. } => FailureKind::CommitVerification,
            DagError::MergePreflightFailed { .. } => FailureKind::CommitVerification,
            DagError::Git(_) => FailureKind::Agent,
            DagError::Agent(_) => FailureKind::Agent,
            DagError::Retry(_) => FailureKind::State,
            DagError::Orchestrator(err) => err.failure_kind(),
            DagError::Io { .. } => FailureKind::State,
            DagError::Cancelled => FailureKind::Cancelled,
        }
    }

    /// Mirrors `OrchestratorError::is_retry_exhausted`, forwarded
    /// through the wrapping variant so the CLI can recognize retry
    /// exhaustion reached inside a DAG-scheduled spec too.
    pub fn is_retry_exhausted(&self) -> bool {
        match self {
            DagError::Orchestrator(err) => err.is_retry_exhausted(),
            _ => false,
        }
    }
}
