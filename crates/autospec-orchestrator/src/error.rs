//! `OrchestratorError` wraps every lower-level error the stage and
//! phase engines can surface, attaching a [`FailureKind`] so the CLI
//! maps to an exit code without inspecting error text (SPEC_FULL.md §4.12).

use std::path::PathBuf;

use autospec_retry::FailureKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("stage '{stage}' requires '{prerequisite}' to complete first")]
    MissingPrerequisite { stage: String, prerequisite: String },

    #[error("no spec could be resolved: {0}")]
    SpecNotResolved(String),

    #[error("spec '{0}' is already being worked on by another invocation")]
    SpecBusy(String),

    #[error(transparent)]
    Artifact(#[from] autospec_artifact::ArtifactError),

    #[error(transparent)]
    Agent(#[from] autospec_agent::AgentError),

    #[error(transparent)]
    Retry(#[from] autospec_retry::RetryError),

    #[error("stage '{stage}' exhausted its retry budget ({attempts} attempt(s))")]
    RetryExhausted { stage: String, attempts: u32 },

    #[error("phase {phase} did not complete: {detail}")]
    PhaseIncomplete { phase: u32, detail: String },

    #[error("task roster for phase {phase} diverged mid-session: {detail}")]
    RosterDiverged { phase: u32, detail: String },

    #[error("task '{task}' depends on '{dependency}', which is not yet completed")]
    DependencyNotSatisfied { task: String, dependency: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OrchestratorError {
    /// The closed failure taxonomy (spec.md §7) this error belongs to,
    /// used by the CLI boundary to select an exit code.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            OrchestratorError::MissingPrerequisite { .. } => FailureKind::Preflight,
            OrchestratorError::SpecNotResolved(_) => FailureKind::Preflight,
            OrchestratorError::SpecBusy(_) => FailureKind::State,
            OrchestratorError::Artifact(_) => FailureKind::Validation,
            OrchestratorError::Agent(_) => FailureKind::Agent,
            OrchestratorError::Retry(_) => FailureKind::State,
            OrchestratorError::RetryExhausted { .. } => FailureKind::Validation,
            OrchestratorError::PhaseIncomplete { .. } => FailureKind::Validation,
            OrchestratorError::RosterDiverged { .. } => FailureKind::Validation,
            OrchestratorError::DependencyNotSatisfied { .. } => FailureKind::Validation,
            OrchestratorError::Io { .. } => FailureKind::State,
        }
    }

    /// `RetryExhausted` sits outside the six-member taxonomy: it is a
    /// terminal outcome reached *through* `Agent` or `Validation`
    /// failures, not a kind of its own, but the CLI still needs to tell
    /// it apart to produce exit code 2 (spec.md §6) rather than the
    /// code 1 its underlying kind would otherwise map to.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, OrchestratorError::RetryExhausted { .. })
    }
}
