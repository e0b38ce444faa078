//! Single-stage execution: `Idle -> Preflight -> Prompting ->
//! AwaitingAgent -> Validating -> {Success | Retrying | Exhausted}`
//! (spec.md §4.5).
//!
//! `Implement` is deliberately not driven through this module — the
//! canonical-order driver in [`crate::pipeline`] delegates it to
//! [`crate::phase_engine`] instead, since a single agent exit/validate
//! cycle doesn't describe a multi-session phase run.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use autospec_agent::{render_agent_command, AgentInvocation, AgentInvoker, TemplateVars};
use autospec_artifact::{ArtifactStore, ChecklistArtifact, ConstitutionArtifact, PlanArtifact, SpecArtifact, TasksArtifact};
use autospec_config::types::{Configuration, Stage};
use autospec_retry::{FailureKind, RetryStore};

use crate::error::{OrchestratorError, Result};
use crate::prompt::{build_prompt, PromptContext, RetryContext};
use crate::spec_ref::SpecRef;

/// Terminal state a single stage run settled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Success,
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub stage: Stage,
    pub attempts: u32,
    pub state: StageState,
}

/// Project-relative path of the artifact a stage is expected to
/// produce or mutate. `Constitution` lives at a fixed project-level
/// path outside any spec directory; every other stage's artifact lives
/// inside the spec directory.
pub(crate) fn artifact_path_for(stage: Stage, project_root: &Path, spec_dir: &Path) -> PathBuf {
    match stage {
        Stage::Constitution => project_root.join(".autospec/memory/constitution.yaml"),
        Stage::Specify => spec_dir.join("spec.yaml"),
        // Clarify refines spec.yaml in place rather than producing a new file.
        Stage::Clarify => spec_dir.join("spec.yaml"),
        Stage::Plan => spec_dir.join("plan.yaml"),
        Stage::Tasks => spec_dir.join("tasks.yaml"),
        Stage::Checklist => spec_dir.join("checklist.yaml"),
        Stage::Analyze => spec_dir.join("analysis.yaml"),
        // Implement has no single produced artifact; see module docs.
        Stage::Implement => spec_dir.join("tasks.yaml"),
    }
}

async fn validate_stage_artifact(store: &ArtifactStore, stage: Stage, path: &Path) -> autospec_artifact::Result<()> {
    match stage {
        Stage::Constitution => store.validate_file::<ConstitutionArtifact>(path).await,
        Stage::Specify | Stage::Clarify => store.validate_file::<SpecArtifact>(path).await,
        Stage::Plan => store.validate_file::<PlanArtifact>(path).await,
        Stage::Tasks | Stage::Implement => store.validate_file::<TasksArtifact>(path).await,
        Stage::Checklist => store.validate_file::<ChecklistArtifact>(path).await,
        Stage::Analyze => store.validate_file::<autospec_artifact::AnalysisArtifact>(path).await,
    }
}

pub struct StageOrchestrator<'a> {
    artifacts: &'a ArtifactStore,
    retries: &'a RetryStore,
    invoker: &'a AgentInvoker,
}

impl<'a> StageOrchestrator<'a> {
    pub fn new(artifacts: &'a ArtifactStore, retries: &'a RetryStore, invoker: &'a AgentInvoker) -> Self {
        Self {
            artifacts,
            retries,
            invoker,
        }
    }

    /// Run one stage to completion (Success or Exhausted), looping
    /// through Prompting/AwaitingAgent/Validating on each retry.
    pub async fn run_stage(
        &self,
        project_root: &Path,
        spec: &SpecRef,
        stage: Stage,
        description: Option<&str>,
        config: &Configuration,
        cancel: CancellationToken,
    ) -> Result<StageOutcome> {
        // Idle -> Preflight
        if let Some(prerequisite) = stage.prerequisite() {
            let prereq_path = artifact_path_for(prerequisite, project_root, &spec.dir);
            if !prereq_path.is_file() {
                return Err(OrchestratorError::MissingPrerequisite {
                    stage: stage.to_string(),
                    prerequisite: prerequisite.to_string(),
                });
            }
        }

        if stage == Stage::Specify {
            // A fresh spec invalidates retry history for every dependent stage.
            self.retries.reset_all(&spec.id).await?;
        }

        let produced_path = artifact_path_for(stage, project_root, &spec.dir);
        let stage_key = stage.as_str();
        let max_retries = config.max_retries_for(stage);

        let mut retry_ctx: Option<RetryContext> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(OrchestratorError::RetryExhausted {
                    stage: stage_key.to_string(),
                    attempts: self.retries.attempts(&spec.id, stage_key).await?,
                });
            }

            // Preflight -> Prompting
            let prompt_ctx = PromptContext {
                spec_id: spec.id.clone(),
                spec_dir: spec.dir.display().to_string(),
                autospec_version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: chrono::Utc::now(),
                description: description.map(str::to_string),
            };
            let prompt_text = build_prompt(stage, &prompt_ctx, retry_ctx.as_ref());
            let command = render_agent_command(config.agent_command.as_str(), &prompt_text, &TemplateVars::new())
                .map_err(OrchestratorError::Agent)?;

            // Prompting -> AwaitingAgent
            let mut invocation = AgentInvocation::new(command, spec.dir.clone());
            if let Some(timeout) = config.invocation_timeout() {
                invocation = invocation.with_timeout(timeout);
            }
            let outcome = self.invoker.run(invocation, cancel.clone()).await?;

            if !outcome.succeeded() {
                let summary = format!(
                    "agent stopped via {:?} after {:?} (exit code: {:?})",
                    outcome.reason, outcome.duration, outcome.exit_code
                );
                let attempts = self
                    .retries
                    .increment(&spec.id, stage_key, FailureKind::Agent, summary)
                    .await?;
                if attempts > max_retries {
                    return Err(OrchestratorError::RetryExhausted {
                        stage: stage_key.to_string(),
                        attempts,
                    });
                }
                retry_ctx = Some(RetryContext {
                    attempt: attempts + 1,
                    failure_kind: FailureKind::Agent,
                    validation_errors: Vec::new(),
                    session_tail: outcome.tail,
                });
                continue;
            }

            // AwaitingAgent -> Validating
            match validate_stage_artifact(self.artifacts, stage, &produced_path).await {
                Ok(()) => {
                    // Validating -> Success
                    let attempts = self.retries.attempts(&spec.id, stage_key).await?;
                    self.retries.reset(&spec.id, stage_key).await?;
                    return Ok(StageOutcome {
                        stage,
                        attempts: attempts + 1,
                        state: StageState::Success,
                    });
                }
                Err(err) => {
                    let validation_errors: Vec<String> = err
                        .validation_errors()
                        .map(|errors| errors.iter().map(|e| e.to_string()).collect())
                        .unwrap_or_else(|| vec![err.to_string()]);
                    let summary = validation_errors.join("; ");

                    // Validating -> Retrying (or Exhausted)
                    let attempts = self
                        .retries
                        .increment(&spec.id, stage_key, FailureKind::Validation, summary)
                        .await?;
                    if attempts > max_retries {
                        return Err(OrchestratorError::RetryExhausted {
                            stage: stage_key.to_string(),
                            attempts,
                        });
                    }
                    retry_ctx = Some(RetryContext {
                        attempt: attempts + 1,
                        failure_kind: FailureKind::Validation,
                        validation_errors,
                        session_tail: outcome.tail,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_path_for_constitution_is_project_level() {
        let project_root = Path::new("/proj");
        let spec_dir = Path::new("/proj/specs/001-add-cache");
        let path = artifact_path_for(Stage::Constitution, project_root, spec_dir);
        assert_eq!(path, Path::new("/proj/.autospec/memory/constitution.yaml"));
    }

    #[test]
    fn artifact_path_for_tasks_is_spec_scoped() {
        let project_root = Path::new("/proj");
        let spec_dir = Path::new("/proj/specs/001-add-cache");
        let path = artifact_path_for(Stage::Tasks, project_root, spec_dir);
        assert_eq!(path, spec_dir.join("tasks.yaml"));
    }
}
