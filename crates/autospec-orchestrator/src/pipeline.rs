//! Top-level single-spec driver: runs the canonical stage order (or a
//! user-selected subset, still in canonical order) through the stage
//! orchestrator, delegating `implement` to the phase engine.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use autospec_agent::AgentInvoker;
use autospec_artifact::ArtifactStore;
use autospec_config::types::{Configuration, Stage};
use autospec_retry::RetryStore;

use crate::error::{OrchestratorError, Result};
use crate::lock::SpecLock;
use crate::phase_engine::PhaseEngine;
use crate::spec_ref::SpecRef;
use crate::stage_machine::{artifact_path_for, StageOrchestrator};

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub completed_stages: Vec<Stage>,
}

pub struct Pipeline<'a> {
    stage: StageOrchestrator<'a>,
    phase: PhaseEngine<'a>,
}

impl<'a> Pipeline<'a> {
    pub fn new(artifacts: &'a ArtifactStore, retries: &'a RetryStore, invoker: &'a AgentInvoker) -> Self {
        Self {
            stage: StageOrchestrator::new(artifacts, retries, invoker),
            phase: PhaseEngine::new(artifacts, retries, invoker),
        }
    }

    /// Run `only` (or, if `None`, every canonical stage) against `spec`.
    /// `only` may be given out of order; execution always follows
    /// canonical order regardless (spec.md §4.5).
    pub async fn run(
        &self,
        project_root: &Path,
        spec: &SpecRef,
        only: Option<&[Stage]>,
        config: &Configuration,
        cancel: CancellationToken,
    ) -> Result<PipelineOutcome> {
        let _lock = SpecLock::try_acquire(&config.state_dir, &spec.id)?;

        let selected: Vec<Stage> = match only {
            Some(stages) => Stage::CANONICAL_ORDER
                .iter()
                .copied()
                .filter(|s| stages.contains(s))
                .collect(),
            None => Stage::CANONICAL_ORDER.to_vec(),
        };

        // "Selecting a stage whose prerequisite is missing is a fatal
        // pre-flight error" — checked up front for every selected stage
        // whose prerequisite was *not itself* selected to run first.
        for &stage in &selected {
            if let Some(prerequisite) = stage.prerequisite() {
                if selected.contains(&prerequisite) {
                    continue;
                }
                let prereq_path = artifact_path_for(prerequisite, project_root, &spec.dir);
                if !prereq_path.is_file() {
                    return Err(OrchestratorError::MissingPrerequisite {
                        stage: stage.to_string(),
                        prerequisite: prerequisite.to_string(),
                    });
                }
            }
        }

        let mut completed = Vec::new();
        for stage in selected {
            let span = tracing::info_span!("stage", spec_id = %spec.id, stage = %stage);
            let _enter = span.enter();

            if stage == Stage::Implement {
                self.phase.run_implement(spec, config, cancel.clone()).await?;
            } else {
                self.stage
                    .run_stage(project_root, spec, stage, None, config, cancel.clone())
                    .await?;
            }
            tracing::info!(spec_id = %spec.id, stage = %stage, "stage complete");
            completed.push(stage);
        }

        Ok(PipelineOutcome {
            completed_stages: completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_filter_preserves_canonical_order_regardless_of_input_order() {
        let requested = [Stage::Tasks, Stage::Constitution, Stage::Plan];
        let selected: Vec<Stage> = Stage::CANONICAL_ORDER
            .iter()
            .copied()
            .filter(|s| requested.contains(s))
            .collect();
        assert_eq!(selected, vec![Stage::Constitution, Stage::Plan, Stage::Tasks]);
    }
}
