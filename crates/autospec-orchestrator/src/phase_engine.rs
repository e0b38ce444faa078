//! Drives the `implement` stage (spec.md §4.6), subdividing it into
//! phases or tasks, each run in a fresh agent session, with dependency
//! enforcement and phase-completion re-verification against the parsed
//! `tasks.yaml`, rather than trusting the agent's self-report.

use tokio_util::sync::CancellationToken;

use autospec_agent::{render_agent_command, AgentInvocation, AgentInvoker, TemplateVars};
use autospec_artifact::{ArtifactStore, Task, TaskStatus, TasksArtifact};
use autospec_config::types::{Configuration, ImplementMode, Stage};
use autospec_retry::{FailureKind, RetryStore};

use crate::error::{OrchestratorError, Result};
use crate::prompt::{build_prompt, PromptContext, RetryContext};
use crate::spec_ref::SpecRef;
use crate::stage_machine::StageState;

#[derive(Debug, Clone)]
pub struct ImplementOutcome {
    pub mode: ImplementMode,
    pub state: StageState,
}

pub struct PhaseEngine<'a> {
    artifacts: &'a ArtifactStore,
    retries: &'a RetryStore,
    invoker: &'a AgentInvoker,
}

impl<'a> PhaseEngine<'a> {
    pub fn new(artifacts: &'a ArtifactStore, retries: &'a RetryStore, invoker: &'a AgentInvoker) -> Self {
        Self {
            artifacts,
            retries,
            invoker,
        }
    }

    pub async fn run_implement(
        &self,
        spec: &SpecRef,
        config: &Configuration,
        cancel: CancellationToken,
    ) -> Result<ImplementOutcome> {
        let state = match config.implement_mode {
            ImplementMode::SingleSession => self.run_single_session(spec, config, cancel).await?,
            ImplementMode::Phases => self.run_phases(spec, config, cancel).await?,
            ImplementMode::Tasks => self.run_tasks(spec, config, cancel).await?,
        };
        Ok(ImplementOutcome {
            mode: config.implement_mode,
            state,
        })
    }

    fn tasks_path(spec: &SpecRef) -> std::path::PathBuf {
        spec.dir.join("tasks.yaml")
    }

    async fn load_tasks(&self, spec: &SpecRef) -> Result<TasksArtifact> {
        let doc = self.artifacts.load::<TasksArtifact>(&Self::tasks_path(spec)).await?;
        Ok(doc.body)
    }

    /// Every dependency of every actionable task in `phase` (possibly in
    /// an earlier phase) must be Completed before the phase may run.
    fn check_dependencies(tasks: &TasksArtifact, phase_number: u32) -> Result<()> {
        let Some(phase) = tasks.find_phase(phase_number) else {
            return Ok(());
        };
        for task in phase.actionable_tasks() {
            for dep in &task.dependencies {
                if !tasks
                    .find_task(dep)
                    .map(|d| d.status == TaskStatus::Completed)
                    .unwrap_or(false)
                {
                    return Err(OrchestratorError::DependencyNotSatisfied {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn roster_block(tasks: &[&Task]) -> String {
        if tasks.is_empty() {
            return "(no outstanding tasks)".to_string();
        }
        tasks
            .iter()
            .map(|t| {
                format!(
                    "- {} [{:?}] {} (depends on: {})",
                    t.id,
                    t.status,
                    t.title,
                    if t.dependencies.is_empty() {
                        "none".to_string()
                    } else {
                        t.dependencies.join(", ")
                    }
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run one agent session and loop Validating/Retrying until the
    /// given `is_done` predicate over a freshly re-parsed `tasks.yaml`
    /// is satisfied or the retry budget for `retry_key` is exhausted.
    #[allow(clippy::too_many_arguments)]
    async fn run_session_until<F>(
        &self,
        spec: &SpecRef,
        retry_key: &str,
        max_retries: u32,
        description: String,
        config: &Configuration,
        cancel: CancellationToken,
        is_done: F,
    ) -> Result<()>
    where
        F: Fn(&TasksArtifact) -> std::result::Result<bool, String>,
    {
        let mut retry_ctx: Option<RetryContext> = None;

        loop {
            let prompt_ctx = PromptContext {
                spec_id: spec.id.clone(),
                spec_dir: spec.dir.display().to_string(),
                autospec_version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: chrono::Utc::now(),
                description: Some(description.clone()),
            };
            let prompt_text = build_prompt(Stage::Implement, &prompt_ctx, retry_ctx.as_ref());
            let command = render_agent_command(config.agent_command.as_str(), &prompt_text, &TemplateVars::new())
                .map_err(OrchestratorError::Agent)?;

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
                let attempts = self.retries.increment(&spec.id, retry_key, FailureKind::Agent, summary).await?;
                if attempts > max_retries {
                    return Err(OrchestratorError::RetryExhausted {
                        stage: retry_key.to_string(),
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

            // Re-parse tasks.yaml rather than trusting the agent's self-report.
            let validation = self
                .artifacts
                .validate_file::<TasksArtifact>(&Self::tasks_path(spec))
                .await;
            if let Err(err) = validation {
                let validation_errors: Vec<String> = err
                    .validation_errors()
                    .map(|errors| errors.iter().map(|e| e.to_string()).collect())
                    .unwrap_or_else(|| vec![err.to_string()]);
                let summary = validation_errors.join("; ");
                let attempts = self
                    .retries
                    .increment(&spec.id, retry_key, FailureKind::Validation, summary)
                    .await?;
                if attempts > max_retries {
                    return Err(OrchestratorError::RetryExhausted {
                        stage: retry_key.to_string(),
                        attempts,
                    });
                }
                retry_ctx = Some(RetryContext {
                    attempt: attempts + 1,
                    failure_kind: FailureKind::Validation,
                    validation_errors,
                    session_tail: outcome.tail,
                });
                continue;
            }

            let tasks = self.load_tasks(spec).await?;
            let done_result = is_done(&tasks);
            match done_result {
                Ok(true) => {
                    self.retries.reset(&spec.id, retry_key).await?;
                    return Ok(());
                }
                Ok(false) | Err(_) => {
                    let detail = done_result.err().unwrap_or_else(|| "not yet complete".to_string());
                    let attempts = self
                        .retries
                        .increment(&spec.id, retry_key, FailureKind::Validation, detail.clone())
                        .await?;
                    if attempts > max_retries {
                        return Err(OrchestratorError::RetryExhausted {
                            stage: retry_key.to_string(),
                            attempts,
                        });
                    }
                    retry_ctx = Some(RetryContext {
                        attempt: attempts + 1,
                        failure_kind: FailureKind::Validation,
                        validation_errors: vec![detail],
                        session_tail: outcome.tail,
                    });
                }
            }
        }
    }

    async fn run_phases(&self, spec: &SpecRef, config: &Configuration, cancel: CancellationToken) -> Result<StageState> {
        let max_retries = config.max_retries_for(Stage::Implement);

        let mut phase_numbers: Vec<u32> = self.load_tasks(spec).await?.phases.iter().map(|p| p.number).collect();
        phase_numbers.sort_unstable();

        for phase_number in phase_numbers {
            let tasks = self.load_tasks(spec).await?;
            let Some(phase) = tasks.find_phase(phase_number) else {
                continue;
            };
            if phase.is_complete() {
                continue;
            }

            Self::check_dependencies(&tasks, phase_number)?;

            let original_ids: std::collections::BTreeSet<String> =
                phase.tasks.iter().map(|t| t.id.clone()).collect();
            let roster = Self::roster_block(&phase.actionable_tasks());
            let description = format!(
                "Implement phase {} ({}). Outstanding tasks:\n{}",
                phase_number, phase.name, roster
            );

            let retry_key = format!("implement:phase{phase_number}");
            self.run_session_until(
                spec,
                &retry_key,
                max_retries,
                description,
                config,
                cancel.clone(),
                move |tasks| {
                    let Some(phase) = tasks.find_phase(phase_number) else {
                        return Err(format!("phase {phase_number} is missing from tasks.yaml after the session"));
                    };
                    let current_ids: std::collections::BTreeSet<String> =
                        phase.tasks.iter().map(|t| t.id.clone()).collect();
                    if current_ids != original_ids {
                        return Err(format!(
                            "phase {phase_number}'s task roster changed mid-session (expected {:?}, found {:?})",
                            original_ids, current_ids
                        ));
                    }
                    if phase.is_complete() {
                        Ok(true)
                    } else {
                        Ok(false)
                    }
                },
            )
            .await?;
        }

        Ok(StageState::Success)
    }

    async fn run_tasks(&self, spec: &SpecRef, config: &Configuration, cancel: CancellationToken) -> Result<StageState> {
        let max_retries = config.max_retries_for(Stage::Implement);

        let mut all_ids: Vec<String> = self
            .load_tasks(spec)
            .await?
            .all_tasks()
            .map(|t| t.id.clone())
            .collect();
        all_ids.sort();

        for task_id in all_ids {
            let tasks = self.load_tasks(spec).await?;
            let Some(task) = tasks.find_task(&task_id) else {
                continue;
            };
            if task.status.is_terminal_for_phase() {
                continue;
            }
            if !tasks.dependencies_satisfied(&task_id) {
                let unmet = task
                    .dependencies
                    .iter()
                    .find(|d| {
                        tasks
                            .find_task(d)
                            .map(|t| t.status != TaskStatus::Completed)
                            .unwrap_or(true)
                    })
                    .cloned()
                    .unwrap_or_default();
                return Err(OrchestratorError::DependencyNotSatisfied {
                    task: task_id.clone(),
                    dependency: unmet,
                });
            }

            let description = format!("Implement task {}: {}", task.id, task.title);
            let retry_key = format!("implement:task{task_id}");
            let task_id_for_check = task_id.clone();
            self.run_session_until(
                spec,
                &retry_key,
                max_retries,
                description,
                config,
                cancel.clone(),
                move |tasks| match tasks.find_task(&task_id_for_check) {
                    Some(task) if task.status.is_terminal_for_phase() => Ok(true),
                    Some(_) => Ok(false),
                    None => Err(format!("task {task_id_for_check} is missing from tasks.yaml after the session")),
                },
            )
            .await?;
        }

        Ok(StageState::Success)
    }

    async fn run_single_session(
        &self,
        spec: &SpecRef,
        config: &Configuration,
        cancel: CancellationToken,
    ) -> Result<StageState> {
        let max_retries = config.max_retries_for(Stage::Implement);
        let tasks = self.load_tasks(spec).await?;
        let roster = Self::roster_block(&tasks.all_tasks().collect::<Vec<_>>());
        let description = format!("Implement the full task list in one session:\n{roster}");

        self.run_session_until(spec, "implement", max_retries, description, config, cancel, |tasks| {
            if tasks.phases.iter().all(|p| p.is_complete()) {
                Ok(true)
            } else {
                Ok(false)
            }
        })
        .await?;

        Ok(StageState::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autospec_artifact::{Phase, TaskType};

    fn task(id: &str, status: TaskStatus, deps: &[&str]) -> Task {
        let mut t = Task::new(id, format!("Task {id}"), TaskType::Implementation);
        t.status = status;
        t.dependencies = deps.iter().map(|s| s.to_string()).collect();
        t
    }

    #[test]
    fn dependency_check_fails_when_cross_phase_dependency_incomplete() {
        let tasks = TasksArtifact {
            summary: "s".into(),
            phases: vec![
                Phase {
                    number: 1,
                    name: "Setup".into(),
                    tasks: vec![task("T1", TaskStatus::Pending, &[])],
                },
                Phase {
                    number: 2,
                    name: "Build".into(),
                    tasks: vec![task("T2", TaskStatus::Pending, &["T1"])],
                },
            ],
        };
        assert!(PhaseEngine::check_dependencies(&tasks, 2).is_err());
    }

    #[test]
    fn dependency_check_passes_when_dependency_completed() {
        let tasks = TasksArtifact {
            summary: "s".into(),
            phases: vec![
                Phase {
                    number: 1,
                    name: "Setup".into(),
                    tasks: vec![task("T1", TaskStatus::Completed, &[])],
                },
                Phase {
                    number: 2,
                    name: "Build".into(),
                    tasks: vec![task("T2", TaskStatus::Pending, &["T1"])],
                },
            ],
        };
        assert!(PhaseEngine::check_dependencies(&tasks, 2).is_ok());
    }

    #[test]
    fn roster_block_lists_outstanding_tasks() {
        let t1 = task("T1", TaskStatus::Pending, &[]);
        let block = PhaseEngine::roster_block(&[&t1]);
        assert!(block.contains("T1"));
        assert!(block.contains("Pending"));
    }
}
