//! Commit-recovery flow (spec.md §4.9.1): when a spec's implement stage
//! reports success but commit verification finds no real commits,
//! either run a user-supplied commit command or a fresh commit-only
//! agent session, then re-verify, up to a configured retry count.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use autospec_agent::{render_agent_command, AgentInvocation, AgentInvoker, TemplateVars};
use autospec_config::types::{AgentCommandTemplate, DagConfig};
use autospec_git::{verify, CommitVerification, Git};

use crate::error::{DagError, Result};

const COMMIT_ONLY_PROMPT: &str = "The previous session's changes were not committed. \
Stage and commit all outstanding changes in this worktree with a descriptive commit \
message. Do not make further code changes.";

/// Template variables available to `autocommit_cmd` (spec.md §4.9.1).
pub struct RecoveryContext<'a> {
    pub spec_id: &'a str,
    pub worktree: &'a Path,
    pub branch: &'a str,
    pub base_branch: &'a str,
    pub dag_id: &'a str,
}

impl RecoveryContext<'_> {
    fn template_vars(&self) -> TemplateVars {
        TemplateVars::new()
            .set("spec_id", self.spec_id)
            .set("worktree", self.worktree.to_string_lossy().into_owned())
            .set("branch", self.branch)
            .set("base_branch", self.base_branch)
            .set("dag_id", self.dag_id)
    }
}

/// Attempt commit recovery up to `config.autocommit_retries` times,
/// re-verifying after each attempt. Returns the first passing
/// verification, or the last (failing) one if every attempt is
/// exhausted without passing.
pub async fn recover(
    worktree_git: &Git,
    ctx: &RecoveryContext<'_>,
    config: &DagConfig,
    agent_command: &AgentCommandTemplate,
    invoker: &AgentInvoker,
    cancel: CancellationToken,
) -> Result<CommitVerification> {
    let mut last = verify(worktree_git, ctx.base_branch).await?;

    if last.passed() || !config.autocommit {
        return Ok(last);
    }

    for attempt in 1..=config.autocommit_retries.max(1) {
        tracing::info!(spec_id = ctx.spec_id, attempt, "attempting commit recovery");

        let command = match &config.autocommit_cmd {
            Some(template) => ctx.template_vars().render(template),
            None => render_agent_command(agent_command.as_str(), COMMIT_ONLY_PROMPT, &TemplateVars::new())
                .map_err(DagError::from)?,
        };

        let invocation = AgentInvocation::new(command, ctx.worktree).with_timeout(Duration::from_secs(300));
        let outcome = invoker.run(invocation, cancel.clone()).await?;
        if !outcome.succeeded() {
            tracing::warn!(spec_id = ctx.spec_id, attempt, tail = %outcome.tail, "commit recovery command failed");
        }

        last = verify(worktree_git, ctx.base_branch).await?;
        if last.passed() {
            return Ok(last);
        }
    }

    Ok(last)
}
