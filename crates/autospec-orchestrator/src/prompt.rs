//! Deterministic prompt assembly for a stage invocation.
//!
//! Modeled on the teacher's `cortex-engine::prompt_builder::PromptBuilder`
//! (sections with a title/content/priority, rendered in priority order),
//! narrowed to what spec.md §4.5 requires: a base context block plus,
//! on retry, a structured retry-context block. Construction never
//! touches randomness or wall-clock time beyond the timestamp supplied
//! by the caller, so the same inputs always produce the same text.

use chrono::{DateTime, Utc};

use autospec_config::types::Stage;
use autospec_retry::FailureKind;

/// Fixed facts about the invocation, independent of retry history.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub spec_id: String,
    pub spec_dir: String,
    pub autospec_version: String,
    pub timestamp: DateTime<Utc>,
    /// User-supplied stage description/instructions, if any.
    pub description: Option<String>,
}

/// Context injected on a retry attempt (spec.md §4.5: "prior attempt
/// number, prior failure kind, structured validation errors, and the
/// captured session tail").
#[derive(Debug, Clone)]
pub struct RetryContext {
    pub attempt: u32,
    pub failure_kind: FailureKind,
    pub validation_errors: Vec<String>,
    pub session_tail: String,
}

#[derive(Debug, Clone)]
struct Section {
    title: &'static str,
    content: String,
    priority: i32,
}

impl Section {
    fn render(&self) -> String {
        format!("## {}\n\n{}", self.title, self.content)
    }
}

/// Assemble the deterministic stage prompt. `retry` is `None` on the
/// first attempt.
pub fn build_prompt(stage: Stage, ctx: &PromptContext, retry: Option<&RetryContext>) -> String {
    let mut sections = vec![Section {
        title: "Task",
        content: format!(
            "Run the '{}' stage for spec '{}' located at '{}'.",
            stage, ctx.spec_id, ctx.spec_dir
        ),
        priority: 100,
    }];

    if let Some(description) = &ctx.description {
        sections.push(Section {
            title: "Stage instructions",
            content: description.clone(),
            priority: 90,
        });
    }

    sections.push(Section {
        title: "Context",
        content: format!(
            "spec_id: {}\nspec_dir: {}\nautospec_version: {}\ntimestamp: {}",
            ctx.spec_id,
            ctx.spec_dir,
            ctx.autospec_version,
            ctx.timestamp.to_rfc3339(),
        ),
        priority: 50,
    });

    if let Some(retry) = retry {
        let errors = if retry.validation_errors.is_empty() {
            "(none reported)".to_string()
        } else {
            retry
                .validation_errors
                .iter()
                .map(|e| format!("- {e}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        sections.push(Section {
            title: "Retry context",
            content: format!(
                "This is attempt {}. The previous attempt failed with kind '{}'.\n\n\
                 Validation errors from the previous attempt:\n{}\n\n\
                 Tail of the previous session's output:\n```\n{}\n```",
                retry.attempt, retry.failure_kind, errors, retry.session_tail,
            ),
            priority: 80,
        });
    }

    sections.sort_by(|a, b| b.priority.cmp(&a.priority));
    sections.iter().map(Section::render).collect::<Vec<_>>().join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PromptContext {
        PromptContext {
            spec_id: "001-add-cache".to_string(),
            spec_dir: "/specs/001-add-cache".to_string(),
            autospec_version: "0.1.0".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            description: None,
        }
    }

    #[test]
    fn same_inputs_produce_identical_prompt() {
        let a = build_prompt(Stage::Plan, &ctx(), None);
        let b = build_prompt(Stage::Plan, &ctx(), None);
        assert_eq!(a, b);
    }

    #[test]
    fn retry_context_appears_with_prior_attempt_details() {
        let retry = RetryContext {
            attempt: 2,
            failure_kind: FailureKind::Validation,
            validation_errors: vec!["tasks[0].id: duplicate task id 'T1'".to_string()],
            session_tail: "agent output tail".to_string(),
        };
        let prompt = build_prompt(Stage::Tasks, &ctx(), Some(&retry));
        assert!(prompt.contains("attempt 2"));
        assert!(prompt.contains("duplicate task id"));
        assert!(prompt.contains("agent output tail"));
    }

    #[test]
    fn first_attempt_has_no_retry_section() {
        let prompt = build_prompt(Stage::Specify, &ctx(), None);
        assert!(!prompt.contains("Retry context"));
    }
}
