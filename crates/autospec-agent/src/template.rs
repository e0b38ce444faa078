//! `{{VAR}}` substitution for agent command templates and autocommit
//! command templates (spec.md §5.3: `{{spec_id}}`, `{{worktree}}`,
//! `{{branch}}`, `{{base_branch}}`, `{{dag_id}}`).

use std::collections::BTreeMap;

use crate::error::{AgentError, Result};

/// A set of `{{name}}` -> value substitutions applied to a command
/// template. Order-independent; unknown placeholders are left as-is so a
/// shell-level environment variable of the same name can still resolve
/// them.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars(BTreeMap<String, String>);

impl TemplateVars {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn render(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (name, value) in &self.0 {
            out = out.replace(&format!("{{{{{name}}}}}"), value);
        }
        out
    }
}

/// Validate that an agent command template contains the required
/// `{{PROMPT}}` placeholder, then render it with the prompt body and any
/// additional variables substituted in.
pub fn render_agent_command(template: &str, prompt: &str, extra: &TemplateVars) -> Result<String> {
    if !template.contains("{{PROMPT}}") {
        return Err(AgentError::MissingPromptPlaceholder);
    }
    let with_extras = extra.render(template);
    Ok(with_extras.replace("{{PROMPT}}", prompt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_prompt_and_extra_vars() {
        let vars = TemplateVars::new()
            .set("spec_id", "001-add-cache")
            .set("dag_id", "nightly");
        let rendered =
            render_agent_command("agent run --id {{dag_id}}/{{spec_id}} \"{{PROMPT}}\"", "do the thing", &vars)
                .unwrap();
        assert_eq!(rendered, "agent run --id nightly/001-add-cache \"do the thing\"");
    }

    #[test]
    fn missing_prompt_placeholder_is_rejected() {
        let vars = TemplateVars::new();
        let err = render_agent_command("agent run", "do the thing", &vars).unwrap_err();
        assert!(matches!(err, AgentError::MissingPromptPlaceholder));
    }

    #[test]
    fn unknown_placeholder_is_left_untouched() {
        let vars = TemplateVars::new();
        let rendered = render_agent_command("agent {{PROMPT}} --env {{UNKNOWN}}", "hi", &vars).unwrap();
        assert_eq!(rendered, "agent hi --env {{UNKNOWN}}");
    }
}
