//! The resolved `Configuration` record (spec.md §6, SPEC_FULL.md §10.1).
//!
//! The core never reads configuration from disk; `autospec-config`
//! produces one frozen `Configuration` value that the CLI hands to the
//! orchestrator and DAG executor.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Canonical workflow stage order: `constitution -> specify -> clarify
/// -> plan -> tasks -> checklist -> analyze -> implement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Constitution,
    Specify,
    Clarify,
    Plan,
    Tasks,
    Checklist,
    Analyze,
    Implement,
}

impl Stage {
    pub const CANONICAL_ORDER: [Stage; 8] = [
        Stage::Constitution,
        Stage::Specify,
        Stage::Clarify,
        Stage::Plan,
        Stage::Tasks,
        Stage::Checklist,
        Stage::Analyze,
        Stage::Implement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Constitution => "constitution",
            Stage::Specify => "specify",
            Stage::Clarify => "clarify",
            Stage::Plan => "plan",
            Stage::Tasks => "tasks",
            Stage::Checklist => "checklist",
            Stage::Analyze => "analyze",
            Stage::Implement => "implement",
        }
    }

    /// The stage whose artifact must exist before this one may run, if any.
    pub fn prerequisite(&self) -> Option<Stage> {
        match self {
            Stage::Constitution => None,
            Stage::Specify => Some(Stage::Constitution),
            Stage::Clarify => Some(Stage::Specify),
            Stage::Plan => Some(Stage::Specify),
            Stage::Tasks => Some(Stage::Plan),
            Stage::Checklist => Some(Stage::Tasks),
            Stage::Analyze => Some(Stage::Tasks),
            Stage::Implement => Some(Stage::Tasks),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementMode {
    SingleSession,
    Phases,
    Tasks,
}

impl Default for ImplementMode {
    fn default() -> Self {
        Self::Phases
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Human,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Human
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnConflict {
    Manual,
    Agent,
}

impl Default for OnConflict {
    fn default() -> Self {
        Self::Manual
    }
}

/// An agent command template; validated once, at construction, to carry
/// the required `{{PROMPT}}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentCommandTemplate(String);

impl AgentCommandTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains("{{PROMPT}}") {
            return Err(ConfigError::MissingPromptPlaceholder);
        }
        Ok(Self(template))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AgentCommandTemplate {
    type Error = ConfigError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AgentCommandTemplate> for String {
    fn from(value: AgentCommandTemplate) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeConfig {
    pub base_dir: PathBuf,
    pub prefix: String,
    pub setup_script: Option<PathBuf>,
    pub auto_setup: bool,
    pub copy_dirs: Vec<String>,
    #[serde(with = "duration_secs")]
    pub setup_timeout: Duration,
}

impl Default for WorktreeConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".autospec/worktrees"),
            prefix: String::new(),
            setup_script: None,
            auto_setup: false,
            copy_dirs: vec![".autospec".to_string()],
            setup_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagConfig {
    pub on_conflict: OnConflict,
    pub base_branch: String,
    pub max_spec_retries: u32,
    pub max_log_size: u64,
    pub autocommit: bool,
    pub autocommit_cmd: Option<String>,
    pub autocommit_retries: u32,
    pub max_parallel: usize,
}

impl Default for DagConfig {
    fn default() -> Self {
        Self {
            on_conflict: OnConflict::default(),
            base_branch: "main".to_string(),
            max_spec_retries: 3,
            max_log_size: 10 * 1024 * 1024,
            autocommit: false,
            autocommit_cmd: None,
            autocommit_retries: 1,
            max_parallel: default_max_parallel(),
        }
    }
}

fn default_max_parallel() -> usize {
    std::thread::available_parallelism().map(|n| n.get().min(4)).unwrap_or(2)
}

/// The fully resolved, frozen configuration handed to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub specs_root: PathBuf,
    pub state_dir: PathBuf,
    pub agent_command: AgentCommandTemplate,
    pub stage_retry: HashMap<Stage, u32>,
    pub default_max_retries: u32,
    /// Zero means no timeout.
    #[serde(with = "duration_secs")]
    pub invocation_timeout: Duration,
    pub skip_confirmations: bool,
    pub implement_mode: ImplementMode,
    pub worktree: WorktreeConfig,
    pub dag: DagConfig,
    pub log_format: LogFormat,
}

impl Configuration {
    /// Retry bound for a stage: the per-stage override if set, else the default.
    pub fn max_retries_for(&self, stage: Stage) -> u32 {
        self.stage_retry.get(&stage).copied().unwrap_or(self.default_max_retries)
    }

    /// `None` when the invocation timeout is configured as "no timeout" (0).
    pub fn invocation_timeout(&self) -> Option<Duration> {
        if self.invocation_timeout.is_zero() {
            None
        } else {
            Some(self.invocation_timeout)
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        value.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_prerequisite_chain_matches_canonical_order() {
        assert_eq!(Stage::Constitution.prerequisite(), None);
        assert_eq!(Stage::Specify.prerequisite(), Some(Stage::Constitution));
        assert_eq!(Stage::Implement.prerequisite(), Some(Stage::Tasks));
    }

    #[test]
    fn agent_command_template_requires_prompt_placeholder() {
        assert!(AgentCommandTemplate::new("agent --prompt {{PROMPT}}").is_ok());
        assert!(matches!(
            AgentCommandTemplate::new("agent --no-placeholder"),
            Err(ConfigError::MissingPromptPlaceholder)
        ));
    }

    #[test]
    fn zero_invocation_timeout_means_no_timeout() {
        let config = Configuration {
            specs_root: PathBuf::from("specs"),
            state_dir: PathBuf::from(".autospec/state"),
            agent_command: AgentCommandTemplate::new("agent {{PROMPT}}").unwrap(),
            stage_retry: HashMap::new(),
            default_max_retries: 3,
            invocation_timeout: Duration::ZERO,
            skip_confirmations: false,
            implement_mode: ImplementMode::default(),
            worktree: WorktreeConfig::default(),
            dag: DagConfig::default(),
            log_format: LogFormat::default(),
        };
        assert_eq!(config.invocation_timeout(), None);
    }
}
