//! The raw, fully-optional shape read from `.autospec/config.toml`.
//! Every field is optional so a project can override only what it needs;
//! absent fields fall back to defaults, then to `ConfigOverrides`.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{ImplementMode, LogFormat, OnConflict, Stage};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigToml {
    pub specs_root: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub agent_command: Option<String>,
    #[serde(default)]
    pub stage_retry: HashMap<Stage, u32>,
    pub default_max_retries: Option<u32>,
    pub invocation_timeout_secs: Option<u64>,
    pub skip_confirmations: Option<bool>,
    pub implement_mode: Option<ImplementMode>,
    pub log_format: Option<LogFormat>,

    #[serde(default)]
    pub worktree: WorktreeToml,
    #[serde(default)]
    pub dag: DagToml,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorktreeToml {
    pub base_dir: Option<PathBuf>,
    pub prefix: Option<String>,
    pub setup_script: Option<PathBuf>,
    pub auto_setup: Option<bool>,
    pub copy_dirs: Option<Vec<String>>,
    pub setup_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DagToml {
    pub on_conflict: Option<OnConflict>,
    pub base_branch: Option<String>,
    pub max_spec_retries: Option<u32>,
    pub max_log_size: Option<u64>,
    pub autocommit: Option<bool>,
    pub autocommit_cmd: Option<String>,
    pub autocommit_retries: Option<u32>,
    pub max_parallel: Option<usize>,
}
