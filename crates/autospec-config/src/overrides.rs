//! CLI-supplied overrides, applied last in the merge order (spec.md §4.13:
//! defaults -> project file -> environment -> CLI flags). The CLI binary
//! builds this from `clap`-parsed flags; the core never constructs it.

use std::path::PathBuf;

use crate::types::{ImplementMode, LogFormat};

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub project_root: Option<PathBuf>,
    pub specs_root: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub agent_command: Option<String>,
    pub default_max_retries: Option<u32>,
    pub invocation_timeout_secs: Option<u64>,
    pub skip_confirmations: Option<bool>,
    pub implement_mode: Option<ImplementMode>,
    pub log_format: Option<LogFormat>,
}
