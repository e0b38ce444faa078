//! Merges defaults, the project config file, `AUTOSPEC_*` environment
//! variables, and CLI overrides into one frozen [`Configuration`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::discovery::{find_project_config, AUTOSPEC_CONFIG_ENV};
use crate::error::{ConfigError, Result};
use crate::overrides::ConfigOverrides;
use crate::toml_shape::ConfigToml;
use crate::types::{AgentCommandTemplate, Configuration, DagConfig, WorktreeConfig};

const DEFAULT_AGENT_COMMAND: &str = "agent --prompt {{PROMPT}}";

/// Read and parse `.autospec/config.toml`, starting from `AUTOSPEC_CONFIG`
/// if set, else walking up from `project_root`.
fn load_toml(project_root: &Path) -> Result<ConfigToml> {
    let path = if let Ok(explicit) = std::env::var(AUTOSPEC_CONFIG_ENV) {
        Some(PathBuf::from(explicit))
    } else {
        find_project_config(project_root)
    };

    let Some(path) = path else {
        return Ok(ConfigToml::default());
    };

    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

/// Build the frozen `Configuration` record: defaults -> project file ->
/// environment -> CLI overrides (spec.md §4.13's merge order).
pub fn load(project_root: &Path, overrides: ConfigOverrides) -> Result<Configuration> {
    let toml = load_toml(project_root)?;

    let specs_root = overrides
        .specs_root
        .or(toml.specs_root)
        .unwrap_or_else(|| project_root.join("specs"));

    let state_dir = overrides
        .state_dir
        .or(toml.state_dir)
        .unwrap_or_else(|| project_root.join(".autospec/state"));

    let agent_command_str = overrides
        .agent_command
        .or(toml.agent_command)
        .unwrap_or_else(|| DEFAULT_AGENT_COMMAND.to_string());
    let agent_command = AgentCommandTemplate::new(agent_command_str)?;

    let default_max_retries = overrides.default_max_retries.or(toml.default_max_retries).unwrap_or(3);

    let invocation_timeout_secs = overrides
        .invocation_timeout_secs
        .or(toml.invocation_timeout_secs)
        .unwrap_or(0);

    let skip_confirmations = overrides.skip_confirmations.or(toml.skip_confirmations).unwrap_or(false);

    let implement_mode = overrides.implement_mode.or(toml.implement_mode).unwrap_or_default();

    let log_format = overrides.log_format.or(toml.log_format).unwrap_or_default();

    let default_worktree = WorktreeConfig::default();
    let worktree = WorktreeConfig {
        base_dir: toml.worktree.base_dir.unwrap_or(default_worktree.base_dir),
        prefix: toml.worktree.prefix.unwrap_or(default_worktree.prefix),
        setup_script: toml.worktree.setup_script.or(default_worktree.setup_script),
        auto_setup: toml.worktree.auto_setup.unwrap_or(default_worktree.auto_setup),
        copy_dirs: toml.worktree.copy_dirs.unwrap_or(default_worktree.copy_dirs),
        setup_timeout: toml
            .worktree
            .setup_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(default_worktree.setup_timeout),
    };

    let default_dag = DagConfig::default();
    let dag = DagConfig {
        on_conflict: toml.dag.on_conflict.unwrap_or(default_dag.on_conflict),
        base_branch: toml.dag.base_branch.unwrap_or(default_dag.base_branch),
        max_spec_retries: toml.dag.max_spec_retries.unwrap_or(default_dag.max_spec_retries),
        max_log_size: toml.dag.max_log_size.unwrap_or(default_dag.max_log_size),
        autocommit: toml.dag.autocommit.unwrap_or(default_dag.autocommit),
        autocommit_cmd: toml.dag.autocommit_cmd.or(default_dag.autocommit_cmd),
        autocommit_retries: toml.dag.autocommit_retries.unwrap_or(default_dag.autocommit_retries),
        max_parallel: toml.dag.max_parallel.unwrap_or(default_dag.max_parallel),
    };

    Ok(Configuration {
        specs_root,
        state_dir,
        agent_command,
        stage_retry: toml.stage_retry,
        default_max_retries,
        invocation_timeout: Duration::from_secs(invocation_timeout_secs),
        skip_confirmations,
        implement_mode,
        worktree,
        dag,
        log_format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_no_project_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(dir.path(), ConfigOverrides::default()).unwrap();

        assert_eq!(config.specs_root, dir.path().join("specs"));
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.invocation_timeout(), None);
    }

    #[test]
    fn project_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".autospec")).unwrap();
        std::fs::write(
            dir.path().join(".autospec/config.toml"),
            r#"
default_max_retries = 5

[dag]
base_branch = "develop"
max_parallel = 2
"#,
        )
        .unwrap();

        let config = load(dir.path(), ConfigOverrides::default()).unwrap();
        assert_eq!(config.default_max_retries, 5);
        assert_eq!(config.dag.base_branch, "develop");
        assert_eq!(config.dag.max_parallel, 2);
    }

    #[test]
    fn cli_overrides_win_over_project_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".autospec")).unwrap();
        std::fs::write(dir.path().join(".autospec/config.toml"), "default_max_retries = 5\n").unwrap();

        let overrides = ConfigOverrides {
            default_max_retries: Some(9),
            ..Default::default()
        };
        let config = load(dir.path(), overrides).unwrap();
        assert_eq!(config.default_max_retries, 9);
    }
}
