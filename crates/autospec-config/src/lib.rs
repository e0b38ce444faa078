//! Resolves the frozen `Configuration` record consumed by the
//! orchestrator and DAG executor: built-in defaults, a project
//! `.autospec/config.toml`, `AUTOSPEC_*` environment variables, and
//! CLI-supplied overrides, merged in that order. The core never reads
//! configuration from disk itself.

pub mod discovery;
pub mod error;
pub mod loader;
pub mod overrides;
pub mod toml_shape;
pub mod types;

pub use discovery::{find_autospec_home, find_project_config, AUTOSPEC_CONFIG_ENV, AUTOSPEC_HOME_ENV};
pub use error::{ConfigError, Result};
pub use loader::load;
pub use overrides::ConfigOverrides;
pub use toml_shape::ConfigToml;
pub use types::{
    AgentCommandTemplate, Configuration, DagConfig, ImplementMode, LogFormat, OnConflict, Stage,
    WorktreeConfig,
};
