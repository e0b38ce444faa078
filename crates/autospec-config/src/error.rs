//! Error type for configuration loading.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("agent command template is missing the required {{{{PROMPT}}}} placeholder")]
    MissingPromptPlaceholder,

    #[error("home directory could not be determined and AUTOSPEC_HOME is unset")]
    NoHomeDirectory,
}
