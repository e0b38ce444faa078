//! Error type for the retry-state store.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetryError>;

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt retry-state file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
