//! Error type for agent invocation.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent command template is missing the {{{{PROMPT}}}} placeholder")]
    MissingPromptPlaceholder,

    #[error("failed to spawn agent command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait on agent process: {0}")]
    Wait(#[source] std::io::Error),
}
