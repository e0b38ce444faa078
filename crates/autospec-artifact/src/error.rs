//! Error types for the artifact store.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for artifact operations.
pub type Result<T> = std::result::Result<T, ArtifactError>;

/// A single schema or referential-integrity violation.
///
/// Validation collects every violation instead of failing on the first one,
/// so a retry prompt can present all issues to the agent at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `tasks[2].dependencies[0]`.
    pub path: String,
    /// Human-readable explanation.
    pub message: String,
    /// Line number in the source YAML, when known.
    pub line: Option<usize>,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {}): {}", self.path, line, self.message),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

/// Main error type for the artifact store.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML syntax error: {0}")]
    Syntax(#[from] serde_yaml::Error),

    #[error("artifact failed validation with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error("unsupported major schema version {found} (tool supports {supported}); migration required")]
    VersionMismatch { found: u32, supported: u32 },

    #[error("artifact not found: {path}")]
    NotFound { path: PathBuf },
}

impl ArtifactError {
    /// Collected validation errors, if this is a `Validation` variant.
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            ArtifactError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
