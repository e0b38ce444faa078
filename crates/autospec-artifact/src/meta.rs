//! The `_meta` block required on every artifact.

use serde::{Deserialize, Serialize};

/// Current major schema version understood by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Closed set of artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Spec,
    Plan,
    Tasks,
    Constitution,
    Checklist,
    Analysis,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Spec => "spec",
            ArtifactType::Plan => "plan",
            ArtifactType::Tasks => "tasks",
            ArtifactType::Constitution => "constitution",
            ArtifactType::Checklist => "checklist",
            ArtifactType::Analysis => "analysis",
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Required `_meta` block carried by every artifact document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Major schema version the document was written against.
    pub schema_version: u32,
    /// Identity of the generator that produced the artifact (e.g. agent name/version).
    pub generator: String,
    /// Creation timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Declared artifact kind; must match the kind the store was asked to load.
    pub artifact_type: ArtifactType,
}

impl ArtifactMeta {
    pub fn new(artifact_type: ArtifactType, generator: impl Into<String>) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            generator: generator.into(),
            created_at: chrono::Utc::now(),
            artifact_type,
        }
    }

    /// Major-version compatibility check (spec.md §3: "forces a migration
    /// path, not silent parse").
    pub fn is_compatible(&self) -> bool {
        self.schema_version == CURRENT_SCHEMA_VERSION
    }
}
