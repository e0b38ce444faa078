//! The `ArtifactBody` trait ties a Rust type to one of the closed
//! `_meta.artifact_type` values and its schema-validation routine.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::analysis_artifact::AnalysisArtifact;
use crate::checklist_artifact::ChecklistArtifact;
use crate::constitution::ConstitutionArtifact;
use crate::error::ValidationError;
use crate::meta::ArtifactType;
use crate::plan_artifact::PlanArtifact;
use crate::spec_artifact::SpecArtifact;
use crate::task::TasksArtifact;

/// A typed artifact body: the part of the document below `_meta`.
pub trait ArtifactBody: Serialize + DeserializeOwned {
    const ARTIFACT_TYPE: ArtifactType;

    fn validate_body(&self) -> Vec<ValidationError>;
}

impl ArtifactBody for SpecArtifact {
    const ARTIFACT_TYPE: ArtifactType = ArtifactType::Spec;

    fn validate_body(&self) -> Vec<ValidationError> {
        self.validate()
    }
}

impl ArtifactBody for PlanArtifact {
    const ARTIFACT_TYPE: ArtifactType = ArtifactType::Plan;

    fn validate_body(&self) -> Vec<ValidationError> {
        self.validate()
    }
}

impl ArtifactBody for TasksArtifact {
    const ARTIFACT_TYPE: ArtifactType = ArtifactType::Tasks;

    fn validate_body(&self) -> Vec<ValidationError> {
        self.validate()
    }
}

impl ArtifactBody for ConstitutionArtifact {
    const ARTIFACT_TYPE: ArtifactType = ArtifactType::Constitution;

    fn validate_body(&self) -> Vec<ValidationError> {
        self.validate()
    }
}

impl ArtifactBody for ChecklistArtifact {
    const ARTIFACT_TYPE: ArtifactType = ArtifactType::Checklist;

    fn validate_body(&self) -> Vec<ValidationError> {
        self.validate()
    }
}

impl ArtifactBody for AnalysisArtifact {
    const ARTIFACT_TYPE: ArtifactType = ArtifactType::Analysis;

    fn validate_body(&self) -> Vec<ValidationError> {
        self.validate()
    }
}
