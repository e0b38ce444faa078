//! `.autospec/memory/constitution.yaml`: project principles.
//!
//! Required to exist before any workflow stage runs (spec.md §6).

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principle {
    pub title: String,
    pub statement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstitutionArtifact {
    pub principles: Vec<Principle>,
}

impl ConstitutionArtifact {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.principles.is_empty() {
            errors.push(ValidationError::new(
                "principles",
                "at least one principle is required",
            ));
        }
        errors
    }
}
