//! `plan.yaml` body: the technical plan produced from an approved spec.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationPhase {
    pub number: u32,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanArtifact {
    pub plan: String,
    pub summary: String,
    pub technical_context: String,
    pub implementation_phases: Vec<ImplementationPhase>,
}

impl PlanArtifact {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.plan.trim().is_empty() {
            errors.push(ValidationError::new("plan", "must not be empty"));
        }

        if self.implementation_phases.is_empty() {
            errors.push(ValidationError::new(
                "implementation_phases",
                "at least one implementation phase is required",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for (i, phase) in self.implementation_phases.iter().enumerate() {
            if !seen.insert(phase.number) {
                errors.push(ValidationError::new(
                    format!("implementation_phases[{}].number", i),
                    format!("duplicate phase number {}", phase.number),
                ));
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_phase_numbers() {
        let plan = PlanArtifact {
            plan: "Do it".into(),
            summary: "s".into(),
            technical_context: "ctx".into(),
            implementation_phases: vec![
                ImplementationPhase {
                    number: 1,
                    name: "A".into(),
                    description: "a".into(),
                },
                ImplementationPhase {
                    number: 1,
                    name: "B".into(),
                    description: "b".into(),
                },
            ],
        };
        let errors = plan.validate();
        assert!(errors.iter().any(|e| e.message.contains("duplicate phase number")));
    }
}
