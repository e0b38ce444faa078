//! `analysis.yaml` body: cross-artifact consistency findings produced
//! by the `analyze` stage over `spec.yaml`, `plan.yaml`, and `tasks.yaml`.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisArtifact {
    pub summary: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl AnalysisArtifact {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let mut seen = std::collections::HashSet::new();
        for (i, finding) in self.findings.iter().enumerate() {
            if !seen.insert(finding.id.as_str()) {
                errors.push(ValidationError::new(
                    format!("findings[{i}].id"),
                    format!("duplicate finding id '{}'", finding.id),
                ));
            }
        }

        errors
    }

    pub fn has_critical_findings(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_finding_ids() {
        let analysis = AnalysisArtifact {
            summary: "s".into(),
            findings: vec![
                Finding {
                    id: "F1".into(),
                    severity: Severity::Info,
                    description: "a".into(),
                },
                Finding {
                    id: "F1".into(),
                    severity: Severity::Warning,
                    description: "b".into(),
                },
            ],
        };
        let errors = analysis.validate();
        assert!(errors.iter().any(|e| e.message.contains("duplicate finding id")));
    }

    #[test]
    fn detects_critical_findings() {
        let analysis = AnalysisArtifact {
            summary: "s".into(),
            findings: vec![Finding {
                id: "F1".into(),
                severity: Severity::Critical,
                description: "broken reference".into(),
            }],
        };
        assert!(analysis.has_critical_findings());
    }
}
