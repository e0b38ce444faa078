//! `checklist.yaml` body: the reviewer-facing checklist produced by the
//! `checklist` stage from an approved `tasks.yaml`.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistArtifact {
    pub summary: String,
    pub items: Vec<ChecklistItem>,
}

impl ChecklistArtifact {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.items.is_empty() {
            errors.push(ValidationError::new("items", "at least one checklist item is required"));
        }

        let mut seen = std::collections::HashSet::new();
        for (i, item) in self.items.iter().enumerate() {
            if !seen.insert(item.id.as_str()) {
                errors.push(ValidationError::new(
                    format!("items[{i}].id"),
                    format!("duplicate checklist item id '{}'", item.id),
                ));
            }
        }

        errors
    }

    pub fn all_checked(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.checked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_item_ids() {
        let checklist = ChecklistArtifact {
            summary: "s".into(),
            items: vec![
                ChecklistItem {
                    id: "C1".into(),
                    description: "a".into(),
                    checked: false,
                },
                ChecklistItem {
                    id: "C1".into(),
                    description: "b".into(),
                    checked: false,
                },
            ],
        };
        let errors = checklist.validate();
        assert!(errors.iter().any(|e| e.message.contains("duplicate checklist item id")));
    }

    #[test]
    fn all_checked_false_when_empty() {
        let checklist = ChecklistArtifact {
            summary: "s".into(),
            items: vec![],
        };
        assert!(!checklist.all_checked());
    }
}
