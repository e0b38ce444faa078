//! `spec.yaml` body: feature description, user stories, requirements.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::{is_ears_id, is_user_story_id};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStory {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub statement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecArtifact {
    pub feature: String,
    pub user_stories: Vec<UserStory>,
    pub requirements: Vec<Requirement>,
}

impl SpecArtifact {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.feature.trim().is_empty() {
            errors.push(ValidationError::new("feature", "must not be empty"));
        }

        if self.user_stories.is_empty() {
            errors.push(ValidationError::new(
                "user_stories",
                "at least one user story is required",
            ));
        }

        for (i, story) in self.user_stories.iter().enumerate() {
            if !is_user_story_id(&story.id) {
                errors.push(ValidationError::new(
                    format!("user_stories[{}].id", i),
                    format!("'{}' does not match the required US-\\d+ format", story.id),
                ));
            }
        }

        for (i, req) in self.requirements.iter().enumerate() {
            if !is_ears_id(&req.id) {
                errors.push(ValidationError::new(
                    format!("requirements[{}].id", i),
                    format!("'{}' does not match the required EARS-\\d+ format", req.id),
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
    fn happy_path_spec_validates_clean() {
        let spec = SpecArtifact {
            feature: "Add caching layer".into(),
            user_stories: vec![UserStory {
                id: "US-001".into(),
                title: "Cache reads".into(),
                description: "As a user I want faster reads".into(),
                priority: Some("P1".into()),
            }],
            requirements: vec![Requirement {
                id: "EARS-001".into(),
                statement: "When a read repeats, the system shall serve it from cache".into(),
            }],
        };
        assert!(spec.validate().is_empty());
    }

    #[test]
    fn missing_requirements_field_is_tolerated_empty_vec_but_empty_feature_fails() {
        let spec = SpecArtifact {
            feature: "".into(),
            user_stories: vec![],
            requirements: vec![],
        };
        let errors = spec.validate();
        assert!(errors.iter().any(|e| e.path == "feature"));
        assert!(errors.iter().any(|e| e.path == "user_stories"));
    }
}
