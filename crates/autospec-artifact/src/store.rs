//! The artifact store: read, validate, and atomically write YAML artifacts.
//!
//! Validation is two-pass (spec.md §4.1): (a) YAML syntactic validity via
//! `serde_yaml`'s decoder, which reports a line number on malformed input;
//! (b) schema validity — required fields, enums, ID formats, referential
//! integrity — collected into a `Vec<ValidationError>` rather than
//! returned fail-fast, so a retry prompt can show every problem at once.
//!
//! Writes are crash-atomic: serialize to a temp file in the same
//! directory, then `rename` over the target (teacher pattern: DagStore in
//! `cortex-agents::task::persistence` writes via `tokio::fs::write`
//! directly to the final path for append-only stores; artifacts here are
//! mutated in place across retries, so we additionally guard against a
//! torn write with the temp-then-rename two-step).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::body::ArtifactBody;
use crate::error::{ArtifactError, Result, ValidationError};
use crate::meta::ArtifactMeta;

/// The full on-disk shape of an artifact: `_meta` plus a flattened body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDocument<T> {
    #[serde(rename = "_meta")]
    pub meta: ArtifactMeta,
    #[serde(flatten)]
    pub body: T,
}

/// A fix applied by `auto_fix`, for inclusion in the CLI's user-visible report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedFix {
    pub field: String,
    pub description: String,
}

/// Result of an auto-fix pass: the patched document (if any fix applied)
/// and the list of fixes. Auto-fix never invents required business
/// fields (spec.md §4.1) — only `_meta` and optional descriptive fields.
#[derive(Debug, Clone)]
pub struct AutoFixReport {
    pub fixes: Vec<AppliedFix>,
    pub patched: serde_yaml::Value,
}

/// Reads, validates, and writes artifacts on disk.
pub struct ArtifactStore;

impl ArtifactStore {
    pub fn new() -> Self {
        Self
    }

    /// Pass (a): confirm the file parses as YAML at all, returning a
    /// `Syntax` error (with line/column, when `serde_yaml` provides one)
    /// on malformed input.
    fn parse_yaml(contents: &str) -> Result<serde_yaml::Value> {
        serde_yaml::from_str(contents).map_err(ArtifactError::from)
    }

    /// Load and fully validate a typed artifact. Returns the collected
    /// schema errors rather than the first one.
    pub async fn load<T: ArtifactBody>(&self, path: &Path) -> Result<ArtifactDocument<T>> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        Self::parse_yaml(&contents)?;

        let doc: ArtifactDocument<T> =
            serde_yaml::from_str(&contents).map_err(ArtifactError::from)?;

        self.validate_document(&doc)?;

        Ok(doc)
    }

    /// Pass (b) plus the cross-cutting `_meta` checks, without requiring
    /// the caller to already hold a parsed document.
    pub fn validate_document<T: ArtifactBody>(&self, doc: &ArtifactDocument<T>) -> Result<()> {
        let mut errors: Vec<ValidationError> = Vec::new();

        if doc.meta.artifact_type != T::ARTIFACT_TYPE {
            errors.push(ValidationError::new(
                "_meta.artifact_type",
                format!(
                    "expected '{}', found '{}'",
                    T::ARTIFACT_TYPE,
                    doc.meta.artifact_type
                ),
            ));
        }

        if !doc.meta.is_compatible() {
            return Err(ArtifactError::VersionMismatch {
                found: doc.meta.schema_version,
                supported: crate::meta::CURRENT_SCHEMA_VERSION,
            });
        }

        errors.extend(doc.body.validate_body());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ArtifactError::Validation(errors))
        }
    }

    /// Validate a file on disk without needing the caller to handle the
    /// typed document; used by the stage orchestrator's post-run check.
    pub async fn validate_file<T: ArtifactBody>(&self, path: &Path) -> Result<()> {
        self.load::<T>(path).await.map(|_| ())
    }

    /// Serialize and atomically write an artifact: write to a sibling
    /// temp file, then rename over the target so a concurrent reader
    /// never observes a torn write.
    pub async fn write<T: ArtifactBody>(
        &self,
        path: &Path,
        meta: ArtifactMeta,
        body: T,
    ) -> Result<()> {
        let doc = ArtifactDocument { meta, body };
        let yaml = serde_yaml::to_string(&doc).map_err(ArtifactError::from)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ArtifactError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp_path = tmp_sibling_path(path);
        tokio::fs::write(&tmp_path, yaml.as_bytes())
            .await
            .map_err(|source| ArtifactError::Io {
                path: tmp_path.clone(),
                source,
            })?;

        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|source| ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(path = %path.display(), artifact_type = %T::ARTIFACT_TYPE, "wrote artifact");
        Ok(())
    }

    /// Apply the bounded class of auto-fixes spec.md §4.1 allows: inject
    /// a missing `_meta` block, and fill in missing *optional* top-level
    /// string fields with an empty default. Never synthesizes a required
    /// business field such as `feature` or `user_stories`.
    pub async fn auto_fix(
        &self,
        path: &Path,
        inferred_type: crate::meta::ArtifactType,
        generator: &str,
    ) -> Result<AutoFixReport> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut value = Self::parse_yaml(&contents)?;
        let mut fixes = Vec::new();

        let serde_yaml::Value::Mapping(map) = &mut value else {
            // Not a mapping at the top level: nothing a bounded auto-fix
            // can safely do.
            return Ok(AutoFixReport {
                fixes,
                patched: value,
            });
        };

        let meta_key = serde_yaml::Value::String("_meta".to_string());
        if !map.contains_key(&meta_key) {
            let meta = ArtifactMeta::new(inferred_type, generator);
            let meta_value = serde_yaml::to_value(&meta).map_err(ArtifactError::from)?;
            map.insert(meta_key, meta_value);
            fixes.push(AppliedFix {
                field: "_meta".to_string(),
                description: "injected missing _meta block".to_string(),
            });
        }

        for optional_field in ["summary", "technical_context"] {
            let key = serde_yaml::Value::String(optional_field.to_string());
            if !map.contains_key(&key) {
                map.insert(key, serde_yaml::Value::String(String::new()));
                fixes.push(AppliedFix {
                    field: optional_field.to_string(),
                    description: format!("filled missing optional field '{optional_field}' with an empty string"),
                });
            }
        }

        Ok(AutoFixReport {
            fixes,
            patched: value,
        })
    }

    /// Persist a patched `serde_yaml::Value` produced by `auto_fix`.
    pub async fn write_raw(&self, path: &Path, value: &serde_yaml::Value) -> Result<()> {
        let yaml = serde_yaml::to_string(value).map_err(ArtifactError::from)?;
        let tmp_path = tmp_sibling_path(path);
        tokio::fs::write(&tmp_path, yaml.as_bytes())
            .await
            .map_err(|source| ArtifactError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|source| ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(())
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

fn tmp_sibling_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::ArtifactType;
    use crate::spec_artifact::{Requirement, SpecArtifact, UserStory};

    fn sample_spec() -> SpecArtifact {
        SpecArtifact {
            feature: "Add caching layer".into(),
            user_stories: vec![UserStory {
                id: "US-001".into(),
                title: "Cache reads".into(),
                description: "As a user...".into(),
                priority: None,
            }],
            requirements: vec![Requirement {
                id: "EARS-001".into(),
                statement: "the system shall cache reads".into(),
            }],
        }
    }

    #[tokio::test]
    async fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.yaml");
        let store = ArtifactStore::new();

        let meta = ArtifactMeta::new(ArtifactType::Spec, "test-agent");
        store.write(&path, meta, sample_spec()).await.unwrap();

        let doc = store.load::<SpecArtifact>(&path).await.unwrap();
        assert_eq!(doc.body.feature, "Add caching layer");
        assert_eq!(doc.meta.artifact_type, ArtifactType::Spec);
    }

    #[tokio::test]
    async fn missing_required_field_collects_all_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.yaml");
        tokio::fs::write(
            &path,
            r#"
_meta:
  schema_version: 1
  generator: test
  created_at: 2024-01-01T00:00:00Z
  artifact_type: spec
feature: ""
user_stories: []
requirements: []
"#,
        )
        .await
        .unwrap();

        let store = ArtifactStore::new();
        let err = store.load::<SpecArtifact>(&path).await.unwrap_err();
        let errors = err.validation_errors().expect("expected validation errors");
        assert!(errors.len() >= 2);
    }

    #[tokio::test]
    async fn wrong_artifact_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.yaml");
        let store = ArtifactStore::new();
        let meta = ArtifactMeta::new(ArtifactType::Plan, "test-agent");
        // Deliberately write a spec body tagged as a plan artifact.
        let yaml = serde_yaml::to_string(&ArtifactDocument {
            meta,
            body: sample_spec(),
        })
        .unwrap();
        tokio::fs::write(&path, yaml).await.unwrap();

        let err = store.load::<SpecArtifact>(&path).await.unwrap_err();
        let errors = err.validation_errors().expect("expected validation errors");
        assert!(errors.iter().any(|e| e.path == "_meta.artifact_type"));
    }

    #[tokio::test]
    async fn auto_fix_injects_missing_meta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.yaml");
        tokio::fs::write(
            &path,
            "feature: Add caching layer\nuser_stories: []\nrequirements: []\n",
        )
        .await
        .unwrap();

        let store = ArtifactStore::new();
        let report = store
            .auto_fix(&path, ArtifactType::Spec, "autospec-autofix")
            .await
            .unwrap();

        assert_eq!(report.fixes.len(), 1);
        assert_eq!(report.fixes[0].field, "_meta");
    }

    #[tokio::test]
    async fn syntax_error_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.yaml");
        tokio::fs::write(&path, "feature: [unterminated\n").await.unwrap();

        let store = ArtifactStore::new();
        let err = store.load::<SpecArtifact>(&path).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Syntax(_)));
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.yaml");
        let store = ArtifactStore::new();
        let meta = ArtifactMeta::new(ArtifactType::Spec, "test-agent");
        store.write(&path, meta, sample_spec()).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["spec.yaml"]);
    }
}
