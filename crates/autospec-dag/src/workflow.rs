//! DAG workflow file parsing and the identifier/structural invariants
//! from spec.md §3: unique feature IDs, a resolvable DAG id, and a
//! feature may only depend on features in a strictly earlier layer.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{DagError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DagMeta {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionSection {
    pub max_parallel: Option<usize>,
    pub base_branch: Option<String>,
    pub autocommit: Option<bool>,
    pub autocommit_cmd: Option<String>,
    pub autocommit_retries: Option<u32>,
    pub fail_fast: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureInput {
    pub id: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayerInput {
    pub features: Vec<FeatureInput>,
}

/// The raw shape of a DAG workflow YAML file (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
pub struct DagFile {
    #[serde(default)]
    pub dag: DagMeta,
    #[serde(default)]
    pub execution: ExecutionSection,
    pub layers: Vec<LayerInput>,
}

impl DagFile {
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|source| DagError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Every feature id declared anywhere in the file, in declared order.
    pub fn feature_ids(&self) -> Vec<&str> {
        self.layers
            .iter()
            .flat_map(|layer| layer.features.iter().map(|f| f.id.as_str()))
            .collect()
    }
}

/// Slugify `name` if `id` is absent, appending a short content-hash
/// suffix when the result collides with an already-resolved DAG id
/// (spec.md §3: "resolved DAG ID unique across a project").
pub fn resolve_dag_id(meta: &DagMeta, existing_ids: &HashSet<String>) -> String {
    let base = match (&meta.id, &meta.name) {
        (Some(id), _) => id.clone(),
        (None, Some(name)) => slugify(name),
        (None, None) => "dag".to_string(),
    };

    if !existing_ids.contains(&base) {
        return base;
    }

    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    if let Some(name) = &meta.name {
        hasher.update(name.as_bytes());
    }
    let digest = hasher.finalize();
    let suffix = digest.iter().take(3).map(|b| format!("{b:02x}")).collect::<String>();
    format!("{base}-{suffix}")
}

fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_dash = false;
    for ch in name.chars().flat_map(|c| c.to_lowercase()) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_dash = false;
        } else if !last_was_dash && !out.is_empty() {
            out.push('-');
            last_was_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_workflow() {
        let yaml = r#"
dag:
  name: Nightly Build
layers:
  - features:
      - id: 001-add-cache
      - id: 002-add-auth
        depends_on: [001-add-cache]
"#;
        let file = DagFile::parse(Path::new("nightly.yaml"), yaml).unwrap();
        assert_eq!(file.layers.len(), 1);
        assert_eq!(file.feature_ids(), vec!["001-add-cache", "002-add-auth"]);
    }

    #[test]
    fn slugifies_name_when_id_absent() {
        let meta = DagMeta {
            id: None,
            name: Some("Nightly Build #7".to_string()),
        };
        assert_eq!(resolve_dag_id(&meta, &HashSet::new()), "nightly-build-7");
    }

    #[test]
    fn explicit_id_is_used_verbatim() {
        let meta = DagMeta {
            id: Some("release-train".to_string()),
            name: Some("ignored".to_string()),
        };
        assert_eq!(resolve_dag_id(&meta, &HashSet::new()), "release-train");
    }

    #[test]
    fn collision_appends_content_hash_suffix() {
        let meta = DagMeta {
            id: None,
            name: Some("nightly".to_string()),
        };
        let mut existing = HashSet::new();
        existing.insert("nightly".to_string());
        let resolved = resolve_dag_id(&meta, &existing);
        assert_ne!(resolved, "nightly");
        assert!(resolved.starts_with("nightly-"));
    }
}
