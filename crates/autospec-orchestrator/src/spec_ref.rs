//! Resolving which spec directory a command targets (spec.md §4.4).
//!
//! Resolution order: explicit argument; the current Git branch name, if
//! it matches a spec directory under the specs root; the most recently
//! modified eligible directory under the specs root.

use std::path::{Path, PathBuf};

use autospec_artifact::is_spec_dir_name;
use autospec_git::Git;

use crate::error::{OrchestratorError, Result};

/// A resolved spec: its directory name (`NNN-slug`) and full path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRef {
    pub id: String,
    pub dir: PathBuf,
}

impl SpecRef {
    fn from_dir(specs_root: &Path, dir_name: &str) -> Self {
        Self {
            id: dir_name.to_string(),
            dir: specs_root.join(dir_name),
        }
    }
}

/// Resolve the spec a command should operate on.
///
/// `explicit` is the caller-supplied spec id or path fragment, if any;
/// `repo` is used to read the current branch name for the second
/// resolution step.
pub async fn resolve(specs_root: &Path, explicit: Option<&str>, repo: &Git) -> Result<SpecRef> {
    if let Some(explicit) = explicit {
        let name = explicit.trim_end_matches('/');
        let dir = specs_root.join(name);
        if dir.is_dir() {
            return Ok(SpecRef::from_dir(specs_root, name));
        }
        return Err(OrchestratorError::SpecNotResolved(format!(
            "'{explicit}' does not name a directory under {}",
            specs_root.display()
        )));
    }

    if repo.is_repo() {
        if let Ok(branch) = repo.current_branch().await {
            if is_spec_dir_name(&branch) && specs_root.join(&branch).is_dir() {
                return Ok(SpecRef::from_dir(specs_root, &branch));
            }
        }
    }

    match most_recently_modified(specs_root) {
        Some(name) => Ok(SpecRef::from_dir(specs_root, &name)),
        None => Err(OrchestratorError::SpecNotResolved(format!(
            "no spec directories found under {}",
            specs_root.display()
        ))),
    }
}

fn most_recently_modified(specs_root: &Path) -> Option<String> {
    let entries = std::fs::read_dir(specs_root).ok()?;
    let mut best: Option<(std::time::SystemTime, String)> = None;

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else { continue };
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_spec_dir_name(&name) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };

        if best.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
            best = Some((modified, name));
        }
    }

    best.map(|(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_argument_wins_when_directory_exists() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("001-add-cache")).unwrap();
        std::fs::create_dir_all(root.path().join("002-add-auth")).unwrap();

        let repo = Git::new(root.path());
        let resolved = resolve(root.path(), Some("002-add-auth"), &repo).await.unwrap();
        assert_eq!(resolved.id, "002-add-auth");
    }

    #[tokio::test]
    async fn falls_back_to_most_recently_modified() {
        let root = tempfile::tempdir().unwrap();
        let older = root.path().join("001-add-cache");
        std::fs::create_dir_all(&older).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let newer = root.path().join("002-add-auth");
        std::fs::create_dir_all(&newer).unwrap();

        let repo = Git::new(root.path());
        let resolved = resolve(root.path(), None, &repo).await.unwrap();
        assert_eq!(resolved.id, "002-add-auth");
    }

    #[tokio::test]
    async fn fails_cleanly_when_nothing_matches() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path()).unwrap();
        let repo = Git::new(root.path());
        assert!(resolve(root.path(), None, &repo).await.is_err());
    }
}
