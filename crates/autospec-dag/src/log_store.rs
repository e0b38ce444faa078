//! Per-spec log files under a user-cache directory outside the project
//! tree (spec.md §4.9/§6): `$XDG_CACHE_HOME/autospec/dag-logs/
//! <project-id>/<dag-id>/<spec-id>.log`, size-capped with oldest-bytes
//! truncation, each line timestamp-prefixed.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

use crate::error::{DagError, Result};

/// Derive a stable, filesystem-safe project identifier: the slugified
/// Git remote URL if one is configured, else a hash of the absolute
/// project path.
pub fn project_id(project_root: &Path, remote_url: Option<&str>) -> String {
    match remote_url {
        Some(url) if !url.trim().is_empty() => slugify(url),
        _ => {
            let mut hasher = Sha256::new();
            hasher.update(project_root.to_string_lossy().as_bytes());
            let digest = hasher.finalize();
            digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
        }
    }
}

fn slugify(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_was_dash = false;
    for ch in value.chars().flat_map(|c| c.to_lowercase()) {
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

pub fn log_path(cache_home: &Path, project_id: &str, dag_id: &str, spec_id: &str) -> PathBuf {
    cache_home
        .join("autospec")
        .join("dag-logs")
        .join(project_id)
        .join(dag_id)
        .join(format!("{spec_id}.log"))
}

/// An append-only, size-capped log file. Each call to [`SpecLog::append`]
/// writes one timestamp-prefixed line; once the file exceeds
/// `max_bytes`, the oldest bytes are dropped before appending.
pub struct SpecLog {
    path: PathBuf,
    max_bytes: u64,
}

impl SpecLog {
    pub fn new(path: PathBuf, max_bytes: u64) -> Self {
        Self { path, max_bytes }
    }

    pub async fn append(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|source| DagError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let timestamp = chrono::Utc::now().format("[%Y-%m-%d %H:%M:%S]");
        let entry = format!("{timestamp} {line}\n");

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| DagError::Io { path: self.path.clone(), source })?;
        file.write_all(entry.as_bytes())
            .await
            .map_err(|source| DagError::Io { path: self.path.clone(), source })?;
        drop(file);

        self.truncate_if_oversized().await
    }

    async fn truncate_if_oversized(&self) -> Result<()> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|source| DagError::Io {
            path: self.path.clone(),
            source,
        })?;
        if metadata.len() <= self.max_bytes {
            return Ok(());
        }

        let mut file = tokio::fs::File::open(&self.path).await.map_err(|source| DagError::Io {
            path: self.path.clone(),
            source,
        })?;
        let drop_bytes = metadata.len() - self.max_bytes;
        file.seek(SeekFrom::Start(drop_bytes)).await.map_err(|source| DagError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut kept = Vec::new();
        file.read_to_end(&mut kept).await.map_err(|source| DagError::Io {
            path: self.path.clone(),
            source,
        })?;
        drop(file);

        let tmp_path = self.path.with_extension("log.tmp");
        tokio::fs::write(&tmp_path, &kept).await.map_err(|source| DagError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|source| DagError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }

    /// The last `n` bytes of the log, for a `log tail` watcher surface.
    pub async fn tail(&self, n: usize) -> Result<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        let contents = tokio::fs::read(&self.path).await.map_err(|source| DagError::Io {
            path: self.path.clone(),
            source,
        })?;
        let start = contents.len().saturating_sub(n);
        Ok(String::from_utf8_lossy(&contents[start..]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_id_prefers_remote_url() {
        let id = project_id(Path::new("/tmp/whatever"), Some("git@github.com:acme/widgets.git"));
        assert_eq!(id, "git-github-com-acme-widgets-git");
    }

    #[test]
    fn project_id_falls_back_to_path_hash_without_remote() {
        let a = project_id(Path::new("/tmp/a"), None);
        let b = project_id(Path::new("/tmp/b"), None);
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn append_creates_and_grows_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = SpecLog::new(dir.path().join("001-add-cache.log"), 1024);
        log.append("starting implement stage").await.unwrap();
        log.append("agent exited 0").await.unwrap();

        let contents = tokio::fs::read_to_string(dir.path().join("001-add-cache.log")).await.unwrap();
        assert!(contents.contains("starting implement stage"));
        assert!(contents.contains("agent exited 0"));
    }

    #[tokio::test]
    async fn oversized_log_drops_oldest_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let log = SpecLog::new(dir.path().join("spec.log"), 64);
        for i in 0..20 {
            log.append(&format!("line number {i} with some padding to grow the file")).await.unwrap();
        }

        let metadata = tokio::fs::metadata(dir.path().join("spec.log")).await.unwrap();
        assert!(metadata.len() <= 64 + 128);

        let contents = tokio::fs::read_to_string(dir.path().join("spec.log")).await.unwrap();
        assert!(contents.contains("line number 19"));
        assert!(!contents.contains("line number 0 "));
    }

    #[tokio::test]
    async fn tail_returns_only_the_last_n_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let log = SpecLog::new(dir.path().join("spec.log"), 1024 * 1024);
        log.append("first").await.unwrap();
        log.append("second").await.unwrap();

        let tail = log.tail(7).await.unwrap();
        assert!(tail.ends_with("second\n"));
    }
}
