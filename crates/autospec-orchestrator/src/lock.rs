//! Advisory per-spec lock preventing two invocations from driving the
//! same spec concurrently (spec.md §4.5: "contention yields a clear
//! 'busy' error rather than racing").
//!
//! A lock file is created with `O_EXCL` semantics (`create_new`) under
//! `<state_dir>/locks/<spec_id>.lock`; the holder's PID is written for
//! diagnostics. Released by the guard's `Drop`, so an ordinary process
//! exit (including a panic unwind) always clears it. A process killed
//! with `SIGKILL` leaves a stale lock behind, same as any advisory
//! filesystem lock — not solved here, surfaced to the operator instead.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{OrchestratorError, Result};

pub struct SpecLock {
    path: PathBuf,
}

impl SpecLock {
    pub fn try_acquire(state_dir: &Path, spec_id: &str) -> Result<Self> {
        let dir = state_dir.join("locks");
        std::fs::create_dir_all(&dir).map_err(|source| OrchestratorError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = dir.join(format!("{spec_id}.lock"));
        match std::fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(OrchestratorError::SpecBusy(spec_id.to_string())),
            Err(source) => Err(OrchestratorError::Io { path, source }),
        }
    }
}

impl Drop for SpecLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_busy_until_first_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let first = SpecLock::try_acquire(dir.path(), "001-add-cache").unwrap();
        let second = SpecLock::try_acquire(dir.path(), "001-add-cache");
        assert!(matches!(second, Err(OrchestratorError::SpecBusy(_))));

        drop(first);
        assert!(SpecLock::try_acquire(dir.path(), "001-add-cache").is_ok());
    }

    #[test]
    fn different_specs_do_not_contend() {
        let dir = tempfile::tempdir().unwrap();
        let _a = SpecLock::try_acquire(dir.path(), "001-add-cache").unwrap();
        assert!(SpecLock::try_acquire(dir.path(), "002-add-auth").is_ok());
    }
}
