//! Derives runtime artefact paths for the daemon.
//!
//! The runtime directory houses the daemon lock, pid, and health snapshots so
//! operators and tooling can find a running supervisor.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

/// Canonical paths for runtime artefacts written by the daemon.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    lock_path: PathBuf,
    pid_path: PathBuf,
    health_path: PathBuf,
}

impl RuntimePaths {
    /// Creates the configured runtime directory and names the files inside it.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let runtime_dir = config.runtime_dir.as_std_path().to_path_buf();
        fs::create_dir_all(&runtime_dir).map_err(|source| RuntimePathsError::RuntimeDirectory {
            path: runtime_dir.clone(),
            source,
        })?;
        Ok(Self {
            lock_path: runtime_dir.join("ringmasterd.lock"),
            pid_path: runtime_dir.join("ringmasterd.pid"),
            health_path: runtime_dir.join("ringmasterd.health"),
            runtime_dir,
        })
    }

    /// Directory holding runtime artefacts.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Path to the lock file guarding singleton startup.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        self.lock_path.as_path()
    }

    /// Path to the PID file.
    #[must_use]
    pub fn pid_path(&self) -> &Path {
        self.pid_path.as_path()
    }

    /// Path to the health snapshot.
    #[must_use]
    pub fn health_path(&self) -> &Path {
        self.health_path.as_path()
    }
}

/// Errors raised while deriving daemon runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn derives_paths_inside_runtime_dir() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nested = dir.path().join("nested").join("run");
        let config = Config {
            runtime_dir: Utf8PathBuf::from_path_buf(nested.clone()).expect("utf8 path"),
            ..Config::default()
        };
        let paths = RuntimePaths::from_config(&config).expect("paths should derive");
        assert!(nested.is_dir(), "runtime directory should be created");
        assert_eq!(paths.runtime_dir(), nested.as_path());
        assert!(paths.lock_path().ends_with("ringmasterd.lock"));
        assert!(paths.pid_path().ends_with("ringmasterd.pid"));
        assert!(paths.health_path().ends_with("ringmasterd.health"));
    }

    #[test]
    fn default_runtime_dir_is_namespaced() {
        let config = Config::default();
        let tail = config
            .runtime_dir
            .file_name()
            .expect("runtime dir should have trailing component");
        assert!(
            tail == "ringmaster" || tail.starts_with("uid-"),
            "unexpected runtime tail: {tail}"
        );
    }
}
