//! Configuration loaders that point the supervisor at temporary files.

use std::ffi::OsString;
use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoError;
use tempfile::TempDir;

use ringmaster_config::Config;

use crate::bootstrap::ConfigLoader;

/// Loader whose manifest and runtime directory live in a temporary directory.
#[derive(Clone)]
pub struct TestConfigLoader {
    _dir: Arc<TempDir>,
    manifest_path: Utf8PathBuf,
    runtime_dir: Utf8PathBuf,
}

impl TestConfigLoader {
    /// Builds a loader; no manifest is written until [`Self::write_manifest`].
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temporary directory");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .expect("temporary directory path was not valid UTF-8");
        Self {
            manifest_path: root.join("ringmaster.yaml"),
            runtime_dir: root.join("run"),
            _dir: Arc::new(dir),
        }
    }

    /// Builds a loader with `yaml` already written as the manifest.
    #[must_use]
    pub fn with_manifest(yaml: &str) -> Self {
        let loader = Self::new();
        loader.write_manifest(yaml);
        loader
    }

    pub fn write_manifest(&self, yaml: &str) {
        fs::write(&self.manifest_path, yaml).expect("failed to write manifest");
    }

    #[must_use]
    pub fn runtime_dir(&self) -> &Utf8Path {
        &self.runtime_dir
    }

    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            manifest_path: self.manifest_path.clone(),
            runtime_dir: self.runtime_dir.clone(),
            check_interval_ms: 10,
            ..Config::default()
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config())
    }
}

/// Loader that reads a malformed configuration file.
pub struct FailingConfigLoader {
    dir: TempDir,
}

impl FailingConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temporary directory");
        fs::write(
            dir.path().join("ringmaster.toml"),
            "check_interval_ms = not_a_number\n",
        )
        .expect("failed to write malformed configuration");
        Self { dir }
    }
}

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("ringmasterd"),
            OsString::from("--config-path"),
            self.dir.path().join("ringmaster.toml").into_os_string(),
        ];
        Config::load_from_iter(args)
    }
}
