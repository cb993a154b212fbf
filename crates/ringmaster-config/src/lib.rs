//! Shared configuration for the ringmaster process supervisor.
//!
//! Two layers live here. [`Config`] carries daemon settings and is merged by
//! `ortho_config` from defaults, a configuration file, `RINGMASTER_*`
//! environment variables, and command-line flags. [`Manifest`] is the YAML
//! document naming the sockets and watchers the supervisor owns; it is loaded
//! at startup and again on every reload.

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub mod defaults;
mod logging;
mod manifest;
mod runtime;
mod socket;
mod watcher;

pub use logging::{LogFormat, LogFormatParseError};
pub use manifest::{Manifest, ManifestError};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use socket::SocketConfig;
pub use watcher::{BackoffConfig, FlappingConfig, WatcherConfig};

/// Daemon settings resolved from every configuration layer.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "RINGMASTER")]
pub struct Config {
    /// Location of the YAML supervision manifest.
    #[serde(default = "defaults::default_manifest_path")]
    pub manifest_path: Utf8PathBuf,
    /// Directory holding the lock, pid, and health files.
    #[serde(default = "defaults::default_runtime_dir")]
    pub runtime_dir: Utf8PathBuf,
    /// `tracing` filter expression.
    #[serde(default = "defaults::default_log_filter")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Period of the shared health-check tick, in milliseconds.
    #[serde(default = "defaults::default_check_interval_ms")]
    pub check_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest_path: defaults::default_manifest_path(),
            runtime_dir: defaults::default_runtime_dir(),
            log_filter: defaults::default_log_filter(),
            log_format: defaults::default_log_format(),
            check_interval_ms: defaults::default_check_interval_ms(),
        }
    }
}

impl Config {
    /// Merges every layer, reading flags from the process arguments.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Merges every layer, reading flags from `args` (program name first).
    pub fn load_from_iter(
        args: impl IntoIterator<Item = OsString>,
    ) -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the manifest location.
    #[must_use]
    pub fn manifest_path(&self) -> &camino::Utf8Path {
        &self.manifest_path
    }

    /// Returns the health-check tick period.
    #[must_use]
    pub const fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.check_interval_ms)
    }
}
