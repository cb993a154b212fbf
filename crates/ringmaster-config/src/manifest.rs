//! Loads the YAML supervision manifest.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{SocketConfig, WatcherConfig};

/// Sockets and watchers supervised by one arbiter, in declaration order.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Socket definitions.
    #[serde(default)]
    pub sockets: Vec<SocketConfig>,
    /// Watcher definitions.
    #[serde(default)]
    pub watchers: Vec<WatcherConfig>,
}

impl Manifest {
    /// Reads and parses the manifest at `path`.
    pub fn load(path: &Utf8Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|message| ManifestError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parses manifest text that did not come from a file.
    pub fn from_yaml_str(text: &str) -> Result<Self, ManifestError> {
        Self::parse(text).map_err(|message| ManifestError::Parse {
            path: Utf8PathBuf::from("<inline>"),
            message,
        })
    }

    fn parse(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_saphyr::from_str(text).map_err(|error| error.to_string())
    }

    /// Looks up a socket definition by name.
    #[must_use]
    pub fn socket(&self, name: &str) -> Option<&SocketConfig> {
        self.sockets.iter().find(|socket| socket.name == name)
    }

    /// Looks up a watcher definition by name.
    #[must_use]
    pub fn watcher(&self, name: &str) -> Option<&WatcherConfig> {
        self.watchers.iter().find(|watcher| watcher.name == name)
    }
}

/// Errors raised while loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest '{path}': {source}")]
    Read {
        /// Manifest location.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The manifest text is not a valid document.
    #[error("failed to parse manifest '{path}': {message}")]
    Parse {
        /// Manifest location, or `<inline>` for text input.
        path: Utf8PathBuf,
        /// Parser diagnostic.
        message: String,
    },
}
