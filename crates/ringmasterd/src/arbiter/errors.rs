//! Error types for arbiter orchestration and the command surface.

use ringmaster_config::ManifestError;
use thiserror::Error;

use crate::errors::ConfigError;
use crate::sockets::SocketError;
use crate::watcher::WatcherError;

/// Arbiter-wide operations that failed.
#[derive(Debug, Error)]
pub enum ArbiterError {
    /// The manifest failed validation; nothing was changed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Socket binding failed; no watcher was started on a partial set.
    #[error("socket setup failed: {0}")]
    Socket(#[from] SocketError),
    /// A watcher rejected the operation.
    #[error(transparent)]
    Watcher(#[from] WatcherError),
    /// The operation needs a running arbiter.
    #[error("arbiter is not running")]
    NotRunning,
    /// `start` was called twice.
    #[error("arbiter is already running")]
    AlreadyRunning,
}

/// A control command could not be served.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command name is not recognised.
    #[error("unknown command '{name}'")]
    UnknownCommand {
        /// Rejected name.
        name: String,
    },
    /// The command names a watcher that does not exist.
    #[error("unknown watcher '{name}'")]
    UnknownWatcher {
        /// Rejected name.
        name: String,
    },
    /// The arguments do not fit the command.
    #[error("invalid arguments for '{command}': {message}")]
    InvalidArguments {
        /// Command name.
        command: String,
        /// What was wrong.
        message: String,
    },
    /// Loading a manifest for `reload` failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    /// The arbiter rejected the operation.
    #[error(transparent)]
    Arbiter(#[from] ArbiterError),
    /// The reply could not be encoded.
    #[error("failed to encode reply: {source}")]
    Reply {
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
}

impl From<WatcherError> for CommandError {
    fn from(source: WatcherError) -> Self {
        Self::Arbiter(ArbiterError::Watcher(source))
    }
}
