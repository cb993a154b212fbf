//! Error types for socket binding and management.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::errors::ConfigError;

/// Errors surfaced while building, binding, or closing managed sockets.
#[derive(Debug, Error)]
pub enum SocketError {
    /// The socket definition is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The address or filesystem path is already taken.
    #[error("socket '{name}' cannot bind {endpoint}: address already in use")]
    AddressInUse { name: String, endpoint: String },
    /// `bind_and_listen` was called on a bound socket.
    #[error("socket '{name}' is already bound")]
    AlreadyBound { name: String },
    /// The descriptor was requested while the socket is not bound.
    #[error("socket '{name}' is not bound")]
    NotBound { name: String },
    /// A socket with the same name is already registered.
    #[error("socket '{name}' is already registered")]
    DuplicateName { name: String },
    /// No socket carries the requested name.
    #[error("no socket named '{name}'")]
    NotFound { name: String },
    #[error("socket '{name}' failed to resolve {endpoint}: {source}")]
    Resolve {
        name: String,
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("socket '{name}' resolved no {family} address for {endpoint}")]
    ResolveEmpty {
        name: String,
        endpoint: String,
        family: String,
    },
    #[error("socket '{name}' could not be created: {source}")]
    Create {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("socket '{name}' failed to bind {endpoint}: {source}")]
    Bind {
        name: String,
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("socket '{name}' failed to listen: {source}")]
    Listen {
        name: String,
        #[source]
        source: io::Error,
    },
    /// Applying a socket option failed.
    #[error("socket '{name}' failed to apply {option}: {source}")]
    Option {
        name: String,
        option: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("socket '{name}' failed to set permissions on '{path}': {source}")]
    Permissions {
        name: String,
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("socket '{name}' failed to replace stale path '{path}': {source}")]
    Replace {
        name: String,
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// The filesystem path could not be removed on close.
    #[error("socket '{name}' failed to remove '{path}': {source}")]
    Unlink {
        name: String,
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}
