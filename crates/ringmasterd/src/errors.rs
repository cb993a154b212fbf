//! Validation errors shared by socket and watcher definitions.

use thiserror::Error;

/// A socket or watcher definition that cannot be turned into a live object.
///
/// Raised while building sockets and watchers from the manifest, before any
/// descriptor is created or process spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A socket or watcher was declared without a name.
    #[error("{kind} definitions require a non-empty name")]
    EmptyName {
        /// `socket` or `watcher`.
        kind: &'static str,
    },
    /// The address family is not one of `AF_INET`, `AF_INET6`, `AF_UNIX`.
    #[error("socket '{socket}' has unknown address family '{value}'")]
    UnknownFamily {
        /// Socket name.
        socket: String,
        /// Rejected value.
        value: String,
    },
    /// The socket type is not one of `SOCK_STREAM`, `SOCK_DGRAM`.
    #[error("socket '{socket}' has unknown type '{value}'")]
    UnknownType {
        /// Socket name.
        socket: String,
        /// Rejected value.
        value: String,
    },
    /// The protocol name is not recognised.
    #[error("socket '{socket}' has unknown protocol '{value}'")]
    UnknownProtocol {
        /// Socket name.
        socket: String,
        /// Rejected value.
        value: String,
    },
    /// Both a filesystem path and a host or port were given.
    #[error("socket '{socket}' sets a path together with a host or port")]
    ConflictingAddress {
        /// Socket name.
        socket: String,
    },
    /// A Unix family socket lacks a filesystem path.
    #[error("socket '{socket}' uses AF_UNIX but has no path")]
    UnixWithoutPath {
        /// Socket name.
        socket: String,
    },
    /// A filesystem path was paired with a network family.
    #[error("socket '{socket}' has a path but family '{family}'")]
    PathWithNetworkFamily {
        /// Socket name.
        socket: String,
        /// Declared family.
        family: String,
    },
    /// Two sockets share a name.
    #[error("socket '{name}' is declared more than once")]
    DuplicateSocket {
        /// Duplicated name.
        name: String,
    },
    /// Two watchers share a name.
    #[error("watcher '{name}' is declared more than once")]
    DuplicateWatcher {
        /// Duplicated name.
        name: String,
    },
    /// A watcher has no command to execute.
    #[error("watcher '{watcher}' has an empty command")]
    EmptyCommand {
        /// Watcher name.
        watcher: String,
    },
    /// A stop or kill signal name is not a known signal.
    #[error("watcher '{watcher}' has unknown signal '{value}'")]
    InvalidSignal {
        /// Watcher name.
        watcher: String,
        /// Rejected value.
        value: String,
    },
    /// A watcher inherits a socket that is not declared.
    #[error("watcher '{watcher}' references undeclared socket '{socket}'")]
    UnknownSocket {
        /// Watcher name.
        watcher: String,
        /// Missing socket name.
        socket: String,
    },
    /// The backoff factor is zero.
    #[error("watcher '{watcher}' has a zero backoff factor")]
    ZeroBackoffFactor {
        /// Watcher name.
        watcher: String,
    },
}
