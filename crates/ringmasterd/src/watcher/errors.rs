use thiserror::Error;

use crate::errors::ConfigError;
use crate::sockets::SocketError;

/// Watcher operations that cannot proceed.
///
/// Per-process failures never surface here; they are absorbed into slot
/// health and reported as events.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// The definition is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An inherited socket is not part of the socket set.
    #[error("watcher '{watcher}' inherits unknown socket '{socket}'")]
    UnknownSocket {
        /// Watcher name.
        watcher: String,
        /// Missing socket.
        socket: String,
    },
    /// An inherited socket exists but its descriptor is unavailable.
    #[error("watcher '{watcher}' cannot inherit its sockets: {source}")]
    Socket {
        /// Watcher name.
        watcher: String,
        /// Underlying socket error.
        #[source]
        source: SocketError,
    },
    /// The watcher is draining and rejects new work.
    #[error("watcher '{watcher}' is stopping")]
    Stopping {
        /// Watcher name.
        watcher: String,
    },
}
