//! Declarative socket definitions read from the supervision manifest.
//!
//! Values are kept close to their textual form: families, types, and
//! protocols stay as strings here and are validated by the engine when a
//! socket is built, so a malformed definition is reported before any
//! descriptor exists.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::defaults::{default_socket_backlog, default_socket_umask, default_true};

/// One pre-bound listening endpoint as declared by an operator.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SocketConfig {
    /// Unique key within the manifest.
    pub name: String,
    /// Host name or address for network sockets.
    #[serde(default)]
    pub host: Option<String>,
    /// Port for network sockets; `0` asks the OS for an ephemeral port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Filesystem path for Unix domain sockets.
    #[serde(default)]
    pub path: Option<Utf8PathBuf>,
    /// Address family name such as `AF_INET`.
    #[serde(default)]
    pub family: Option<String>,
    /// Socket type name such as `SOCK_STREAM`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Protocol name such as `tcp`; absent means the OS default.
    #[serde(default)]
    pub proto: Option<String>,
    /// Listen backlog for stream sockets.
    #[serde(default = "default_socket_backlog")]
    pub backlog: i32,
    /// Leaves the descriptor in blocking mode when set.
    #[serde(default)]
    pub blocking: bool,
    /// Creation mask applied to a filesystem socket path.
    #[serde(default = "default_socket_umask")]
    pub umask: u32,
    /// Unlinks a pre-existing filesystem path before binding.
    #[serde(default)]
    pub replace: bool,
    /// Keeps the descriptor open across `exec` in child processes.
    #[serde(default = "default_true")]
    pub inheritable: bool,
    /// Network interface the socket is bound to.
    #[serde(default)]
    pub interface: Option<String>,
    /// Requests `SO_REUSEPORT` where the platform supports it.
    #[serde(default)]
    pub so_reuseport: bool,
}

impl SocketConfig {
    /// Declares a network socket with default options.
    #[must_use]
    pub fn tcp(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Self::named(name)
        }
    }

    /// Declares a filesystem socket with default options.
    #[must_use]
    pub fn unix(name: impl Into<String>, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::named(name)
        }
    }

    /// Declares a socket that only carries a name; every other key takes
    /// its default.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
            port: None,
            path: None,
            family: None,
            kind: None,
            proto: None,
            backlog: default_socket_backlog(),
            blocking: false,
            umask: default_socket_umask(),
            replace: false,
            inheritable: true,
            interface: None,
            so_reuseport: false,
        }
    }
}
