//! A single pre-bound listening endpoint.

use std::fmt;
use std::fs;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::PermissionsExt;

use camino::{Utf8Path, Utf8PathBuf};
use ringmaster_config::SocketConfig;
use ringmaster_config::defaults::{DEFAULT_SOCKET_HOST, DEFAULT_SOCKET_PORT};
use serde::Serialize;
use socket2::{SockAddr, Socket as RawSocket};
use tracing::{debug, info, warn};

use crate::descriptor;
use crate::errors::ConfigError;

use super::SOCKETS_TARGET;
use super::errors::SocketError;
use super::options::{AddressFamily, Protocol, SocketKind};

const REUSE_PORT_SUPPORTED: bool = cfg!(all(
    unix,
    not(any(target_os = "solaris", target_os = "illumos"))
));

/// Where a socket listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketAddress {
    /// Host and port; port `0` requests an ephemeral port.
    Network { host: String, port: u16 },
    /// Filesystem path of a Unix domain socket.
    Path(Utf8PathBuf),
}

/// One listening endpoint owned by the supervisor.
///
/// The descriptor is created by [`Socket::bind_and_listen`] and lives until
/// [`Socket::close`] (or drop). Worker processes inherit it through
/// [`Socket::fileno`], so a new process generation accepts on the very same
/// descriptor the previous one used.
#[derive(Debug)]
pub struct Socket {
    name: String,
    address: SocketAddress,
    family: AddressFamily,
    kind: SocketKind,
    protocol: Protocol,
    backlog: i32,
    blocking: bool,
    umask: u32,
    replace: bool,
    inheritable: bool,
    interface: Option<String>,
    so_reuseport: bool,
    bound: Option<Bound>,
}

#[derive(Debug)]
struct Bound {
    socket: RawSocket,
    owns_path: bool,
    local_addr: Option<SocketAddr>,
}

impl Socket {
    /// Validates a socket definition without touching the OS.
    pub fn load_from_config(config: &SocketConfig) -> Result<Self, ConfigError> {
        if config.name.trim().is_empty() {
            return Err(ConfigError::EmptyName { kind: "socket" });
        }
        let name = config.name.clone();
        let kind = match config.kind.as_deref() {
            None => SocketKind::Stream,
            Some(value) => value.parse().map_err(|_| ConfigError::UnknownType {
                socket: name.clone(),
                value: value.to_owned(),
            })?,
        };
        let protocol = match config.proto.as_deref() {
            None => Protocol::Default,
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::UnknownProtocol {
                    socket: name.clone(),
                    value: value.to_owned(),
                })?,
        };
        let declared_family = config
            .family
            .as_deref()
            .map(|value| {
                value
                    .parse::<AddressFamily>()
                    .map_err(|_| ConfigError::UnknownFamily {
                        socket: name.clone(),
                        value: value.to_owned(),
                    })
            })
            .transpose()?;
        let (family, address) = resolve_address(&name, config, declared_family)?;
        let so_reuseport = if config.so_reuseport && !REUSE_PORT_SUPPORTED {
            warn!(
                target: SOCKETS_TARGET,
                socket = %name,
                "SO_REUSEPORT unsupported on this platform; disabling"
            );
            false
        } else {
            config.so_reuseport
        };

        Ok(Self {
            name,
            address,
            family,
            kind,
            protocol,
            backlog: config.backlog,
            blocking: config.blocking,
            umask: config.umask,
            replace: config.replace,
            inheritable: config.inheritable,
            interface: config.interface.clone(),
            so_reuseport,
            bound: None,
        })
    }

    /// Creates the descriptor, applies options, binds, and listens.
    pub fn bind_and_listen(&mut self) -> Result<(), SocketError> {
        if self.bound.is_some() {
            return Err(SocketError::AlreadyBound {
                name: self.name.clone(),
            });
        }
        let bound = match self.address.clone() {
            SocketAddress::Network { host, port } => self.bind_network(&host, port)?,
            SocketAddress::Path(path) => self.bind_path(&path)?,
        };
        info!(
            target: SOCKETS_TARGET,
            socket = %self.name,
            endpoint = %self.describe(bound.local_addr),
            fd = bound.socket.as_raw_fd(),
            blocking = self.blocking,
            inheritable = self.inheritable,
            reuse_port = self.so_reuseport,
            "socket bound"
        );
        self.bound = Some(bound);
        Ok(())
    }

    /// Closes the descriptor and removes an owned filesystem path.
    ///
    /// The descriptor is always released. A path that cannot be unlinked is
    /// logged and reported, but the socket is closed regardless.
    pub fn close(&mut self) -> Result<(), SocketError> {
        let Some(bound) = self.bound.take() else {
            return Ok(());
        };
        let owns_path = bound.owns_path;
        drop(bound);
        debug!(target: SOCKETS_TARGET, socket = %self.name, "socket closed");
        let SocketAddress::Path(path) = &self.address else {
            return Ok(());
        };
        if !owns_path {
            return Ok(());
        }
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => {
                warn!(
                    target: SOCKETS_TARGET,
                    socket = %self.name,
                    path = %path,
                    error = %source,
                    "failed to remove socket path"
                );
                Err(SocketError::Unlink {
                    name: self.name.clone(),
                    path: path.clone(),
                    source,
                })
            }
        }
    }

    /// Raw descriptor handed to spawned processes.
    pub fn fileno(&self) -> Result<RawFd, SocketError> {
        self.bound
            .as_ref()
            .map(|bound| bound.socket.as_raw_fd())
            .ok_or_else(|| SocketError::NotBound {
                name: self.name.clone(),
            })
    }

    /// Unique name of the socket.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured address; see [`Socket::port`] for the resolved port.
    #[must_use]
    pub const fn address(&self) -> &SocketAddress {
        &self.address
    }

    /// Host of a network socket.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match &self.address {
            SocketAddress::Network { host, .. } => Some(host),
            SocketAddress::Path(_) => None,
        }
    }

    /// Port of a network socket: the OS-assigned value while bound, the
    /// configured value otherwise.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        let SocketAddress::Network { port, .. } = &self.address else {
            return None;
        };
        let resolved = self
            .bound
            .as_ref()
            .and_then(|bound| bound.local_addr)
            .map(|addr| addr.port());
        Some(resolved.unwrap_or(*port))
    }

    /// Filesystem path of a Unix socket.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        match &self.address {
            SocketAddress::Path(path) => Some(path),
            SocketAddress::Network { .. } => None,
        }
    }

    /// Address family.
    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        self.family
    }

    /// Stream or datagram.
    #[must_use]
    pub const fn kind(&self) -> SocketKind {
        self.kind
    }

    /// Requested transport protocol.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Whether the descriptor stays in blocking mode.
    #[must_use]
    pub const fn blocking(&self) -> bool {
        self.blocking
    }

    /// Whether the descriptor survives `exec` in the supervisor's children.
    #[must_use]
    pub const fn inheritable(&self) -> bool {
        self.inheritable
    }

    /// Whether `SO_REUSEPORT` is in effect; cleared when the platform
    /// refuses it.
    #[must_use]
    pub const fn so_reuseport(&self) -> bool {
        self.so_reuseport
    }

    /// Creation mask for a filesystem path.
    #[must_use]
    pub const fn umask(&self) -> u32 {
        self.umask
    }

    /// Whether a descriptor is currently held.
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Local address reported by the OS while bound.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.as_ref().and_then(|bound| bound.local_addr)
    }

    /// Human-readable endpoint such as `tcp://127.0.0.1:8080`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.describe(self.local_addr())
    }

    /// Serialisable view used by introspection commands.
    #[must_use]
    pub fn info(&self) -> SocketInfo {
        SocketInfo {
            name: self.name.clone(),
            endpoint: self.endpoint(),
            family: self.family,
            kind: self.kind,
            host: self.host().map(str::to_owned),
            port: self.port(),
            path: self.path().map(Utf8Path::to_path_buf),
            fd: self.fileno().ok(),
            bound: self.is_bound(),
        }
    }

    /// Returns true when both sockets would bind the same way.
    pub(crate) fn same_definition(&self, other: &Self) -> bool {
        self.name == other.name
            && self.address == other.address
            && self.family == other.family
            && self.kind == other.kind
            && self.protocol == other.protocol
            && self.backlog == other.backlog
            && self.blocking == other.blocking
            && self.umask == other.umask
            && self.replace == other.replace
            && self.inheritable == other.inheritable
            && self.interface == other.interface
            && self.so_reuseport == other.so_reuseport
    }

    fn describe(&self, local: Option<SocketAddr>) -> String {
        match (&self.address, local) {
            (SocketAddress::Network { .. }, Some(addr)) => {
                format!("{}://{addr}", self.kind.scheme())
            }
            (SocketAddress::Network { host, port }, None) => {
                format!("{}://{host}:{port}", self.kind.scheme())
            }
            (SocketAddress::Path(path), _) => format!("unix://{path}"),
        }
    }

    fn bind_network(&mut self, host: &str, port: u16) -> Result<Bound, SocketError> {
        let endpoint = format!("{}://{host}:{port}", self.kind.scheme());
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|source| SocketError::Resolve {
                name: self.name.clone(),
                endpoint: endpoint.clone(),
                source,
            })?
            .find(|addr| match self.family {
                AddressFamily::Inet => addr.is_ipv4(),
                AddressFamily::Inet6 => addr.is_ipv6(),
                AddressFamily::Unix => false,
            })
            .ok_or_else(|| SocketError::ResolveEmpty {
                name: self.name.clone(),
                endpoint: endpoint.clone(),
                family: self.family.to_string(),
            })?;

        let socket = self.create()?;
        socket
            .set_reuse_address(true)
            .map_err(|source| self.option_error("SO_REUSEADDR", source))?;
        if self.so_reuseport {
            self.apply_reuse_port(&socket);
        }
        if let Some(interface) = &self.interface {
            bind_device(&socket, interface)
                .map_err(|source| self.option_error("SO_BINDTODEVICE", source))?;
        }
        socket
            .bind(&SockAddr::from(addr))
            .map_err(|source| self.bind_error(&endpoint, source))?;
        self.finish(&socket)?;
        let local_addr = socket
            .local_addr()
            .ok()
            .and_then(|local| local.as_socket());
        Ok(Bound {
            socket,
            owns_path: false,
            local_addr,
        })
    }

    fn bind_path(&self, path: &Utf8Path) -> Result<Bound, SocketError> {
        let endpoint = format!("unix://{path}");
        match fs::symlink_metadata(path) {
            Ok(_) if !self.replace => {
                return Err(SocketError::AddressInUse {
                    name: self.name.clone(),
                    endpoint,
                });
            }
            Ok(_) => {
                fs::remove_file(path).map_err(|source| SocketError::Replace {
                    name: self.name.clone(),
                    path: path.to_path_buf(),
                    source,
                })?;
                info!(
                    target: SOCKETS_TARGET,
                    socket = %self.name,
                    path = %path,
                    "removed stale socket path"
                );
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SocketError::Bind {
                    name: self.name.clone(),
                    endpoint,
                    source,
                });
            }
        }

        let socket = self.create()?;
        let address = SockAddr::unix(path.as_std_path())
            .map_err(|source| self.bind_error(&endpoint, source))?;
        socket
            .bind(&address)
            .map_err(|source| self.bind_error(&endpoint, source))?;

        let mode = 0o777 & !self.umask;
        let prepared = fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|source| SocketError::Permissions {
                name: self.name.clone(),
                path: path.to_path_buf(),
                source,
            })
            .and_then(|()| self.finish(&socket));
        if let Err(error) = prepared {
            drop(socket);
            if let Err(cleanup) = fs::remove_file(path)
                && cleanup.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: SOCKETS_TARGET,
                    socket = %self.name,
                    path = %path,
                    error = %cleanup,
                    "failed to remove socket path after bind failure"
                );
            }
            return Err(error);
        }
        Ok(Bound {
            socket,
            owns_path: true,
            local_addr: None,
        })
    }

    fn create(&self) -> Result<RawSocket, SocketError> {
        RawSocket::new(
            self.family.domain(),
            self.kind.socket_type(),
            self.protocol.protocol(),
        )
        .map_err(|source| SocketError::Create {
            name: self.name.clone(),
            source,
        })
    }

    fn finish(&self, socket: &RawSocket) -> Result<(), SocketError> {
        if self.kind == SocketKind::Stream {
            socket
                .listen(self.backlog)
                .map_err(|source| SocketError::Listen {
                    name: self.name.clone(),
                    source,
                })?;
        }
        socket
            .set_nonblocking(!self.blocking)
            .map_err(|source| self.option_error("O_NONBLOCK", source))?;
        descriptor::set_inheritable(socket.as_raw_fd(), self.inheritable)
            .map_err(|source| self.option_error("FD_CLOEXEC", source))
    }

    fn apply_reuse_port(&mut self, socket: &RawSocket) {
        if let Err(error) = set_reuse_port(socket) {
            warn!(
                target: SOCKETS_TARGET,
                socket = %self.name,
                error = %error,
                "SO_REUSEPORT refused; continuing without it"
            );
            self.so_reuseport = false;
        }
    }

    fn option_error(&self, option: &'static str, source: io::Error) -> SocketError {
        SocketError::Option {
            name: self.name.clone(),
            option,
            source,
        }
    }

    fn bind_error(&self, endpoint: &str, source: io::Error) -> SocketError {
        if source.kind() == io::ErrorKind::AddrInUse {
            SocketError::AddressInUse {
                name: self.name.clone(),
                endpoint: endpoint.to_owned(),
            }
        } else {
            SocketError::Bind {
                name: self.name.clone(),
                endpoint: endpoint.to_owned(),
                source,
            }
        }
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            debug!(
                target: SOCKETS_TARGET,
                socket = %self.name,
                error = %error,
                "socket dropped with cleanup error"
            );
        }
    }
}

impl fmt::Display for Socket {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} ({})", self.name, self.endpoint())
    }
}

/// Introspection record for one socket.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SocketInfo {
    pub name: String,
    pub endpoint: String,
    pub family: AddressFamily,
    pub kind: SocketKind,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<Utf8PathBuf>,
    pub fd: Option<RawFd>,
    pub bound: bool,
}

fn resolve_address(
    name: &str,
    config: &SocketConfig,
    declared_family: Option<AddressFamily>,
) -> Result<(AddressFamily, SocketAddress), ConfigError> {
    if let Some(path) = &config.path {
        if config.host.is_some() || config.port.is_some() {
            return Err(ConfigError::ConflictingAddress {
                socket: name.to_owned(),
            });
        }
        return match declared_family {
            Some(family) if family != AddressFamily::Unix => {
                Err(ConfigError::PathWithNetworkFamily {
                    socket: name.to_owned(),
                    family: family.to_string(),
                })
            }
            _ => Ok((AddressFamily::Unix, SocketAddress::Path(path.clone()))),
        };
    }
    let family = declared_family.unwrap_or(AddressFamily::Inet);
    if family == AddressFamily::Unix {
        return Err(ConfigError::UnixWithoutPath {
            socket: name.to_owned(),
        });
    }
    let host = config
        .host
        .clone()
        .unwrap_or_else(|| DEFAULT_SOCKET_HOST.to_owned());
    let port = config.port.unwrap_or(DEFAULT_SOCKET_PORT);
    Ok((family, SocketAddress::Network { host, port }))
}

#[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
fn set_reuse_port(socket: &RawSocket) -> io::Result<()> {
    socket.set_reuse_port(true)
}

#[cfg(not(all(unix, not(any(target_os = "solaris", target_os = "illumos")))))]
fn set_reuse_port(_socket: &RawSocket) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
fn bind_device(socket: &RawSocket, interface: &str) -> io::Result<()> {
    socket.bind_device(Some(interface.as_bytes()))
}

#[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
fn bind_device(_socket: &RawSocket, _interface: &str) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::FileTypeExt;
    use std::os::unix::net::UnixStream;

    use rstest::rstest;
    use tempfile::TempDir;

    fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path).expect("utf8 temp path")
    }

    fn tcp_socket(configure: impl FnOnce(&mut SocketConfig)) -> Socket {
        let mut config = SocketConfig::tcp("web", "127.0.0.1", 0);
        configure(&mut config);
        Socket::load_from_config(&config).expect("valid socket config")
    }

    #[test]
    fn ephemeral_port_resolves_after_bind() {
        let mut socket = tcp_socket(|_| {});
        assert_eq!(socket.port(), Some(0));
        socket.bind_and_listen().expect("bind");
        let port = socket.port().expect("network socket has a port");
        assert_ne!(port, 0, "OS should assign a port");
        assert!(socket.endpoint().ends_with(&format!(":{port}")));
        socket.close().expect("close");
        assert!(!socket.is_bound());
    }

    #[test]
    fn double_bind_is_rejected() {
        let mut socket = tcp_socket(|_| {});
        socket.bind_and_listen().expect("first bind");
        let error = socket.bind_and_listen().expect_err("second bind");
        assert!(matches!(error, SocketError::AlreadyBound { .. }));
    }

    #[test]
    fn fileno_requires_bound_socket() {
        let socket = tcp_socket(|_| {});
        assert!(matches!(
            socket.fileno(),
            Err(SocketError::NotBound { .. })
        ));
    }

    #[rstest]
    #[case::default_nonblocking(false, true)]
    #[case::explicit_blocking(true, false)]
    fn blocking_flag_controls_descriptor(#[case] blocking: bool, #[case] nonblocking: bool) {
        let mut socket = tcp_socket(|config| config.blocking = blocking);
        socket.bind_and_listen().expect("bind");
        let fd = socket.fileno().expect("fd");
        assert_eq!(descriptor::is_nonblocking(fd).expect("flags"), nonblocking);
    }

    #[rstest]
    #[case::inheritable(true)]
    #[case::close_on_exec(false)]
    fn inheritable_flag_controls_descriptor(#[case] inheritable: bool) {
        let mut socket = tcp_socket(|config| config.inheritable = inheritable);
        socket.bind_and_listen().expect("bind");
        let fd = socket.fileno().expect("fd");
        assert_eq!(descriptor::is_inheritable(fd).expect("flags"), inheritable);
    }

    #[test]
    fn datagram_sockets_bind_without_listening() {
        let mut socket = tcp_socket(|config| config.kind = Some("SOCK_DGRAM".to_owned()));
        socket.bind_and_listen().expect("bind udp");
        assert!(socket.endpoint().starts_with("udp://"));
        assert_ne!(socket.port(), Some(0));
    }

    #[test]
    fn reuse_port_is_kept_where_supported() {
        let mut socket = tcp_socket(|config| config.so_reuseport = true);
        socket.bind_and_listen().expect("bind");
        assert_eq!(socket.so_reuseport(), REUSE_PORT_SUPPORTED);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn unknown_interface_fails_bind() {
        let mut socket =
            tcp_socket(|config| config.interface = Some("ringmaster-none0".to_owned()));
        let error = socket.bind_and_listen().expect_err("missing interface");
        assert!(matches!(
            error,
            SocketError::Option {
                option: "SO_BINDTODEVICE",
                ..
            }
        ));
        assert!(!socket.is_bound());
    }

    #[test]
    fn unix_socket_path_is_removed_on_close() {
        let dir = TempDir::new().expect("temp dir");
        let path = utf8(dir.path().join("web.sock"));
        let mut socket = Socket::load_from_config(&SocketConfig::unix("web", path.clone()))
            .expect("valid socket config");
        socket.bind_and_listen().expect("bind");
        UnixStream::connect(&path).expect("connect to bound socket");
        socket.close().expect("close");
        assert!(!path.exists(), "close should remove the socket path");
    }

    #[test]
    fn existing_path_without_replace_is_left_alone() {
        let dir = TempDir::new().expect("temp dir");
        let path = utf8(dir.path().join("web.sock"));
        fs::write(&path, b"keep me").expect("seed path");
        let mut socket = Socket::load_from_config(&SocketConfig::unix("web", path.clone()))
            .expect("valid socket config");

        let error = socket.bind_and_listen().expect_err("path in use");

        assert!(matches!(error, SocketError::AddressInUse { .. }));
        assert_eq!(fs::read(&path).expect("read seed"), b"keep me");
    }

    #[test]
    fn existing_path_with_replace_is_rebound() {
        let dir = TempDir::new().expect("temp dir");
        let path = utf8(dir.path().join("web.sock"));
        fs::write(&path, b"stale").expect("seed path");
        let mut config = SocketConfig::unix("web", path.clone());
        config.replace = true;
        let mut socket = Socket::load_from_config(&config).expect("valid socket config");

        socket.bind_and_listen().expect("replace and bind");

        let metadata = fs::symlink_metadata(&path).expect("metadata");
        assert!(metadata.file_type().is_socket());
    }

    #[test]
    fn umask_sets_path_permissions() {
        let dir = TempDir::new().expect("temp dir");
        let path = utf8(dir.path().join("open.sock"));
        let mut config = SocketConfig::unix("open", path.clone());
        config.umask = 0;
        let mut socket = Socket::load_from_config(&config).expect("valid socket config");

        socket.bind_and_listen().expect("bind");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o777);
    }

    #[test]
    fn missing_proto_uses_os_default() {
        let socket = Socket::load_from_config(&SocketConfig::named("plain")).expect("valid");
        assert_eq!(socket.protocol(), Protocol::Default);
        assert_eq!(socket.host(), Some("localhost"));
        assert_eq!(socket.port(), Some(8080));
    }

    #[test]
    fn unknown_proto_is_a_config_error() {
        let mut config = SocketConfig::named("bad");
        config.proto = Some("foo".to_owned());
        let error = Socket::load_from_config(&config).expect_err("unknown proto");
        assert!(matches!(error, ConfigError::UnknownProtocol { .. }));
    }

    #[rstest]
    #[case::path_and_port(|c: &mut SocketConfig| {
        c.path = Some(Utf8PathBuf::from("/tmp/x.sock"));
        c.port = Some(80);
    })]
    #[case::unix_without_path(|c: &mut SocketConfig| c.family = Some("AF_UNIX".to_owned()))]
    #[case::path_with_inet(|c: &mut SocketConfig| {
        c.path = Some(Utf8PathBuf::from("/tmp/x.sock"));
        c.family = Some("AF_INET".to_owned());
    })]
    #[case::unknown_family(|c: &mut SocketConfig| c.family = Some("AF_APPLETALK".to_owned()))]
    #[case::unknown_type(|c: &mut SocketConfig| c.kind = Some("SOCK_RAW".to_owned()))]
    fn malformed_definitions_are_rejected(#[case] mutate: fn(&mut SocketConfig)) {
        let mut config = SocketConfig::named("bad");
        mutate(&mut config);
        assert!(Socket::load_from_config(&config).is_err());
    }

    #[test]
    fn ipv6_family_is_recorded() {
        let mut config = SocketConfig::tcp("v6", "::1", 0);
        config.family = Some("AF_INET6".to_owned());
        let socket = Socket::load_from_config(&config).expect("valid");
        assert_eq!(socket.family(), AddressFamily::Inet6);
    }
}
