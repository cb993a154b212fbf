//! Name-keyed registry of managed sockets.

use std::os::fd::RawFd;

use ringmaster_config::SocketConfig;
use tracing::{info, warn};

use super::SOCKETS_TARGET;
use super::errors::SocketError;
use super::socket::{Socket, SocketInfo};

/// Descriptor of a named socket as seen by a spawned process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritedSocket {
    /// Socket name.
    pub name: String,
    /// Descriptor number in the supervisor, kept unchanged in the child.
    pub fd: RawFd,
}

/// Sockets bound and closed as a unit.
///
/// Lookup is by name; declaration order only fixes the order in which
/// sockets are bound and logged.
#[derive(Debug, Default)]
pub struct SocketSet {
    sockets: Vec<Socket>,
}

impl SocketSet {
    /// Builds an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every definition and collects the sockets, without binding.
    pub fn from_configs<'a>(
        configs: impl IntoIterator<Item = &'a SocketConfig>,
    ) -> Result<Self, SocketError> {
        let mut set = Self::new();
        for config in configs {
            set.add_config(config)?;
        }
        Ok(set)
    }

    /// Registers a network socket on `host:port` with default options.
    pub fn add(&mut self, name: &str, host: &str, port: u16) -> Result<&Socket, SocketError> {
        self.add_config(&SocketConfig::tcp(name, host, port))
    }

    /// Registers a socket built from a full definition.
    pub fn add_config(&mut self, config: &SocketConfig) -> Result<&Socket, SocketError> {
        let socket = Socket::load_from_config(config)?;
        self.insert(socket)?;
        self.get(&config.name)
    }

    /// Registers an already validated socket.
    pub fn insert(&mut self, socket: Socket) -> Result<(), SocketError> {
        if self.contains(socket.name()) {
            return Err(SocketError::DuplicateName {
                name: socket.name().to_owned(),
            });
        }
        self.sockets.push(socket);
        Ok(())
    }

    /// Binds every socket not yet bound.
    ///
    /// If any bind fails, the sockets bound by this call are closed again
    /// before the error is returned; sockets that were bound earlier are
    /// left untouched.
    pub fn bind_and_listen_all(&mut self) -> Result<(), SocketError> {
        let mut bound_now = Vec::new();
        for index in 0..self.sockets.len() {
            let Some(socket) = self.sockets.get_mut(index) else {
                continue;
            };
            if socket.is_bound() {
                continue;
            }
            if let Err(error) = socket.bind_and_listen() {
                warn!(
                    target: SOCKETS_TARGET,
                    socket = %socket.name(),
                    error = %error,
                    rollback = bound_now.len(),
                    "socket bind failed; rolling back"
                );
                self.rollback(&bound_now);
                return Err(error);
            }
            bound_now.push(index);
        }
        info!(
            target: SOCKETS_TARGET,
            bound = bound_now.len(),
            total = self.sockets.len(),
            "sockets bound"
        );
        Ok(())
    }

    /// Closes every socket, collecting rather than stopping at failures.
    pub fn close_all(&mut self) -> Vec<SocketError> {
        let errors: Vec<_> = self
            .sockets
            .iter_mut()
            .filter_map(|socket| socket.close().err())
            .collect();
        info!(
            target: SOCKETS_TARGET,
            total = self.sockets.len(),
            failures = errors.len(),
            "sockets closed"
        );
        errors
    }

    /// Looks up a socket by name.
    pub fn get(&self, name: &str) -> Result<&Socket, SocketError> {
        self.sockets
            .iter()
            .find(|socket| socket.name() == name)
            .ok_or_else(|| SocketError::NotFound {
                name: name.to_owned(),
            })
    }

    /// Looks up a socket by name for mutation.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Socket, SocketError> {
        self.sockets
            .iter_mut()
            .find(|socket| socket.name() == name)
            .ok_or_else(|| SocketError::NotFound {
                name: name.to_owned(),
            })
    }

    /// Removes a socket from the set, handing ownership to the caller.
    pub fn remove(&mut self, name: &str) -> Result<Socket, SocketError> {
        let index = self
            .sockets
            .iter()
            .position(|socket| socket.name() == name)
            .ok_or_else(|| SocketError::NotFound {
                name: name.to_owned(),
            })?;
        Ok(self.sockets.remove(index))
    }

    /// Swaps in `socket` where the socket of the same name sits, keeping
    /// declaration order, and hands back the previous one.
    pub fn replace(&mut self, socket: Socket) -> Result<Socket, SocketError> {
        let slot = self
            .sockets
            .iter_mut()
            .find(|current| current.name() == socket.name())
            .ok_or_else(|| SocketError::NotFound {
                name: socket.name().to_owned(),
            })?;
        Ok(std::mem::replace(slot, socket))
    }

    /// Returns true when a socket carries `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.sockets.iter().any(|socket| socket.name() == name)
    }

    /// Descriptors for the named sockets, in the order requested.
    pub fn inherited(&self, names: &[String]) -> Result<Vec<InheritedSocket>, SocketError> {
        names
            .iter()
            .map(|name| {
                let socket = self.get(name)?;
                Ok(InheritedSocket {
                    name: socket.name().to_owned(),
                    fd: socket.fileno()?,
                })
            })
            .collect()
    }

    /// Iterates sockets in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Socket> {
        self.sockets.iter()
    }

    /// Introspection records in declaration order.
    #[must_use]
    pub fn infos(&self) -> Vec<SocketInfo> {
        self.sockets.iter().map(Socket::info).collect()
    }

    /// Number of registered sockets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    /// Returns true when no socket is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    fn rollback(&mut self, indices: &[usize]) {
        for index in indices {
            if let Some(socket) = self.sockets.get_mut(*index)
                && let Err(error) = socket.close()
            {
                warn!(
                    target: SOCKETS_TARGET,
                    socket = %socket.name(),
                    error = %error,
                    "rollback close failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn binds_many_ephemeral_sockets() {
        let mut set = SocketSet::new();
        for index in 0..5 {
            set.add(&index.to_string(), "127.0.0.1", 0).expect("add socket");
        }
        let before: Vec<_> = set.iter().map(Socket::port).collect();

        set.bind_and_listen_all().expect("bind all");

        let after: Vec<_> = set.iter().map(Socket::port).collect();
        assert_ne!(before, after, "ports should resolve after bind");
        let unique: BTreeSet<_> = after.iter().flatten().collect();
        assert_eq!(unique.len(), 5, "each socket gets its own port");
        assert!(set.close_all().is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut set = SocketSet::new();
        set.add("web", "127.0.0.1", 0).expect("first");
        let error = set.add("web", "127.0.0.1", 0).expect_err("duplicate");
        assert!(matches!(error, SocketError::DuplicateName { .. }));
    }

    #[test]
    fn same_name_in_separate_sets_binds_independently() {
        let mut first = SocketSet::new();
        let mut second = SocketSet::new();
        first.add("web", "127.0.0.1", 0).expect("add");
        second.add("web", "127.0.0.1", 0).expect("add");
        first.bind_and_listen_all().expect("bind first");
        second.bind_and_listen_all().expect("bind second");
        let one = first.get("web").expect("web").port();
        let two = second.get("web").expect("web").port();
        assert_ne!(one, two);
    }

    #[test]
    fn lookup_of_unknown_name_fails() {
        let set = SocketSet::new();
        assert!(matches!(
            set.get("missing"),
            Err(SocketError::NotFound { .. })
        ));
    }

    #[test]
    fn failed_bind_rolls_back_earlier_members() {
        let dir = TempDir::new().expect("temp dir");
        let good = Utf8PathBuf::from_path_buf(dir.path().join("good.sock")).expect("utf8");
        let taken = Utf8PathBuf::from_path_buf(dir.path().join("taken.sock")).expect("utf8");
        fs::write(&taken, b"occupied").expect("seed taken path");
        let mut set = SocketSet::new();
        set.add_config(&SocketConfig::unix("good", good.clone()))
            .expect("add good");
        set.add_config(&SocketConfig::unix("taken", taken.clone()))
            .expect("add taken");

        let error = set.bind_and_listen_all().expect_err("bind should fail");

        assert!(matches!(error, SocketError::AddressInUse { .. }));
        assert!(!set.get("good").expect("good").is_bound());
        assert!(!good.exists(), "rolled back socket path should be removed");
        assert!(taken.exists(), "pre-existing path must be preserved");
    }

    #[test]
    fn replace_keeps_declaration_order() {
        let mut set = SocketSet::new();
        set.add("a", "127.0.0.1", 0).expect("add a");
        set.add("b", "127.0.0.1", 0).expect("add b");
        let mut config = SocketConfig::tcp("a", "127.0.0.1", 0);
        config.backlog = 16;

        let previous = set
            .replace(Socket::load_from_config(&config).expect("valid config"))
            .expect("a is registered");

        assert_eq!(previous.name(), "a");
        let names: Vec<_> = set.iter().map(Socket::name).collect();
        assert_eq!(names, ["a", "b"]);
        let missing = Socket::load_from_config(&SocketConfig::tcp("c", "127.0.0.1", 0))
            .expect("valid config");
        assert!(matches!(
            set.replace(missing),
            Err(SocketError::NotFound { .. })
        ));
    }

    #[test]
    fn inherited_descriptors_follow_requested_order() {
        let mut set = SocketSet::new();
        set.add("a", "127.0.0.1", 0).expect("add a");
        set.add("b", "127.0.0.1", 0).expect("add b");
        set.bind_and_listen_all().expect("bind");

        let inherited = set
            .inherited(&["b".to_owned(), "a".to_owned()])
            .expect("inherited");

        let names: Vec<_> = inherited.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(inherited[0].fd, set.get("b").expect("b").fileno().expect("fd"));
    }

    #[test]
    fn close_all_removes_unix_paths() {
        let dir = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("s.sock")).expect("utf8");
        let mut set = SocketSet::new();
        set.add_config(&SocketConfig::unix("s", path.clone()))
            .expect("add");
        set.bind_and_listen_all().expect("bind");
        assert!(path.exists());
        assert!(set.close_all().is_empty());
        assert!(!path.exists());
    }
}
