//! Manifest validation.
//!
//! A manifest is turned into unbound sockets and validated watcher specs in
//! one pass. Any problem is reported before a descriptor is created or a
//! running watcher is touched.

use std::collections::BTreeSet;

use ringmaster_config::Manifest;

use crate::errors::ConfigError;
use crate::sockets::Socket;
use crate::watcher::WatcherSpec;

/// Unbound sockets and watcher specs, in declaration order.
#[derive(Debug)]
pub(super) struct Plan {
    pub(super) sockets: Vec<Socket>,
    pub(super) watchers: Vec<WatcherSpec>,
}

impl Plan {
    pub(super) fn from_manifest(manifest: &Manifest) -> Result<Self, ConfigError> {
        let mut socket_names = BTreeSet::new();
        let mut sockets = Vec::with_capacity(manifest.sockets.len());
        for config in &manifest.sockets {
            let socket = Socket::load_from_config(config)?;
            if !socket_names.insert(socket.name().to_owned()) {
                return Err(ConfigError::DuplicateSocket {
                    name: socket.name().to_owned(),
                });
            }
            sockets.push(socket);
        }

        let mut watcher_names = BTreeSet::new();
        let mut watchers = Vec::with_capacity(manifest.watchers.len());
        for config in &manifest.watchers {
            let spec = WatcherSpec::from_config(config)?;
            if !watcher_names.insert(spec.name.clone()) {
                return Err(ConfigError::DuplicateWatcher { name: spec.name });
            }
            if let Some(missing) = spec
                .sockets
                .iter()
                .find(|name| !socket_names.contains(name.as_str()))
            {
                return Err(ConfigError::UnknownSocket {
                    watcher: spec.name.clone(),
                    socket: missing.clone(),
                });
            }
            watchers.push(spec);
        }
        Ok(Self { sockets, watchers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringmaster_config::{SocketConfig, WatcherConfig};

    fn manifest() -> Manifest {
        let mut watcher = WatcherConfig::new("web", "server");
        watcher.sockets = vec!["http".to_owned()];
        Manifest {
            sockets: vec![SocketConfig::tcp("http", "127.0.0.1", 0)],
            watchers: vec![watcher],
        }
    }

    #[test]
    fn valid_manifest_keeps_declaration_order() {
        let mut manifest = manifest();
        manifest.watchers.push(WatcherConfig::new("jobs", "worker"));
        let plan = Plan::from_manifest(&manifest).expect("valid plan");
        let names: Vec<_> = plan.watchers.iter().map(|spec| spec.name.as_str()).collect();
        assert_eq!(names, ["web", "jobs"]);
        assert!(plan.sockets.iter().all(|socket| !socket.is_bound()));
    }

    #[test]
    fn unknown_socket_reference_is_rejected() {
        let mut manifest = manifest();
        manifest.sockets.clear();
        assert_eq!(
            Plan::from_manifest(&manifest).map(|_| ()),
            Err(ConfigError::UnknownSocket {
                watcher: "web".to_owned(),
                socket: "http".to_owned(),
            })
        );
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut manifest = manifest();
        manifest
            .sockets
            .push(SocketConfig::tcp("http", "127.0.0.1", 0));
        assert!(matches!(
            Plan::from_manifest(&manifest),
            Err(ConfigError::DuplicateSocket { .. })
        ));

        let mut manifest = self::manifest();
        manifest.watchers.push(WatcherConfig::new("web", "other"));
        assert!(matches!(
            Plan::from_manifest(&manifest),
            Err(ConfigError::DuplicateWatcher { .. })
        ));
    }
}
