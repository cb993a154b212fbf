//! Applying a new manifest to a live arbiter.

use serde::Serialize;
use tracing::{info, warn};

use ringmaster_config::Manifest;

use super::plan::Plan;
use super::{ARBITER_TARGET, Arbiter, ArbiterError, ArbiterState};
use crate::events::SupervisorEvent;
use crate::sockets::{Socket, SocketError, SocketSet};
use crate::watcher::Watcher;

/// What a reload changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    /// Watchers created.
    pub added: Vec<String>,
    /// Watchers stopped and dropped.
    pub removed: Vec<String>,
    /// Watchers rolled onto their new definition.
    pub restarted: Vec<String>,
    /// Sockets bound for the first time.
    pub sockets_added: Vec<String>,
    /// Sockets closed and dropped.
    pub sockets_removed: Vec<String>,
    /// Sockets closed and bound again with a new definition.
    pub sockets_rebound: Vec<String>,
}

impl Arbiter {
    /// Re-reads the configuration and converges on it.
    ///
    /// The manifest is validated first; an invalid one leaves everything as
    /// it was. Surviving watchers get a rolling restart, new ones are started,
    /// removed ones are stopped gracefully in the background. Sockets whose
    /// definition changed are closed and bound again; watchers inheriting
    /// them are drained beforehand and started afresh. A socket that fails
    /// to bind leaves the previous sockets and watchers in place.
    pub fn reload(&mut self, manifest: Manifest) -> Result<ReloadSummary, ArbiterError> {
        let Plan { sockets, watchers } = Plan::from_manifest(&manifest)?;
        let mut summary = ReloadSummary::default();

        if self.state != ArbiterState::Running {
            let mut set = SocketSet::new();
            for socket in sockets {
                set.insert(socket)?;
            }
            self.sockets = set;
            self.watchers = watchers
                .into_iter()
                .map(|spec| Watcher::new(spec, self.deps.clone()))
                .collect();
            self.manifest = manifest;
            return Ok(summary);
        }

        let paused = self.reconcile_sockets(sockets, &mut summary)?;

        let mut previous = std::mem::take(&mut self.watchers);
        let mut next = Vec::with_capacity(watchers.len());
        let mut first_error = None;
        for spec in watchers {
            let name = spec.name.clone();
            let autostart = spec.autostart;
            let existing = previous
                .iter()
                .position(|watcher| watcher.name() == name)
                .map(|index| previous.swap_remove(index));
            let result = match existing {
                Some(mut watcher) => {
                    let mut result = watcher.reconfigure(spec, &self.sockets);
                    if result.is_ok() && paused.contains(&name) {
                        result = watcher.start(&self.sockets);
                    }
                    summary.restarted.push(name);
                    next.push(watcher);
                    result
                }
                None => {
                    let mut watcher = Watcher::new(spec, self.deps.clone());
                    let result = if autostart {
                        watcher.start(&self.sockets)
                    } else {
                        Ok(())
                    };
                    summary.added.push(name);
                    next.push(watcher);
                    result
                }
            };
            if let Err(error) = result {
                warn!(target: ARBITER_TARGET, error = %error, "watcher reload failed");
                first_error.get_or_insert(error);
            }
        }
        for mut watcher in previous {
            summary.removed.push(watcher.name().to_owned());
            watcher.stop();
            self.draining.push(watcher);
        }
        self.watchers = next;
        self.manifest = manifest;

        info!(
            target: ARBITER_TARGET,
            added = ?summary.added,
            removed = ?summary.removed,
            restarted = ?summary.restarted,
            "arbiter reloaded"
        );
        self.deps.events.emit(SupervisorEvent::ArbiterReloaded {
            added: summary.added.clone(),
            removed: summary.removed.clone(),
            restarted: summary.restarted.clone(),
        });
        match first_error {
            Some(error) => Err(error.into()),
            None => Ok(summary),
        }
    }

    /// Converges the socket set on `sockets`.
    ///
    /// Watchers inheriting a socket that is removed or redefined are
    /// drained first, so no old worker still holds the listener when the
    /// new one binds. Nothing is committed until every new socket has
    /// bound; on failure the previous sockets are bound again and the
    /// drained watchers restarted. Returns the watchers that were drained
    /// and must be started again.
    fn reconcile_sockets(
        &mut self,
        sockets: Vec<Socket>,
        summary: &mut ReloadSummary,
    ) -> Result<Vec<String>, ArbiterError> {
        let stale: Vec<String> = self
            .sockets
            .iter()
            .filter(|current| {
                !sockets
                    .iter()
                    .any(|wanted| wanted.name() == current.name())
            })
            .map(|current| current.name().to_owned())
            .collect();
        let mut rebound = Vec::new();
        let mut staged = Vec::new();
        for socket in sockets {
            let unchanged = self
                .sockets
                .get(socket.name())
                .ok()
                .map(|current| current.same_definition(&socket));
            match unchanged {
                Some(true) => {}
                Some(false) => {
                    rebound.push(socket.name().to_owned());
                    staged.push(socket);
                }
                None => staged.push(socket),
            }
        }

        let released: Vec<String> = stale.iter().chain(rebound.iter()).cloned().collect();
        let paused = self.release_sockets(&released);
        for name in &released {
            if let Ok(current) = self.sockets.get_mut(name)
                && let Err(error) = current.close()
            {
                warn!(target: ARBITER_TARGET, error = %error, "socket close failed");
            }
        }
        if let Err(error) = bind_staged(&mut staged) {
            self.restore_sockets(&paused);
            return Err(error.into());
        }

        for name in stale {
            if self.sockets.remove(&name).is_ok() {
                self.deps.events.emit(SupervisorEvent::SocketClosed {
                    socket: name.clone(),
                });
            }
            summary.sockets_removed.push(name);
        }
        for socket in staged {
            let name = socket.name().to_owned();
            let endpoint = socket.endpoint();
            if rebound.contains(&name) {
                self.sockets.replace(socket)?;
                self.deps.events.emit(SupervisorEvent::SocketClosed {
                    socket: name.clone(),
                });
                summary.sockets_rebound.push(name.clone());
            } else {
                self.sockets.insert(socket)?;
                summary.sockets_added.push(name.clone());
            }
            self.deps.events.emit(SupervisorEvent::SocketBound {
                socket: name,
                endpoint,
            });
        }
        Ok(paused)
    }

    /// Stops every watcher inheriting one of `names` and ticks until no
    /// process holding those descriptors is left.
    fn release_sockets(&mut self, names: &[String]) -> Vec<String> {
        if names.is_empty() {
            return Vec::new();
        }
        let inherits = |watcher: &Watcher| {
            watcher
                .spec()
                .sockets
                .iter()
                .any(|socket| names.contains(socket))
        };
        let mut paused = Vec::new();
        for watcher in &mut self.watchers {
            if inherits(watcher) && !watcher.is_stopped() {
                paused.push(watcher.name().to_owned());
                watcher.stop();
            }
        }
        info!(
            target: ARBITER_TARGET,
            sockets = ?names,
            watchers = ?paused,
            "draining watchers before rebinding sockets"
        );
        loop {
            self.tick();
            let holding = self
                .watchers
                .iter()
                .chain(self.draining.iter())
                .any(|watcher| inherits(watcher) && !watcher.is_stopped());
            if !holding {
                break;
            }
            self.deps.clock.sleep(self.check_interval);
        }
        paused
    }

    /// Rebinds the sockets closed by a failed reload and restarts the
    /// watchers drained for it.
    fn restore_sockets(&mut self, paused: &[String]) {
        if let Err(error) = self.sockets.bind_and_listen_all() {
            warn!(
                target: ARBITER_TARGET,
                error = %error,
                "previous sockets could not be bound again"
            );
        }
        for watcher in &mut self.watchers {
            if !paused.iter().any(|name| name == watcher.name()) {
                continue;
            }
            if let Err(error) = watcher.start(&self.sockets) {
                warn!(
                    target: ARBITER_TARGET,
                    watcher = %watcher.name(),
                    error = %error,
                    "drained watcher could not be restarted"
                );
            }
        }
    }
}

/// Binds every staged socket, closing them all again if one fails.
fn bind_staged(staged: &mut [Socket]) -> Result<(), SocketError> {
    let failure = staged
        .iter_mut()
        .find_map(|socket| socket.bind_and_listen().err());
    let Some(error) = failure else {
        return Ok(());
    };
    for socket in staged.iter_mut() {
        if let Err(close_error) = socket.close() {
            warn!(target: ARBITER_TARGET, error = %close_error, "staged socket close failed");
        }
    }
    Err(error)
}
