//! Top-level orchestration of sockets and watchers.
//!
//! The arbiter is an explicitly constructed context object: it owns the
//! socket set, every watcher, and the shared tick that drives them. Several
//! arbiters can coexist in one process, each with its own collaborators.

mod command;
mod errors;
mod plan;
mod reload;

use std::time::Duration;

use ringmaster_config::Manifest;
use ringmaster_config::defaults::DEFAULT_CHECK_INTERVAL_MS;
use serde::Serialize;
use strum::Display;
use tracing::{info, warn};

use crate::events::{EventListener, SupervisorEvent};
use crate::sockets::{SocketInfo, SocketSet};
use crate::watcher::{SupervisorDeps, Watcher, WatcherStatus};

pub use command::Command;
pub use errors::{ArbiterError, CommandError};
pub use reload::ReloadSummary;

use plan::Plan;

pub(crate) const ARBITER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::arbiter");

/// Lifecycle of the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArbiterState {
    /// Sockets closed, no watcher running.
    Stopped,
    /// Sockets bound, watchers supervised.
    Running,
    /// Draining watchers before closing sockets.
    Stopping,
}

/// Snapshot of everything the arbiter manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArbiterStatus {
    /// Lifecycle state.
    pub state: ArbiterState,
    /// Sockets in declaration order.
    pub sockets: Vec<SocketInfo>,
    /// Watchers in declaration order.
    pub watchers: Vec<WatcherStatus>,
}

/// Owner of the socket set and the watcher collection.
#[derive(Debug)]
pub struct Arbiter {
    manifest: Manifest,
    sockets: SocketSet,
    watchers: Vec<Watcher>,
    draining: Vec<Watcher>,
    deps: SupervisorDeps,
    state: ArbiterState,
    check_interval: Duration,
}

impl Arbiter {
    /// Validates the manifest and builds a stopped arbiter.
    ///
    /// No descriptor is created and no process spawned until [`start`].
    ///
    /// [`start`]: Arbiter::start
    pub fn new(manifest: Manifest, deps: SupervisorDeps) -> Result<Self, ArbiterError> {
        let Plan { sockets, watchers } = Plan::from_manifest(&manifest)?;
        let mut set = SocketSet::new();
        for socket in sockets {
            set.insert(socket)?;
        }
        let watchers = watchers
            .into_iter()
            .map(|spec| Watcher::new(spec, deps.clone()))
            .collect();
        Ok(Self {
            manifest,
            sockets: set,
            watchers,
            draining: Vec::new(),
            deps,
            state: ArbiterState::Stopped,
            check_interval: Duration::from_millis(DEFAULT_CHECK_INTERVAL_MS),
        })
    }

    /// Sets the tick period used while draining in [`Arbiter::stop`].
    #[must_use]
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Binds every socket, then starts autostart watchers in declared order.
    ///
    /// A bind failure aborts the start before any watcher runs; sockets
    /// bound by this call are closed again.
    pub fn start(&mut self) -> Result<(), ArbiterError> {
        if self.state != ArbiterState::Stopped {
            return Err(ArbiterError::AlreadyRunning);
        }
        self.sockets.bind_and_listen_all()?;
        self.announce_bound_sockets();
        self.state = ArbiterState::Running;
        for index in 0..self.watchers.len() {
            let Some(watcher) = self.watchers.get_mut(index) else {
                continue;
            };
            if !watcher.spec().autostart {
                continue;
            }
            if let Err(error) = watcher.start(&self.sockets) {
                warn!(
                    target: ARBITER_TARGET,
                    watcher = %watcher.name(),
                    error = %error,
                    "watcher failed to start; aborting arbiter start"
                );
                self.drain_and_close();
                return Err(error.into());
            }
        }
        info!(
            target: ARBITER_TARGET,
            sockets = self.sockets.len(),
            watchers = self.watchers.len(),
            "arbiter started"
        );
        self.deps.events.emit(SupervisorEvent::ArbiterStarted {
            sockets: self.sockets.len(),
            watchers: self.watchers.len(),
        });
        Ok(())
    }

    /// Stops every watcher gracefully, then closes every socket.
    ///
    /// Blocks, ticking every check interval, until each watcher reports
    /// stopped.
    pub fn stop(&mut self) -> Result<(), ArbiterError> {
        if self.state != ArbiterState::Running {
            return Err(ArbiterError::NotRunning);
        }
        info!(target: ARBITER_TARGET, "arbiter stopping");
        self.drain_and_close();
        self.deps.events.emit(SupervisorEvent::ArbiterStopped);
        Ok(())
    }

    /// One shared health-check step: reap once, then tick every watcher.
    pub fn tick(&mut self) {
        self.deps.reaper.reap();
        for watcher in self.watchers.iter_mut().chain(self.draining.iter_mut()) {
            watcher.tick();
        }
        self.draining.retain(|watcher| !watcher.is_stopped());
    }

    /// Subscribes `listener` to every event emitted afterwards.
    pub fn on_event(&self, listener: impl EventListener + 'static) {
        self.deps.events.subscribe(listener);
    }

    /// Snapshot of sockets and watchers.
    #[must_use]
    pub fn status(&self) -> ArbiterStatus {
        ArbiterStatus {
            state: self.state,
            sockets: self.sockets.infos(),
            watchers: self.watchers.iter().map(Watcher::status).collect(),
        }
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ArbiterState {
        self.state
    }

    /// Managed sockets.
    #[must_use]
    pub fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    /// Managed watchers in declaration order.
    #[must_use]
    pub fn watchers(&self) -> &[Watcher] {
        &self.watchers
    }

    /// Looks up a watcher by name.
    #[must_use]
    pub fn watcher(&self, name: &str) -> Option<&Watcher> {
        self.watchers.iter().find(|watcher| watcher.name() == name)
    }

    /// Manifest currently applied.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Tick period.
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        self.check_interval
    }

    fn announce_bound_sockets(&self) {
        for socket in self.sockets.iter().filter(|socket| socket.is_bound()) {
            self.deps.events.emit(SupervisorEvent::SocketBound {
                socket: socket.name().to_owned(),
                endpoint: socket.endpoint(),
            });
        }
    }

    fn all_stopped(&self) -> bool {
        self.draining.is_empty() && self.watchers.iter().all(Watcher::is_stopped)
    }

    fn drain_and_close(&mut self) {
        self.state = ArbiterState::Stopping;
        for watcher in self.watchers.iter_mut().chain(self.draining.iter_mut()) {
            watcher.stop();
        }
        loop {
            self.tick();
            if self.all_stopped() {
                break;
            }
            self.deps.clock.sleep(self.check_interval);
        }
        let names: Vec<_> = self
            .sockets
            .iter()
            .filter(|socket| socket.is_bound())
            .map(|socket| socket.name().to_owned())
            .collect();
        for error in self.sockets.close_all() {
            warn!(target: ARBITER_TARGET, error = %error, "socket close failed");
        }
        for socket in names {
            self.deps
                .events
                .emit(SupervisorEvent::SocketClosed { socket });
        }
        self.state = ArbiterState::Stopped;
        info!(target: ARBITER_TARGET, "arbiter stopped");
    }
}
