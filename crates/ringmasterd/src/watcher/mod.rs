//! Supervision of one homogeneous pool of worker processes.
//!
//! A watcher owns a fixed number of slots. Each slot holds at most one live
//! process; when that process dies unexpectedly the slot is refilled after a
//! backoff delay, unless the slot has exited too often inside the flapping
//! window, in which case it is paused until an operator restarts it.
//!
//! Nothing here blocks. Exits arrive from the shared [`Reaper`] over a
//! channel and every timer (grace period, backoff, minimum uptime) is a
//! deadline checked against the injected [`Clock`] on each [`Watcher::tick`].

mod errors;
mod policy;
mod spec;
mod status;
mod template;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

use ringmaster_config::WatcherConfig;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::errors::ConfigError;
use crate::events::{EventBus, SupervisorEvent};
use crate::process::{
    ExitEvent, LaunchSpec, ProcessHandle, ProcessLauncher, Reaper, SpawnError, SystemLauncher,
};
use crate::sockets::{InheritedSocket, SocketError, SocketSet};

pub use errors::WatcherError;
pub use policy::{BackoffPolicy, FlappingPolicy};
pub use spec::WatcherSpec;
pub use status::{ProcessInfo, SlotHealth, SlotReport, WatcherHealth, WatcherState, WatcherStatus};
pub use template::{SOCKETS_ENV_VAR, WATCHER_ENV_VAR, WID_ENV_VAR};

pub(crate) const WATCHER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::watcher");

/// Collaborators shared by every watcher of one arbiter.
#[derive(Clone)]
pub struct SupervisorDeps {
    /// Starts processes.
    pub launcher: Arc<dyn ProcessLauncher>,
    /// Collects exits for every watcher.
    pub reaper: Arc<Reaper>,
    /// Monotonic time source.
    pub clock: Arc<dyn Clock>,
    /// Event fan-out.
    pub events: EventBus,
}

impl SupervisorDeps {
    /// Real processes, real time, events logged through `tracing`.
    #[must_use]
    pub fn system() -> Self {
        Self {
            launcher: Arc::new(SystemLauncher),
            reaper: Arc::new(Reaper::system()),
            clock: Arc::new(SystemClock),
            events: EventBus::with_logger(),
        }
    }
}

impl fmt::Debug for SupervisorDeps {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SupervisorDeps")
            .field("reaper", &self.reaper)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Slot {
    wid: usize,
    process: Option<Box<dyn ProcessHandle>>,
    exits: VecDeque<Instant>,
    respawn_at: Option<Instant>,
    health: SlotHealth,
}

impl Slot {
    fn new(wid: usize) -> Self {
        Self {
            wid,
            process: None,
            exits: VecDeque::new(),
            respawn_at: None,
            health: SlotHealth::Active,
        }
    }

    fn clear_health(&mut self, now: Instant) {
        if self.health != SlotHealth::Active {
            self.health = SlotHealth::Active;
            self.exits.clear();
        }
        if self.process.is_none() {
            self.respawn_at = Some(now);
        }
    }
}

#[derive(Debug)]
struct Retiring {
    wid: usize,
    process: Box<dyn ProcessHandle>,
    deadline: Instant,
    killed: bool,
}

/// One supervised process pool.
#[derive(Debug)]
pub struct Watcher {
    spec: WatcherSpec,
    state: WatcherState,
    slots: Vec<Slot>,
    retiring: Vec<Retiring>,
    restart_queue: VecDeque<usize>,
    inherited: Vec<InheritedSocket>,
    exits_tx: Sender<ExitEvent>,
    exits_rx: Receiver<ExitEvent>,
    deps: SupervisorDeps,
}

impl Watcher {
    /// Builds a stopped watcher from a validated definition.
    #[must_use]
    pub fn new(spec: WatcherSpec, deps: SupervisorDeps) -> Self {
        let (exits_tx, exits_rx) = mpsc::channel();
        Self {
            spec,
            state: WatcherState::Stopped,
            slots: Vec::new(),
            retiring: Vec::new(),
            restart_queue: VecDeque::new(),
            inherited: Vec::new(),
            exits_tx,
            exits_rx,
            deps,
        }
    }

    /// Validates a manifest entry and builds a stopped watcher.
    pub fn from_config(config: &WatcherConfig, deps: SupervisorDeps) -> Result<Self, ConfigError> {
        Ok(Self::new(WatcherSpec::from_config(config)?, deps))
    }

    /// Watcher name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Active definition.
    #[must_use]
    pub fn spec(&self) -> &WatcherSpec {
        &self.spec
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> WatcherState {
        self.state
    }

    /// Desired process count.
    #[must_use]
    pub const fn numprocesses(&self) -> usize {
        self.spec.numprocesses
    }

    /// True once every process has been reaped after a stop.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state == WatcherState::Stopped
    }

    /// True when a slot is flapping or failed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.health != SlotHealth::Active)
    }

    /// Processes currently alive, retiring ones included.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.pids().len()
    }

    /// Pids of every live process, slots first, then retiring ones.
    #[must_use]
    pub fn pids(&self) -> Vec<u32> {
        self.slots
            .iter()
            .filter_map(|slot| slot.process.as_ref())
            .chain(self.retiring.iter().map(|retiring| &retiring.process))
            .filter(|process| process.is_alive())
            .map(|process| process.pid())
            .collect()
    }

    /// Starts a stopped watcher, or clears paused slots on a live one.
    pub fn start(&mut self, sockets: &SocketSet) -> Result<(), WatcherError> {
        let now = self.deps.clock.now();
        match self.state {
            WatcherState::Stopped => {}
            WatcherState::Stopping => {
                return Err(WatcherError::Stopping {
                    watcher: self.spec.name.clone(),
                });
            }
            _ => {
                self.resume(now);
                return Ok(());
            }
        }
        self.inherited = self.resolve_sockets(sockets)?;
        self.set_state(WatcherState::Starting);
        self.slots = (0..self.spec.numprocesses).map(Slot::new).collect();
        for index in 0..self.slots.len() {
            self.spawn_into(index, now);
        }
        Ok(())
    }

    /// Gracefully stops every process and abandons pending respawns.
    ///
    /// Returns immediately; the watcher reaches [`WatcherState::Stopped`]
    /// on a later tick once every process has been reaped.
    pub fn stop(&mut self) {
        if matches!(self.state, WatcherState::Stopped | WatcherState::Stopping) {
            return;
        }
        let now = self.deps.clock.now();
        self.set_state(WatcherState::Stopping);
        self.restart_queue.clear();
        for slot in std::mem::take(&mut self.slots) {
            if let Some(process) = slot.process {
                self.retire(slot.wid, process, now);
            }
        }
        self.finish_stop_if_drained();
    }

    /// Replaces every process one slot at a time, spawning each replacement
    /// before stopping its predecessor. Clears flapping and failed slots.
    pub fn restart(&mut self, sockets: &SocketSet) -> Result<(), WatcherError> {
        match self.state {
            WatcherState::Stopped => return self.start(sockets),
            WatcherState::Stopping => {
                return Err(WatcherError::Stopping {
                    watcher: self.spec.name.clone(),
                });
            }
            _ => {}
        }
        self.inherited = self.resolve_sockets(sockets)?;
        let now = self.deps.clock.now();
        self.begin_rolling(now);
        Ok(())
    }

    /// Applies a new definition, resizing the pool and rolling live
    /// processes onto it. A stopped watcher only records the definition.
    pub fn reconfigure(
        &mut self,
        spec: WatcherSpec,
        sockets: &SocketSet,
    ) -> Result<(), WatcherError> {
        let count = spec.numprocesses;
        self.spec = spec;
        if matches!(self.state, WatcherState::Stopped | WatcherState::Stopping) {
            return Ok(());
        }
        self.inherited = self.resolve_sockets(sockets)?;
        self.set_numprocesses(count);
        let now = self.deps.clock.now();
        self.begin_rolling(now);
        Ok(())
    }

    /// Resizes the pool. Growth spawns new slots immediately; shrinking
    /// retires the highest slots gracefully.
    pub fn set_numprocesses(&mut self, count: usize) -> usize {
        self.spec.numprocesses = count;
        if matches!(self.state, WatcherState::Stopped | WatcherState::Stopping) {
            return count;
        }
        let now = self.deps.clock.now();
        while self.slots.len() < count {
            let index = self.slots.len();
            self.slots.push(Slot::new(index));
            self.spawn_into(index, now);
        }
        while self.slots.len() > count {
            if let Some(slot) = self.slots.pop()
                && let Some(process) = slot.process
            {
                self.retire(slot.wid, process, now);
            }
        }
        info!(
            target: WATCHER_TARGET,
            watcher = %self.spec.name,
            numprocesses = count,
            "watcher resized"
        );
        count
    }

    /// Adds `by` processes.
    pub fn incr(&mut self, by: usize) -> usize {
        self.set_numprocesses(self.spec.numprocesses.saturating_add(by))
    }

    /// Removes up to `by` processes.
    pub fn decr(&mut self, by: usize) -> usize {
        self.set_numprocesses(self.spec.numprocesses.saturating_sub(by))
    }

    /// Runs one supervision step: consume exits, escalate expired grace
    /// periods, refill due slots, advance rolling restarts.
    pub fn tick(&mut self) {
        let now = self.deps.clock.now();
        while let Ok(event) = self.exits_rx.try_recv() {
            self.handle_exit(event, now);
        }
        self.escalate(now);
        match self.state {
            WatcherState::Stopped => {}
            WatcherState::Stopping => self.finish_stop_if_drained(),
            _ => {
                self.respawn_due(now);
                self.advance_rolling(now);
                self.check_started(now);
            }
        }
    }

    /// Point-in-time status.
    #[must_use]
    pub fn status(&self) -> WatcherStatus {
        let now = self.deps.clock.now();
        let info = |wid: usize, process: &dyn ProcessHandle, retiring: bool| ProcessInfo {
            wid,
            pid: process.pid(),
            status: process.status(),
            age_ms: u64::try_from(process.age(now).as_millis()).unwrap_or(u64::MAX),
            retiring,
        };
        let mut processes: Vec<_> = self
            .slots
            .iter()
            .filter_map(|slot| {
                slot.process
                    .as_deref()
                    .map(|process| info(slot.wid, process, false))
            })
            .collect();
        processes.extend(
            self.retiring
                .iter()
                .map(|retiring| info(retiring.wid, retiring.process.as_ref(), true)),
        );
        let degraded_slots: Vec<_> = self
            .slots
            .iter()
            .filter(|slot| slot.health != SlotHealth::Active)
            .map(|slot| SlotReport {
                wid: slot.wid,
                health: slot.health.clone(),
            })
            .collect();
        WatcherStatus {
            name: self.spec.name.clone(),
            state: self.state,
            health: if degraded_slots.is_empty() {
                WatcherHealth::Healthy
            } else {
                WatcherHealth::Degraded
            },
            numprocesses: self.spec.numprocesses,
            live: self.live_count(),
            processes,
            degraded_slots,
        }
    }

    fn resolve_sockets(&self, sockets: &SocketSet) -> Result<Vec<InheritedSocket>, WatcherError> {
        sockets
            .inherited(&self.spec.sockets)
            .map_err(|source| match source {
                SocketError::NotFound { name } => WatcherError::UnknownSocket {
                    watcher: self.spec.name.clone(),
                    socket: name,
                },
                source => WatcherError::Socket {
                    watcher: self.spec.name.clone(),
                    source,
                },
            })
    }

    fn set_state(&mut self, to: WatcherState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        info!(
            target: WATCHER_TARGET,
            watcher = %self.spec.name,
            from = %from,
            to = %to,
            "watcher state changed"
        );
        self.deps.events.emit(SupervisorEvent::WatcherStateChanged {
            watcher: self.spec.name.clone(),
            from,
            to,
        });
    }

    fn resume(&mut self, now: Instant) {
        for slot in &mut self.slots {
            slot.clear_health(now);
        }
    }

    fn launch(&self, wid: usize, now: Instant) -> Result<Box<dyn ProcessHandle>, SpawnError> {
        let spec = LaunchSpec {
            watcher: self.spec.name.clone(),
            wid,
            cmd: self.spec.cmd.clone(),
            args: self
                .spec
                .args
                .iter()
                .map(|arg| template::expand_arg(arg, wid, &self.inherited))
                .collect(),
            env: template::child_env(&self.spec.env, &self.spec.name, wid, &self.inherited),
            working_dir: self.spec.working_dir.clone(),
            sockets: self.inherited.clone(),
            started_at: now,
        };
        let process = self.deps.launcher.launch(&spec)?;
        self.deps.reaper.track(process.pid(), self.exits_tx.clone());
        self.deps.events.emit(SupervisorEvent::ProcessSpawned {
            watcher: self.spec.name.clone(),
            wid,
            pid: process.pid(),
        });
        Ok(process)
    }

    /// Launches with bounded immediate retries. The last error is returned
    /// after every attempt failed and the failure has been reported.
    fn launch_with_retries(
        &self,
        wid: usize,
        now: Instant,
    ) -> Result<Box<dyn ProcessHandle>, String> {
        let attempts = self.spec.max_spawn_attempts;
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.launch(wid, now) {
                Ok(process) => return Ok(process),
                Err(error) => {
                    warn!(
                        target: WATCHER_TARGET,
                        watcher = %self.spec.name,
                        wid,
                        attempt,
                        error = %error,
                        "spawn attempt failed"
                    );
                    last_error = error.to_string();
                }
            }
        }
        self.deps.events.emit(SupervisorEvent::SpawnFailed {
            watcher: self.spec.name.clone(),
            wid,
            attempts,
            message: last_error.clone(),
        });
        Err(last_error)
    }

    fn spawn_into(&mut self, index: usize, now: Instant) {
        let Some(wid) = self.slots.get(index).map(|slot| slot.wid) else {
            return;
        };
        let outcome = self.launch_with_retries(wid, now);
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        slot.respawn_at = None;
        match outcome {
            Ok(process) => slot.process = Some(process),
            Err(message) => slot.health = SlotHealth::Failed { message },
        }
    }

    fn retire(&mut self, wid: usize, mut process: Box<dyn ProcessHandle>, now: Instant) {
        if let Err(error) = process.stop(self.spec.stop_signal, self.spec.stop_children) {
            warn!(
                target: WATCHER_TARGET,
                watcher = %self.spec.name,
                wid,
                pid = process.pid(),
                error = %error,
                "failed to deliver stop signal"
            );
        }
        self.retiring.push(Retiring {
            wid,
            process,
            deadline: now + self.spec.graceful_timeout,
            killed: false,
        });
    }

    fn handle_exit(&mut self, event: ExitEvent, now: Instant) {
        let ExitEvent { pid, exit } = event;
        if let Some(position) = self
            .retiring
            .iter()
            .position(|retiring| retiring.process.pid() == pid)
        {
            let mut retiring = self.retiring.swap_remove(position);
            retiring.process.mark_exited(exit);
            self.deps.events.emit(SupervisorEvent::ProcessExited {
                watcher: self.spec.name.clone(),
                wid: retiring.wid,
                pid,
                exit,
                expected: true,
            });
            return;
        }

        let Some(slot) = self.slots.iter_mut().find(|slot| {
            slot.process
                .as_ref()
                .is_some_and(|process| process.pid() == pid)
        }) else {
            debug!(
                target: WATCHER_TARGET,
                watcher = %self.spec.name,
                pid,
                "exit for untracked pid ignored"
            );
            return;
        };
        let wid = slot.wid;
        if let Some(mut process) = slot.process.take() {
            process.mark_exited(exit);
        }
        self.deps.events.emit(SupervisorEvent::ProcessExited {
            watcher: self.spec.name.clone(),
            wid,
            pid,
            exit,
            expected: false,
        });
        if !self.spec.respawn {
            return;
        }
        let exits = self.spec.flapping.record(&mut slot.exits, now);
        if self.spec.flapping.is_flapping(exits) {
            slot.health = SlotHealth::Flapping;
            slot.respawn_at = None;
            self.deps.events.emit(SupervisorEvent::WatcherFlapping {
                watcher: self.spec.name.clone(),
                wid,
                exits,
                window_ms: u64::try_from(self.spec.flapping.window.as_millis())
                    .unwrap_or(u64::MAX),
            });
            return;
        }
        let attempt = u32::try_from(exits.saturating_sub(1)).unwrap_or(u32::MAX);
        slot.respawn_at = Some(now + self.spec.backoff.next(attempt));
    }

    fn escalate(&mut self, now: Instant) {
        let signal = self.spec.kill_signal;
        let include_children = self.spec.stop_children;
        let mut killed = Vec::new();
        for retiring in &mut self.retiring {
            if retiring.killed || now < retiring.deadline || !retiring.process.is_alive() {
                continue;
            }
            retiring.killed = true;
            if let Err(error) = retiring.process.kill(signal, include_children) {
                warn!(
                    target: WATCHER_TARGET,
                    watcher = %self.spec.name,
                    pid = retiring.process.pid(),
                    error = %error,
                    "failed to deliver kill signal"
                );
            }
            killed.push((retiring.wid, retiring.process.pid()));
        }
        for (wid, pid) in killed {
            self.deps.events.emit(SupervisorEvent::ProcessKilled {
                watcher: self.spec.name.clone(),
                wid,
                pid,
                signal: format!("{signal:?}"),
                graceful_timeout_ms: self.spec.graceful_timeout_ms(),
            });
        }
    }

    fn respawn_due(&mut self, now: Instant) {
        for index in 0..self.slots.len() {
            let due = self.slots.get(index).is_some_and(|slot| {
                slot.process.is_none()
                    && slot.health == SlotHealth::Active
                    && slot.respawn_at.is_some_and(|at| at <= now)
            });
            if due {
                self.spawn_into(index, now);
            }
        }
    }

    fn begin_rolling(&mut self, now: Instant) {
        for slot in &mut self.slots {
            slot.clear_health(now);
        }
        self.restart_queue = self.slots.iter().map(|slot| slot.wid).collect();
        self.set_state(WatcherState::Restarting);
        self.advance_rolling(now);
    }

    /// Swaps the next queued slot once the previous swap has drained.
    fn advance_rolling(&mut self, now: Instant) {
        if self.state != WatcherState::Restarting {
            return;
        }
        while self.retiring.is_empty() {
            let Some(wid) = self.restart_queue.pop_front() else {
                break;
            };
            let Some(index) = self.slots.iter().position(|slot| slot.wid == wid) else {
                continue;
            };
            let has_process = self
                .slots
                .get(index)
                .is_some_and(|slot| slot.process.is_some());
            if !has_process {
                self.spawn_into(index, now);
                continue;
            }
            match self.launch_with_retries(wid, now) {
                Ok(replacement) => {
                    let previous = self
                        .slots
                        .get_mut(index)
                        .and_then(|slot| slot.process.replace(replacement));
                    if let Some(previous) = previous {
                        self.retire(wid, previous, now);
                    }
                }
                Err(message) => {
                    warn!(
                        target: WATCHER_TARGET,
                        watcher = %self.spec.name,
                        wid,
                        message = %message,
                        "replacement failed; keeping current process"
                    );
                    if let Some(slot) = self.slots.get_mut(index) {
                        slot.health = SlotHealth::Failed { message };
                    }
                }
            }
        }
        if self.restart_queue.is_empty() && self.retiring.is_empty() {
            self.set_state(WatcherState::Starting);
        }
    }

    fn check_started(&mut self, now: Instant) {
        if self.state != WatcherState::Starting {
            return;
        }
        let min_uptime = self.spec.min_uptime;
        let settled = self.slots.iter().all(|slot| match &slot.process {
            Some(process) => process.is_alive() && process.age(now) >= min_uptime,
            None => slot.health != SlotHealth::Active || slot.respawn_at.is_none(),
        });
        if settled {
            self.set_state(WatcherState::Running);
        }
    }

    fn finish_stop_if_drained(&mut self) {
        if self.state == WatcherState::Stopping && self.retiring.is_empty() && self.slots.is_empty()
        {
            self.set_state(WatcherState::Stopped);
        }
    }
}
