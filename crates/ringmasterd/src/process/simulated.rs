//! In-memory process host for deterministic supervision tests.
//!
//! Processes never exist at the OS level. Each launch allocates a pid in a
//! shared table; signals and external deaths flip entries in that table and
//! the matching [`SimulatedWait`] reports them to the reaper.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use nix::sys::signal::Signal;

use super::errors::{ProcessError, SpawnError};
use super::handle::{ProcessExit, ProcessHandle, ProcessRecord, ProcessStatus};
use super::launcher::{LaunchSpec, ProcessLauncher};
use super::reaper::{WaitOutcome, WaitSource};

const FIRST_PID: u32 = 10_000;

/// One recorded launch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRecord {
    /// Pid handed out, or `None` when the launch was made to fail.
    pub pid: Option<u32>,
    /// Exact request the launcher received.
    pub spec: LaunchSpec,
}

#[derive(Debug, Clone)]
struct Entry {
    watcher: String,
    alive: bool,
    exit: Option<ProcessExit>,
    reaped: bool,
    signals: Vec<Signal>,
}

#[derive(Debug)]
struct HostState {
    next_pid: u32,
    processes: BTreeMap<u32, Entry>,
    launches: Vec<LaunchRecord>,
    spawn_failures: u32,
    ignore_graceful: bool,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            next_pid: FIRST_PID,
            processes: BTreeMap::new(),
            launches: Vec::new(),
            spawn_failures: 0,
            ignore_graceful: false,
        }
    }
}

impl HostState {
    fn terminate(&mut self, pid: u32, exit: ProcessExit) -> bool {
        match self.processes.get_mut(&pid) {
            Some(entry) if entry.alive => {
                entry.alive = false;
                entry.exit = Some(exit);
                true
            }
            _ => false,
        }
    }
}

/// Shared fake process table.
#[derive(Debug, Clone, Default)]
pub struct SimulatedHost {
    state: Arc<Mutex<HostState>>,
}

impl SimulatedHost {
    /// Builds an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Launcher that spawns into this host.
    #[must_use]
    pub fn launcher(&self) -> SimulatedLauncher {
        SimulatedLauncher { host: self.clone() }
    }

    /// Wait source that reports this host's exits.
    #[must_use]
    pub fn wait_source(&self) -> SimulatedWait {
        SimulatedWait { host: self.clone() }
    }

    /// Makes the next `count` launches fail.
    pub fn fail_next_spawns(&self, count: u32) {
        self.lock().spawn_failures = count;
    }

    /// When set, graceful stop signals are recorded but ignored.
    pub fn ignore_graceful_signals(&self, ignore: bool) {
        self.lock().ignore_graceful = ignore;
    }

    /// Ends a process from outside the supervisor, as a crash would.
    pub fn kill(&self, pid: u32, exit: ProcessExit) -> bool {
        self.lock().terminate(pid, exit)
    }

    /// Live pids in spawn order.
    #[must_use]
    pub fn live_pids(&self) -> Vec<u32> {
        self.lock()
            .processes
            .iter()
            .filter(|(_, entry)| entry.alive)
            .map(|(pid, _)| *pid)
            .collect()
    }

    /// Live pids belonging to one watcher.
    #[must_use]
    pub fn live_pids_for(&self, watcher: &str) -> Vec<u32> {
        self.lock()
            .processes
            .iter()
            .filter(|(_, entry)| entry.alive && entry.watcher == watcher)
            .map(|(pid, _)| *pid)
            .collect()
    }

    /// Returns true while `pid` is alive.
    #[must_use]
    pub fn is_alive(&self, pid: u32) -> bool {
        self.lock()
            .processes
            .get(&pid)
            .is_some_and(|entry| entry.alive)
    }

    /// Signals delivered to `pid`, in order.
    #[must_use]
    pub fn signals(&self, pid: u32) -> Vec<Signal> {
        self.lock()
            .processes
            .get(&pid)
            .map(|entry| entry.signals.clone())
            .unwrap_or_default()
    }

    /// Every launch attempt so far.
    #[must_use]
    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.lock().launches.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Launcher half of a [`SimulatedHost`].
#[derive(Debug, Clone)]
pub struct SimulatedLauncher {
    host: SimulatedHost,
}

impl ProcessLauncher for SimulatedLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ProcessHandle>, SpawnError> {
        let mut state = self.host.lock();
        if state.spawn_failures > 0 {
            state.spawn_failures -= 1;
            state.launches.push(LaunchRecord {
                pid: None,
                spec: spec.clone(),
            });
            return Err(SpawnError::Exec {
                cmd: spec.cmd.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "simulated spawn failure"),
            });
        }
        let pid = state.next_pid;
        state.next_pid += 1;
        state.processes.insert(
            pid,
            Entry {
                watcher: spec.watcher.clone(),
                alive: true,
                exit: None,
                reaped: false,
                signals: Vec::new(),
            },
        );
        state.launches.push(LaunchRecord {
            pid: Some(pid),
            spec: spec.clone(),
        });
        Ok(Box::new(SimulatedProcess {
            record: ProcessRecord::new(pid, spec.started_at),
            host: self.host.clone(),
        }))
    }
}

/// Wait-source half of a [`SimulatedHost`].
#[derive(Debug, Clone)]
pub struct SimulatedWait {
    host: SimulatedHost,
}

impl WaitSource for SimulatedWait {
    fn try_wait(&self, pid: u32) -> WaitOutcome {
        let mut state = self.host.lock();
        match state.processes.get_mut(&pid) {
            None => WaitOutcome::Gone,
            Some(entry) if entry.alive => WaitOutcome::Running,
            Some(entry) if !entry.reaped => {
                entry.reaped = true;
                WaitOutcome::Exited(entry.exit.unwrap_or(ProcessExit::Unknown))
            }
            Some(_) => WaitOutcome::Gone,
        }
    }
}

/// Handle to a process in a [`SimulatedHost`].
#[derive(Debug)]
pub struct SimulatedProcess {
    record: ProcessRecord,
    host: SimulatedHost,
}

impl SimulatedProcess {
    fn deliver(&self, signal: Signal, graceful: bool) {
        let mut state = self.host.lock();
        let ignore = graceful && state.ignore_graceful;
        let pid = self.record.pid();
        let Some(entry) = state.processes.get_mut(&pid) else {
            return;
        };
        entry.signals.push(signal);
        if !ignore {
            state.terminate(pid, ProcessExit::Signal(signal as i32));
        }
    }
}

impl ProcessHandle for SimulatedProcess {
    fn pid(&self) -> u32 {
        self.record.pid()
    }

    fn status(&self) -> ProcessStatus {
        self.record.status()
    }

    fn started_at(&self) -> Instant {
        self.record.started_at()
    }

    fn returncode(&self) -> Option<ProcessExit> {
        self.record.returncode()
    }

    fn children(&self) -> Vec<u32> {
        Vec::new()
    }

    fn stop(&mut self, signal: Signal, _include_children: bool) -> Result<(), ProcessError> {
        if self.record.is_alive() {
            self.deliver(signal, signal != Signal::SIGKILL);
            self.record.begin_stop();
        }
        Ok(())
    }

    fn kill(&mut self, signal: Signal, _include_children: bool) -> Result<(), ProcessError> {
        if self.record.is_alive() {
            self.deliver(signal, false);
        }
        Ok(())
    }

    fn mark_exited(&mut self, exit: ProcessExit) {
        self.record.record_exit(exit);
    }
}
