//! Capability set shared by every supervised process handle.

use std::fmt;
use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use serde::Serialize;
use strum::Display;

use super::errors::ProcessError;

/// Lifecycle of a supervised process as seen by its watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessStatus {
    /// Alive and not asked to stop.
    Running,
    /// Alive and asked to stop.
    Stopping,
    /// Exited after being asked to stop.
    Stopped,
    /// Exited on its own.
    Exited,
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ProcessExit {
    /// Normal exit with a status code.
    Code(i32),
    /// Terminated by a signal number.
    Signal(i32),
    /// Reaped elsewhere; the status was lost.
    Unknown,
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(formatter, "exit code {code}"),
            Self::Signal(signal) => write!(formatter, "signal {signal}"),
            Self::Unknown => formatter.write_str("unknown status"),
        }
    }
}

/// One spawned OS process owned by a watcher.
///
/// Watchers depend only on this trait, so real processes and the simulated
/// host are interchangeable. Exit notification does not come from the handle
/// itself: the reaper posts an exit event and the watcher calls
/// [`ProcessHandle::mark_exited`].
pub trait ProcessHandle: Send + fmt::Debug {
    /// OS process id; meaningful only while the process is alive.
    fn pid(&self) -> u32;

    /// Current lifecycle status.
    fn status(&self) -> ProcessStatus;

    /// Monotonic spawn instant.
    fn started_at(&self) -> Instant;

    /// Exit status once reaped.
    fn returncode(&self) -> Option<ProcessExit>;

    /// Descendant process ids, where the platform lets us find them.
    fn children(&self) -> Vec<u32>;

    /// Sends the graceful stop signal and marks the handle as stopping.
    fn stop(&mut self, signal: Signal, include_children: bool) -> Result<(), ProcessError>;

    /// Sends the escalation signal.
    fn kill(&mut self, signal: Signal, include_children: bool) -> Result<(), ProcessError>;

    /// Records the reaped exit status. Only the first call has any effect.
    fn mark_exited(&mut self, exit: ProcessExit);

    /// True while the process is running or stopping.
    fn is_alive(&self) -> bool {
        matches!(
            self.status(),
            ProcessStatus::Running | ProcessStatus::Stopping
        )
    }

    /// Time since spawn.
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at())
    }
}

/// Bookkeeping common to every handle implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pid: u32,
    started_at: Instant,
    status: ProcessStatus,
    returncode: Option<ProcessExit>,
}

impl ProcessRecord {
    /// Starts a record for a freshly spawned process.
    #[must_use]
    pub const fn new(pid: u32, started_at: Instant) -> Self {
        Self {
            pid,
            started_at,
            status: ProcessStatus::Running,
            returncode: None,
        }
    }

    /// Process id.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Spawn instant.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ProcessStatus {
        self.status
    }

    /// Exit status once recorded.
    #[must_use]
    pub const fn returncode(&self) -> Option<ProcessExit> {
        self.returncode
    }

    /// True while running or stopping.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        matches!(
            self.status,
            ProcessStatus::Running | ProcessStatus::Stopping
        )
    }

    /// Moves a running process to stopping.
    pub fn begin_stop(&mut self) {
        if self.status == ProcessStatus::Running {
            self.status = ProcessStatus::Stopping;
        }
    }

    /// Records the exit. Returns false when an exit was already recorded.
    pub fn record_exit(&mut self, exit: ProcessExit) -> bool {
        if self.returncode.is_some() {
            return false;
        }
        self.returncode = Some(exit);
        self.status = if self.status == ProcessStatus::Stopping {
            ProcessStatus::Stopped
        } else {
            ProcessStatus::Exited
        };
        true
    }
}
