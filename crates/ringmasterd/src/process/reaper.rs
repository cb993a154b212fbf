//! Central child reaping.
//!
//! Exactly one component calls `waitpid`: the reaper polls every tracked pid
//! without blocking and forwards exit statuses to the watcher that spawned
//! the process, over that watcher's channel.

use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::{Mutex, PoisonError};

use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::debug;

use super::PROCESS_TARGET;
use super::handle::ProcessExit;

/// Exit notification delivered to a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitEvent {
    /// Reaped process.
    pub pid: u32,
    /// How it ended.
    pub exit: ProcessExit,
}

/// Result of polling one pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Still alive.
    Running,
    /// Exited and now reaped.
    Exited(ProcessExit),
    /// Not a child of ours any more; the status is lost.
    Gone,
}

/// Non-blocking exit status source.
pub trait WaitSource: Send + Sync {
    /// Polls `pid` once without blocking.
    fn try_wait(&self, pid: u32) -> WaitOutcome;
}

/// `waitpid(pid, WNOHANG)` against the real process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWait;

impl WaitSource for SystemWait {
    fn try_wait(&self, pid: u32) -> WaitOutcome {
        let Ok(raw) = i32::try_from(pid) else {
            return WaitOutcome::Gone;
        };
        match waitpid(Pid::from_raw(raw), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(_, code)) => WaitOutcome::Exited(ProcessExit::Code(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                WaitOutcome::Exited(ProcessExit::Signal(signal as i32))
            }
            Ok(_) | Err(Errno::EINTR) => WaitOutcome::Running,
            Err(_) => WaitOutcome::Gone,
        }
    }
}

/// Routes reaped exits to the watcher that owns each pid.
pub struct Reaper {
    source: Box<dyn WaitSource>,
    tracked: Mutex<HashMap<u32, Sender<ExitEvent>>>,
}

impl Reaper {
    /// Builds a reaper over an arbitrary wait source.
    pub fn new(source: impl WaitSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            tracked: Mutex::new(HashMap::new()),
        }
    }

    /// Builds a reaper over the real process table.
    #[must_use]
    pub fn system() -> Self {
        Self::new(SystemWait)
    }

    /// Starts tracking `pid`; its exit is sent to `sink`.
    pub fn track(&self, pid: u32, sink: Sender<ExitEvent>) {
        self.lock().insert(pid, sink);
    }

    /// Number of pids still awaiting an exit.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    /// Polls every tracked pid once and returns how many exits were routed.
    pub fn reap(&self) -> usize {
        let mut delivered = 0;
        self.lock().retain(|pid, sink| {
            let exit = match self.source.try_wait(*pid) {
                WaitOutcome::Running => return true,
                WaitOutcome::Exited(exit) => exit,
                WaitOutcome::Gone => ProcessExit::Unknown,
            };
            delivered += 1;
            if sink.send(ExitEvent { pid: *pid, exit }).is_err() {
                debug!(
                    target: PROCESS_TARGET,
                    pid = *pid,
                    "exit reaped for a watcher that no longer listens"
                );
            }
            false
        });
        delivered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, Sender<ExitEvent>>> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Reaper {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Reaper")
            .field("tracked", &self.tracked())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    struct Scripted(HashMap<u32, WaitOutcome>);

    impl WaitSource for Scripted {
        fn try_wait(&self, pid: u32) -> WaitOutcome {
            self.0.get(&pid).copied().unwrap_or(WaitOutcome::Running)
        }
    }

    #[test]
    fn routes_exits_and_keeps_running_pids() {
        let reaper = Reaper::new(Scripted(HashMap::from([
            (1, WaitOutcome::Exited(ProcessExit::Code(2))),
            (3, WaitOutcome::Gone),
        ])));
        let (sender, receiver) = mpsc::channel();
        for pid in [1, 2, 3] {
            reaper.track(pid, sender.clone());
        }

        assert_eq!(reaper.reap(), 2);

        let mut events: Vec<_> = receiver.try_iter().collect();
        events.sort_by_key(|event| event.pid);
        assert_eq!(
            events,
            [
                ExitEvent {
                    pid: 1,
                    exit: ProcessExit::Code(2)
                },
                ExitEvent {
                    pid: 3,
                    exit: ProcessExit::Unknown
                },
            ]
        );
        assert_eq!(reaper.tracked(), 1);
    }

    #[test]
    fn dropped_receiver_does_not_stall_reaping() {
        let reaper = Reaper::new(Scripted(HashMap::from([(
            9,
            WaitOutcome::Exited(ProcessExit::Signal(9)),
        )])));
        let (sender, receiver) = mpsc::channel();
        reaper.track(9, sender);
        drop(receiver);
        assert_eq!(reaper.reap(), 1);
        assert_eq!(reaper.tracked(), 0);
    }
}
