//! Handles for real OS processes.

use std::collections::HashMap;
use std::fs;
use std::time::Instant;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::debug;

use super::PROCESS_TARGET;
use super::errors::ProcessError;
use super::handle::{ProcessExit, ProcessHandle, ProcessRecord, ProcessStatus};

/// A child spawned by [`super::SystemLauncher`].
#[derive(Debug)]
pub struct SystemProcess {
    record: ProcessRecord,
}

impl SystemProcess {
    /// Wraps a freshly spawned pid.
    #[must_use]
    pub const fn new(pid: u32, started_at: Instant) -> Self {
        Self {
            record: ProcessRecord::new(pid, started_at),
        }
    }

    fn send(&self, signal: Signal, include_children: bool) -> Result<(), ProcessError> {
        if !self.record.is_alive() {
            return Ok(());
        }
        if include_children {
            for child in self.children() {
                deliver(child, signal)?;
            }
        }
        deliver(self.record.pid(), signal)
    }
}

impl ProcessHandle for SystemProcess {
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
        if !self.record.is_alive() {
            return Vec::new();
        }
        descendants(self.record.pid())
    }

    fn stop(&mut self, signal: Signal, include_children: bool) -> Result<(), ProcessError> {
        self.send(signal, include_children)?;
        self.record.begin_stop();
        Ok(())
    }

    fn kill(&mut self, signal: Signal, include_children: bool) -> Result<(), ProcessError> {
        self.send(signal, include_children)
    }

    fn mark_exited(&mut self, exit: ProcessExit) {
        self.record.record_exit(exit);
    }
}

/// Sends `signal` to `pid`, treating an already-dead target as success.
fn deliver(pid: u32, signal: Signal) -> Result<(), ProcessError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(());
    };
    match kill(Pid::from_raw(raw), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(source) => Err(ProcessError::Signal {
            pid,
            signal,
            source,
        }),
    }
}

/// Every transitive child of `root`, from one scan of `/proc`.
fn descendants(root: u32) -> Vec<u32> {
    let parents = match process_table() {
        Ok(parents) => parents,
        Err(error) => {
            debug!(target: PROCESS_TARGET, error = %error, "process table unavailable");
            return Vec::new();
        }
    };
    let mut by_parent: HashMap<u32, Vec<u32>> = HashMap::new();
    for (pid, ppid) in parents {
        by_parent.entry(ppid).or_default().push(pid);
    }
    let mut found = Vec::new();
    let mut pending = vec![root];
    while let Some(parent) = pending.pop() {
        if let Some(children) = by_parent.get(&parent) {
            for child in children {
                found.push(*child);
                pending.push(*child);
            }
        }
    }
    found
}

fn process_table() -> std::io::Result<Vec<(u32, u32)>> {
    let mut table = Vec::new();
    for entry in fs::read_dir("/proc")? {
        let entry = entry?;
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };
        // Processes can vanish between listing and reading.
        let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        if let Some(ppid) = parent_pid(&stat) {
            table.push((pid, ppid));
        }
    }
    Ok(table)
}

/// Parses the parent pid out of a `/proc/<pid>/stat` line.
///
/// The command name sits in parentheses and may itself contain spaces or
/// parentheses, so fields are counted from the last closing parenthesis.
fn parent_pid(stat: &str) -> Option<u32> {
    let (_, rest) = stat.rsplit_once(')')?;
    let mut fields = rest.split_whitespace();
    let _state = fields.next()?;
    fields.next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("123 (sleep) S 45 123 123 0", Some(45))]
    #[case("9 (odd) name)) R 1 9 9 0", Some(1))]
    #[case("garbage", None)]
    fn parses_parent_pid(#[case] stat: &str, #[case] expected: Option<u32>) {
        assert_eq!(parent_pid(stat), expected);
    }

    #[test]
    fn exited_process_ignores_signals() {
        let mut process = SystemProcess::new(u32::MAX, Instant::now());
        process.mark_exited(ProcessExit::Code(0));
        process
            .kill(Signal::SIGKILL, true)
            .expect("signal to exited process is a no-op");
        assert!(process.children().is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn finds_children_of_the_current_process() {
        let mut child = std::process::Command::new("sleep")
            .arg("5")
            .spawn()
            .expect("spawn sleep");
        let found = descendants(std::process::id());
        let _ = child.kill();
        let _ = child.wait();
        assert!(found.contains(&child.id()));
    }
}
