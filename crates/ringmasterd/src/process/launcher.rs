//! Spawning worker processes with inherited socket descriptors.

use std::collections::BTreeMap;
use std::io;
use std::os::fd::RawFd;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::time::Instant;

use camino::Utf8PathBuf;
use tracing::debug;

use super::PROCESS_TARGET;
use super::errors::SpawnError;
use super::handle::ProcessHandle;
use super::system::SystemProcess;
use crate::descriptor;
use crate::sockets::InheritedSocket;

/// Everything needed to start one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Owning watcher.
    pub watcher: String,
    /// Worker slot within the watcher.
    pub wid: usize,
    /// Program to execute.
    pub cmd: String,
    /// Arguments after template expansion.
    pub args: Vec<String>,
    /// Extra environment, layered over the supervisor's own.
    pub env: BTreeMap<String, String>,
    /// Directory to run in.
    pub working_dir: Option<Utf8PathBuf>,
    /// Descriptors the child must inherit.
    pub sockets: Vec<InheritedSocket>,
    /// Spawn instant recorded on the handle.
    pub started_at: Instant,
}

/// Starts processes on behalf of watchers.
pub trait ProcessLauncher: Send + Sync {
    /// Starts one process described by `spec`.
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ProcessHandle>, SpawnError>;
}

/// Launcher backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ProcessHandle>, SpawnError> {
        if let Some(dir) = &spec.working_dir
            && !dir.is_dir()
        {
            return Err(SpawnError::WorkingDirectory {
                path: dir.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "not a directory"),
            });
        }

        let mut command = Command::new(&spec.cmd);
        command.args(&spec.args).envs(&spec.env).stdin(Stdio::null());
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }
        let descriptors: Vec<RawFd> = spec.sockets.iter().map(|socket| socket.fd).collect();
        // SAFETY: the hook only issues fcntl calls, which are
        // async-signal-safe, and it does not allocate.
        unsafe {
            command.pre_exec(move || {
                for fd in &descriptors {
                    descriptor::set_inheritable(*fd, true)?;
                }
                Ok(())
            });
        }

        let child = command.spawn().map_err(|source| SpawnError::Exec {
            cmd: spec.cmd.clone(),
            source,
        })?;
        let pid = child.id();
        debug!(
            target: PROCESS_TARGET,
            watcher = %spec.watcher,
            wid = spec.wid,
            pid,
            "process launched"
        );
        // Exit status is collected by the reaper, not through `Child`.
        drop(child);
        Ok(Box::new(SystemProcess::new(pid, spec.started_at)))
    }
}
