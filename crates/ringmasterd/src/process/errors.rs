//! Error types for spawning and signalling supervised processes.

use std::io;

use camino::Utf8PathBuf;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

/// A process could not be started.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The configured working directory is not usable.
    #[error("working directory '{path}' is not usable: {source}")]
    WorkingDirectory {
        /// Configured directory.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Executing the command failed.
    #[error("failed to execute '{cmd}': {source}")]
    Exec {
        /// Program that failed to start.
        cmd: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// A signal could not be delivered to a live process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// `kill(2)` failed for a reason other than the process being gone.
    #[error("failed to send {signal:?} to process {pid}: {source}")]
    Signal {
        /// Target process.
        pid: u32,
        /// Signal that was not delivered.
        signal: Signal,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
}
