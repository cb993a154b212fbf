//! Supervised OS processes: spawning, signalling, and reaping.

mod errors;
mod handle;
mod launcher;
mod reaper;
#[cfg(any(test, feature = "test-support"))]
mod simulated;
mod system;

pub use errors::{ProcessError, SpawnError};
pub use handle::{ProcessExit, ProcessHandle, ProcessRecord, ProcessStatus};
pub use launcher::{LaunchSpec, ProcessLauncher, SystemLauncher};
pub use reaper::{ExitEvent, Reaper, SystemWait, WaitOutcome, WaitSource};
#[cfg(any(test, feature = "test-support"))]
pub use simulated::{
    LaunchRecord, SimulatedHost, SimulatedLauncher, SimulatedProcess, SimulatedWait,
};
pub use system::SystemProcess;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
