//! Host process for the arbiter: lock files, daemonisation, and signals.

mod daemonizer;
mod errors;
mod files;
mod guard;
pub(crate) mod launch;
mod signals;

pub use daemonizer::{DaemonizeError, Daemonizer, SystemDaemonizer};
pub use errors::{LaunchError, ReloadError};
pub use launch::{LaunchMode, run_daemon};
pub use signals::{ControlSignal, ControlSignals, SignalError, SystemControlSignals};

pub(crate) const DAEMON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::daemon");
pub(crate) const FOREGROUND_ENV_VAR: &str = "RINGMASTER_FOREGROUND";
