//! Process supervisor for pools of long-running workers.
//!
//! The supervisor binds listening sockets once and hands their descriptors to
//! every generation of the workers it runs, so a worker can be restarted or
//! replaced without the socket ever closing. Three layers build on each
//! other:
//!
//! - [`sockets`] owns the pre-bound descriptors ([`Socket`], [`SocketSet`]).
//! - [`watcher`] keeps a pool of identical processes alive ([`Watcher`]),
//!   with exponential backoff between respawns, per-slot flapping detection,
//!   graceful stop with escalation to a kill, and rolling restarts.
//! - [`arbiter`] owns one socket set and many watchers, drives them from a
//!   single health-check tick, and serves the command surface
//!   ([`Arbiter::handle_command`]) and event subscription
//!   ([`Arbiter::on_event`]).
//!
//! Everything is single-threaded and deadline driven. Processes are started
//! through a [`ProcessLauncher`] and reaped through a shared [`Reaper`]; time
//! comes from a [`Clock`]. Swapping those three collaborators for the
//! simulated host (behind the `test-support` feature) makes every state
//! machine deterministic under test.
//!
//! ## Daemon runtime
//!
//! [`run_daemon`] hosts an arbiter in a real process: it loads
//! [`ringmaster_config::Config`] through `ortho_config`, initialises
//! structured telemetry, takes the runtime lock, optionally daemonises,
//! publishes pid and health files, and then runs the control loop. `SIGHUP`
//! reloads the manifest; `SIGTERM`, `SIGINT` and `SIGQUIT` stop gracefully.

pub mod arbiter;
mod bootstrap;
pub mod clock;
mod daemon;
mod descriptor;
mod errors;
pub mod events;
mod health;
pub mod process;
pub mod sockets;
mod telemetry;
pub mod watcher;

pub use arbiter::{
    Arbiter, ArbiterError, ArbiterState, ArbiterStatus, Command, CommandError, ReloadSummary,
};
pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use daemon::{
    ControlSignal, ControlSignals, DaemonizeError, Daemonizer, LaunchError, LaunchMode,
    ReloadError, SignalError, SystemControlSignals, SystemDaemonizer, run_daemon,
};
pub use errors::ConfigError;
pub use events::{EventBus, EventListener, StructuredEventLogger, SupervisorEvent};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{ProcessError, ProcessExit, ProcessHandle, ProcessLauncher, Reaper, SpawnError};
pub use sockets::{Socket, SocketError, SocketSet};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use watcher::{SupervisorDeps, Watcher, WatcherError, WatcherSpec, WatcherState};

#[cfg(test)]
mod tests;
