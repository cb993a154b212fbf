//! Test harness shared by the supervisor suites.

mod config_loader;
mod daemon;
mod listener;
mod reporter;
mod simulated;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use daemon::{ScriptedSignals, Step, TestDaemonizer};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use simulated::SimulatedSupervisor;
