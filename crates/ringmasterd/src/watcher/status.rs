//! Watcher lifecycle states and status snapshots.

use serde::Serialize;
use strum::Display;

use crate::process::ProcessStatus;

/// Lifecycle of a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WatcherState {
    /// No processes.
    Stopped,
    /// Processes spawned, waiting for them to stay up past the minimum uptime.
    Starting,
    /// Steady state.
    Running,
    /// Rolling replacement of every slot in progress.
    Restarting,
    /// Graceful stop in progress.
    Stopping,
}

/// Supervision state of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "health", rename_all = "snake_case")]
pub enum SlotHealth {
    /// Supervised normally.
    Active,
    /// Exited too often; respawn paused until an explicit restart.
    Flapping,
    /// Spawn attempts exhausted.
    Failed {
        /// Last spawn error.
        message: String,
    },
}

/// Overall verdict for a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WatcherHealth {
    /// Every slot is supervised normally.
    Healthy,
    /// At least one slot is flapping or failed.
    Degraded,
}

/// One live or retiring process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    /// Slot number.
    pub wid: usize,
    /// OS pid.
    pub pid: u32,
    /// Lifecycle status.
    pub status: ProcessStatus,
    /// Milliseconds since spawn.
    pub age_ms: u64,
    /// True when the process is being replaced or scaled away.
    pub retiring: bool,
}

/// One slot that needs operator attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReport {
    /// Slot number.
    pub wid: usize,
    /// Why the slot is paused.
    #[serde(flatten)]
    pub health: SlotHealth,
}

/// Point-in-time view of a watcher, served to the command surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatcherStatus {
    /// Watcher name.
    pub name: String,
    /// Lifecycle state.
    pub state: WatcherState,
    /// Overall health.
    pub health: WatcherHealth,
    /// Desired process count.
    pub numprocesses: usize,
    /// Processes currently alive, retiring ones included.
    pub live: usize,
    /// Every tracked process.
    pub processes: Vec<ProcessInfo>,
    /// Slots that are flapping or failed.
    pub degraded_slots: Vec<SlotReport>,
}
