//! Declarative watcher definitions read from the supervision manifest.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_BACKOFF_FIRST_MS, DEFAULT_BACKOFF_MAX_MS,
    DEFAULT_FLAPPING_MAX_EXITS, DEFAULT_FLAPPING_WINDOW_MS, default_graceful_timeout_ms,
    default_kill_signal, default_max_spawn_attempts, default_min_uptime_ms,
    default_numprocesses, default_stop_signal, default_true,
};

/// A homogeneous pool of processes supervised under one name.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WatcherConfig {
    /// Unique key within the manifest.
    pub name: String,
    /// Program to execute.
    pub cmd: String,
    /// Arguments passed to the program; `$(sockets.NAME)` and `$(wid)` are
    /// expanded per process.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for spawned processes.
    #[serde(default)]
    pub working_dir: Option<Utf8PathBuf>,
    /// Extra environment variables for spawned processes.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Desired number of live processes.
    #[serde(default = "default_numprocesses")]
    pub numprocesses: usize,
    /// Grace period between the stop signal and forced termination.
    #[serde(default = "default_graceful_timeout_ms")]
    pub graceful_timeout_ms: u64,
    /// Signal asking a process to exit.
    #[serde(default = "default_stop_signal")]
    pub stop_signal: String,
    /// Signal sent once the grace period expires.
    #[serde(default = "default_kill_signal")]
    pub kill_signal: String,
    /// Also signals descendants of each process when stopping it.
    #[serde(default)]
    pub stop_children: bool,
    /// Names of sockets whose descriptors are inherited.
    #[serde(default)]
    pub sockets: Vec<String>,
    /// Starts the watcher together with the arbiter.
    #[serde(default = "default_true")]
    pub autostart: bool,
    /// Replaces processes that exit unexpectedly.
    #[serde(default = "default_true")]
    pub respawn: bool,
    /// Time every process must stay alive before the watcher reports running.
    #[serde(default = "default_min_uptime_ms")]
    pub min_uptime_ms: u64,
    /// Immediate spawn attempts per slot before the slot is marked failed.
    #[serde(default = "default_max_spawn_attempts")]
    pub max_spawn_attempts: u32,
    /// Exit-rate threshold that pauses a slot.
    #[serde(default)]
    pub flapping: FlappingConfig,
    /// Respawn delay schedule.
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl WatcherConfig {
    /// Declares a watcher running `cmd` with default options.
    #[must_use]
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
            numprocesses: default_numprocesses(),
            graceful_timeout_ms: default_graceful_timeout_ms(),
            stop_signal: default_stop_signal(),
            kill_signal: default_kill_signal(),
            stop_children: false,
            sockets: Vec::new(),
            autostart: true,
            respawn: true,
            min_uptime_ms: default_min_uptime_ms(),
            max_spawn_attempts: default_max_spawn_attempts(),
            flapping: FlappingConfig::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Rolling window used to detect a slot that keeps dying.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct FlappingConfig {
    /// Exits tolerated inside the window; one more pauses the slot.
    pub max_exits: usize,
    /// Window width in milliseconds.
    pub window_ms: u64,
}

impl Default for FlappingConfig {
    fn default() -> Self {
        Self {
            max_exits: DEFAULT_FLAPPING_MAX_EXITS,
            window_ms: DEFAULT_FLAPPING_WINDOW_MS,
        }
    }
}

/// Exponential respawn delay: `first_ms * factor^n`, capped at `max_ms`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct BackoffConfig {
    /// Delay before the first respawn of a window.
    pub first_ms: u64,
    /// Delay ceiling.
    pub max_ms: u64,
    /// Growth factor per additional exit.
    pub factor: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            first_ms: DEFAULT_BACKOFF_FIRST_MS,
            max_ms: DEFAULT_BACKOFF_MAX_MS,
            factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}
