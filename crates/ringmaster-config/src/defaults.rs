use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::logging::LogFormat;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default manifest file name, resolved against the working directory.
pub const DEFAULT_MANIFEST_PATH: &str = "ringmaster.yaml";

/// Default period of the shared health-check tick, in milliseconds.
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 250;

/// Host used when a socket declares neither a path nor a host.
pub const DEFAULT_SOCKET_HOST: &str = "localhost";

/// Port used when a socket declares neither a path nor a port.
pub const DEFAULT_SOCKET_PORT: u16 = 8080;

/// Listen backlog applied to stream sockets.
pub const DEFAULT_BACKLOG: i32 = 2048;

/// Creation mask applied to filesystem socket paths.
pub const DEFAULT_UMASK: u32 = 0o010;

/// Grace period, in milliseconds, before a stopping process is killed.
pub const DEFAULT_GRACEFUL_TIMEOUT_MS: u64 = 30_000;

/// Signal sent to ask a process to exit.
pub const DEFAULT_STOP_SIGNAL: &str = "SIGTERM";

/// Signal sent once the graceful timeout expires.
pub const DEFAULT_KILL_SIGNAL: &str = "SIGKILL";

/// Time every process must stay alive before a watcher reports running.
pub const DEFAULT_MIN_UPTIME_MS: u64 = 1_000;

/// Immediate spawn attempts per slot before the slot is marked failed.
pub const DEFAULT_MAX_SPAWN_ATTEMPTS: u32 = 5;

/// Exits tolerated inside the flapping window.
pub const DEFAULT_FLAPPING_MAX_EXITS: usize = 2;

/// Width of the rolling flapping window, in milliseconds.
pub const DEFAULT_FLAPPING_WINDOW_MS: u64 = 1_000;

/// First respawn delay, in milliseconds.
pub const DEFAULT_BACKOFF_FIRST_MS: u64 = 0;

/// Respawn delay ceiling, in milliseconds.
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Multiplicative growth applied per additional exit in the window.
pub const DEFAULT_BACKOFF_FACTOR: u32 = 2;

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default manifest location.
pub fn default_manifest_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_MANIFEST_PATH)
}

/// Default health-check tick period.
pub const fn default_check_interval_ms() -> u64 {
    DEFAULT_CHECK_INTERVAL_MS
}

/// Computes the default runtime directory for lock, pid, and health files.
pub fn default_runtime_dir() -> Utf8PathBuf {
    default_runtime_dir_inner()
}

#[cfg(unix)]
fn default_runtime_dir_inner() -> Utf8PathBuf {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("ringmaster");
    if apply_namespace {
        base.push(user_namespace());
    }
    base
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_runtime_dir_inner() -> Utf8PathBuf {
    let mut dir = fallback_base_directory();
    dir.push("ringmaster");
    dir
}

pub(crate) fn default_socket_backlog() -> i32 {
    DEFAULT_BACKLOG
}

pub(crate) fn default_socket_umask() -> u32 {
    DEFAULT_UMASK
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_numprocesses() -> usize {
    1
}

pub(crate) fn default_graceful_timeout_ms() -> u64 {
    DEFAULT_GRACEFUL_TIMEOUT_MS
}

pub(crate) fn default_stop_signal() -> String {
    DEFAULT_STOP_SIGNAL.to_owned()
}

pub(crate) fn default_kill_signal() -> String {
    DEFAULT_KILL_SIGNAL.to_owned()
}

pub(crate) fn default_min_uptime_ms() -> u64 {
    DEFAULT_MIN_UPTIME_MS
}

pub(crate) fn default_max_spawn_attempts() -> u32 {
    DEFAULT_MAX_SPAWN_ATTEMPTS
}
