use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::Serialize;
use strum::IntoStaticStr;
use tracing::{info, warn};

use ringmaster_config::RuntimePaths;

use super::DAEMON_TARGET;
use super::errors::LaunchError;
use super::files::atomic_write;

/// Singleton lock plus the pid and health files beside it.
///
/// All three files are removed when the guard drops.
#[derive(Debug)]
pub(super) struct ProcessGuard {
    paths: RuntimePaths,
    _lock: File,
    pid: Option<u32>,
}

impl ProcessGuard {
    pub(super) fn acquire(paths: RuntimePaths) -> Result<Self, LaunchError> {
        let lock = acquire_lock(&paths)?;
        Ok(Self {
            paths,
            _lock: lock,
            pid: None,
        })
    }

    pub(super) fn write_pid(&mut self, pid: u32) -> Result<(), LaunchError> {
        let path = self.paths.pid_path();
        let pid_error = |source| LaunchError::PidWrite {
            path: path.to_path_buf(),
            source,
        };
        let mut file = private_options()
            .truncate(true)
            .open(path)
            .map_err(pid_error)?;
        writeln!(file, "{pid}").map_err(pid_error)?;
        file.sync_all().map_err(pid_error)?;
        self.pid = Some(pid);
        info!(
            target: DAEMON_TARGET,
            pid,
            file = %path.display(),
            "pid file written"
        );
        Ok(())
    }

    pub(super) fn write_health(&self, state: HealthState) -> Result<(), LaunchError> {
        let pid = self.pid.ok_or(LaunchError::MissingPid)?;
        let snapshot = HealthSnapshot::new(state, pid)?;
        let mut payload = serde_json::to_vec(&snapshot)?;
        payload.push(b'\n');
        let path = self.paths.health_path();
        atomic_write(path, &payload).map_err(|source| LaunchError::HealthWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            target: DAEMON_TARGET,
            status = snapshot.status,
            file = %path.display(),
            "health snapshot updated"
        );
        Ok(())
    }

    pub(super) const fn paths(&self) -> &RuntimePaths {
        &self.paths
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        for (what, path) in [
            ("lock", self.paths.lock_path()),
            ("pid", self.paths.pid_path()),
            ("health", self.paths.health_path()),
        ] {
            if let Err(error) = fs::remove_file(path)
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: DAEMON_TARGET,
                    file = %path.display(),
                    error = %error,
                    "failed to remove {what} file"
                );
            }
        }
    }
}

/// Lifecycle stage published in the health file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub(super) enum HealthState {
    Starting,
    Ready,
    Stopping,
}

#[derive(Debug, Serialize)]
struct HealthSnapshot {
    status: &'static str,
    pid: u32,
    timestamp: u64,
}

impl HealthSnapshot {
    fn new(state: HealthState, pid: u32) -> Result<Self, LaunchError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|source| LaunchError::Clock { source })?
            .as_secs();
        Ok(Self {
            status: state.into(),
            pid,
            timestamp,
        })
    }
}

fn private_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

fn acquire_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    match private_options().create_new(true).open(paths.lock_path()) {
        Ok(file) => {
            info!(
                target: DAEMON_TARGET,
                file = %paths.lock_path().display(),
                "acquired supervisor lock"
            );
            Ok(file)
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => handle_existing_lock(paths),
        Err(source) => Err(LaunchError::LockCreate {
            path: paths.lock_path().to_path_buf(),
            source,
        }),
    }
}

fn handle_existing_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    if let Some(pid) = read_pid(paths.pid_path()) {
        if check_process(pid)? {
            info!(
                target: DAEMON_TARGET,
                pid,
                "refusing to start: existing supervisor alive"
            );
            return Err(LaunchError::AlreadyRunning { pid });
        }
        warn!(
            target: DAEMON_TARGET,
            pid,
            "existing supervisor not detected; cleaning stale files"
        );
    }
    remove_file(paths.lock_path())?;
    remove_file(paths.pid_path())?;
    acquire_lock(paths)
}

fn read_pid(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok()
}

fn remove_file(path: &Path) -> Result<(), LaunchError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LaunchError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn check_process(pid: u32) -> Result<bool, LaunchError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    if raw == 0 {
        return Ok(false);
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH | Errno::ECHILD) => Ok(false),
        Err(errno) => Err(LaunchError::CheckProcess { pid, source: errno }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use ringmaster_config::Config;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn runtime() -> (TempDir, RuntimePaths) {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config {
            runtime_dir: Utf8PathBuf::from_path_buf(dir.path().join("run")).expect("utf8 path"),
            ..Config::default()
        };
        let paths = RuntimePaths::from_config(&config).expect("runtime paths");
        (dir, paths)
    }

    #[rstest]
    fn guard_removes_artefacts_on_drop(runtime: (TempDir, RuntimePaths)) {
        let (_dir, paths) = runtime;
        let mut guard = ProcessGuard::acquire(paths.clone()).expect("acquire lock");
        guard.write_pid(std::process::id()).expect("write pid");
        guard.write_health(HealthState::Ready).expect("write health");
        assert!(paths.health_path().exists());

        drop(guard);

        assert!(!paths.lock_path().exists());
        assert!(!paths.pid_path().exists());
        assert!(!paths.health_path().exists());
    }

    #[rstest]
    fn live_pid_blocks_a_second_guard(runtime: (TempDir, RuntimePaths)) {
        let (_dir, paths) = runtime;
        let mut first = ProcessGuard::acquire(paths.clone()).expect("acquire lock");
        first.write_pid(std::process::id()).expect("write pid");

        let error = ProcessGuard::acquire(paths).expect_err("second guard must fail");
        assert!(matches!(error, LaunchError::AlreadyRunning { pid } if pid == std::process::id()));
    }

    #[rstest]
    #[case::zero_pid("0\n")]
    #[case::garbage("not a pid\n")]
    fn stale_lock_is_reclaimed(runtime: (TempDir, RuntimePaths), #[case] pid_contents: &str) {
        let (_dir, paths) = runtime;
        fs::write(paths.lock_path(), b"").expect("stale lock");
        fs::write(paths.pid_path(), pid_contents).expect("stale pid");

        let guard = ProcessGuard::acquire(paths.clone()).expect("stale lock should be reclaimed");
        assert!(paths.lock_path().exists());
        assert!(!paths.pid_path().exists());
        drop(guard);
    }

    #[rstest]
    fn health_requires_pid(runtime: (TempDir, RuntimePaths)) {
        let (_dir, paths) = runtime;
        let guard = ProcessGuard::acquire(paths).expect("acquire lock");
        let error = guard
            .write_health(HealthState::Starting)
            .expect_err("health before pid must fail");
        assert!(matches!(error, LaunchError::MissingPid));
    }

    #[test]
    fn health_states_render_in_snake_case() {
        let name: &'static str = HealthState::Stopping.into();
        assert_eq!(name, "stopping");
    }
}
