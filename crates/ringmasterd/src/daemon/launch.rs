//! Launch sequencing and the single control loop.

use std::env;
use std::sync::Arc;

use camino::Utf8Path;
use tracing::{debug, info};

use ringmaster_config::{Manifest, RuntimePaths};

use crate::arbiter::Arbiter;
use crate::bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::clock::Clock;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::watcher::SupervisorDeps;

use super::daemonizer::{Daemonizer, SystemDaemonizer};
use super::errors::{LaunchError, ReloadError};
use super::guard::{HealthState, ProcessGuard};
use super::signals::{ControlSignal, ControlSignals, SystemControlSignals};
use super::{DAEMON_TARGET, FOREGROUND_ENV_VAR};

/// Launch mode for the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    Background,
    /// Remain attached to the terminal; primarily used for debugging and tests.
    Foreground,
}

impl LaunchMode {
    fn detect() -> Self {
        if env::var_os(FOREGROUND_ENV_VAR).is_some() {
            Self::Foreground
        } else {
            Self::Background
        }
    }
}

/// Process-level collaborators needed to control the daemon lifecycle.
pub(crate) struct ProcessControl<D, S> {
    pub(crate) mode: LaunchMode,
    pub(crate) daemonizer: D,
    pub(crate) signals: S,
}

/// Service dependencies required to construct the supervisor.
pub(crate) struct ServiceDeps<L> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) engine: SupervisorDeps,
}

/// Collaborators required to launch the supervisor.
pub(crate) struct LaunchPlan<L, D, S> {
    pub(crate) process: ProcessControl<D, S>,
    pub(crate) services: ServiceDeps<L>,
}

/// Runs the supervisor using the production collaborators.
pub fn run_daemon() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        process: ProcessControl {
            mode: LaunchMode::detect(),
            daemonizer: SystemDaemonizer::new(),
            signals: SystemControlSignals::new(),
        },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            reporter: Arc::new(StructuredHealthReporter::new()),
            engine: SupervisorDeps::system(),
        },
    };
    run_daemon_with(plan)
}

/// Runs the supervisor with injected collaborators.
///
/// Returns once a stop signal has been handled and every watcher has
/// drained; runtime artefacts are removed on the way out.
pub(crate) fn run_daemon_with<L, D, S>(plan: LaunchPlan<L, D, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    D: Daemonizer,
    S: ControlSignals,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl {
        mode,
        daemonizer,
        mut signals,
    } = process;
    let ServiceDeps {
        loader,
        reporter,
        engine,
    } = services;

    info!(
        target: DAEMON_TARGET,
        ?mode,
        "starting supervisor runtime"
    );
    let config = loader.load()?;
    let runtime_paths = RuntimePaths::from_config(&config)?;
    let mut guard = ProcessGuard::acquire(runtime_paths)?;
    if matches!(mode, LaunchMode::Background) {
        daemonizer.daemonize(guard.paths())?;
    }
    signals.listen()?;
    guard.write_pid(std::process::id())?;
    guard.write_health(HealthState::Starting)?;

    let bootstrapped = bootstrap_with(&StaticConfigLoader::new(config), reporter.as_ref())?;
    let (config, manifest) = bootstrapped.into_parts();
    let clock = Arc::clone(&engine.clock);
    let mut arbiter = Arbiter::new(manifest, engine)?.with_check_interval(config.check_interval());
    arbiter.start()?;
    guard.write_health(HealthState::Ready)?;

    let control = ControlLoop {
        manifest_path: config.manifest_path(),
        reporter: reporter.as_ref(),
        clock: clock.as_ref(),
    };
    control.run(&mut arbiter, &mut signals);

    guard.write_health(HealthState::Stopping)?;
    arbiter.stop()?;
    info!(
        target: DAEMON_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}

struct ControlLoop<'a> {
    manifest_path: &'a Utf8Path,
    reporter: &'a dyn HealthReporter,
    clock: &'a dyn Clock,
}

impl ControlLoop<'_> {
    /// Ticks the arbiter until a stop signal arrives.
    fn run(&self, arbiter: &mut Arbiter, signals: &mut dyn ControlSignals) {
        loop {
            match signals.poll() {
                Some(ControlSignal::Stop) => return,
                Some(ControlSignal::Reload) => self.reload(arbiter),
                None => {}
            }
            arbiter.tick();
            self.clock.sleep(arbiter.check_interval());
        }
    }

    fn reload(&self, arbiter: &mut Arbiter) {
        debug!(
            target: DAEMON_TARGET,
            manifest = %self.manifest_path,
            "reloading manifest"
        );
        let result = Manifest::load(self.manifest_path)
            .map_err(ReloadError::from)
            .and_then(|manifest| arbiter.reload(manifest).map_err(ReloadError::from));
        match result {
            Ok(summary) => self.reporter.reload_succeeded(&summary),
            Err(error) => self.reporter.reload_failed(&error),
        }
    }
}
