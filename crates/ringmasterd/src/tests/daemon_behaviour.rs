//! Behavioural tests for bootstrap and the daemon runtime.

use std::cell::RefCell;
use std::fs;
use std::sync::Arc;

use ringmaster_config::RuntimePaths;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::bootstrap::{BootstrapError, Bootstrapped, ConfigLoader, bootstrap_with};
use crate::daemon::launch::{LaunchPlan, ProcessControl, ServiceDeps, run_daemon_with};
use crate::daemon::{ControlSignal, LaunchError, LaunchMode};
use crate::health::HealthReporter;

use super::support::{
    FailingConfigLoader, HealthEvent, RecordingHealthReporter, ScriptedSignals,
    SimulatedSupervisor, Step, TestConfigLoader, TestDaemonizer,
};

type StepResult = Result<(), String>;

fn manifest_yaml(watchers: &[&str]) -> String {
    let mut yaml = String::from("watchers:\n");
    for name in watchers {
        yaml.push_str(&format!("  - name: {name}\n    cmd: worker\n"));
    }
    yaml
}

fn watcher_names(count: usize) -> Vec<String> {
    (0..count).map(|index| format!("w{index}")).collect()
}

enum Source {
    Healthy(TestConfigLoader),
    Malformed(FailingConfigLoader),
}

struct DaemonWorld {
    source: Option<Source>,
    reporter: Arc<RecordingHealthReporter>,
    sim: SimulatedSupervisor,
    signals: ScriptedSignals,
    daemonizer: TestDaemonizer,
    bootstrap: Option<Result<Bootstrapped, BootstrapError>>,
    launch: Option<Result<(), LaunchError>>,
}

impl DaemonWorld {
    fn new() -> Self {
        Self {
            source: None,
            reporter: Arc::new(RecordingHealthReporter::default()),
            sim: SimulatedSupervisor::new(),
            signals: ScriptedSignals::default(),
            daemonizer: TestDaemonizer::default(),
            bootstrap: None,
            launch: None,
        }
    }

    fn loader(&self) -> Result<&TestConfigLoader, String> {
        match &self.source {
            Some(Source::Healthy(loader)) => Ok(loader),
            _ => Err("no manifest-backed configuration was prepared".to_owned()),
        }
    }

    fn runtime_paths(&self) -> Result<RuntimePaths, String> {
        RuntimePaths::from_config(&self.loader()?.config()).map_err(|error| error.to_string())
    }

    fn run(&mut self, mode: LaunchMode) -> StepResult {
        let loader = self.loader()?.clone();
        self.signals
            .observe_health(self.runtime_paths()?.health_path().to_path_buf());
        let reporter: Arc<dyn HealthReporter> = self.reporter.clone();
        let plan = LaunchPlan {
            process: ProcessControl {
                mode,
                daemonizer: self.daemonizer.clone(),
                signals: self.signals.clone(),
            },
            services: ServiceDeps {
                loader,
                reporter,
                engine: self.sim.deps(),
            },
        };
        self.launch = Some(run_daemon_with(plan));
        Ok(())
    }

    fn launch_result(&self) -> Result<&Result<(), LaunchError>, String> {
        self.launch
            .as_ref()
            .ok_or_else(|| "the daemon was not run".to_owned())
    }

    fn bootstrap_error(&self) -> Result<&BootstrapError, String> {
        match &self.bootstrap {
            Some(Err(error)) => Ok(error),
            Some(Ok(_)) => Err("bootstrap unexpectedly succeeded".to_owned()),
            None => Err("bootstrap was not attempted".to_owned()),
        }
    }
}

#[fixture]
fn world() -> RefCell<DaemonWorld> {
    RefCell::new(DaemonWorld::new())
}

#[given("a configuration pointing at a manifest with {count} watchers")]
fn given_manifest(world: &RefCell<DaemonWorld>, count: usize) {
    let names = watcher_names(count);
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let loader = TestConfigLoader::with_manifest(&manifest_yaml(&names));
    world.borrow_mut().source = Some(Source::Healthy(loader));
}

#[given("a configuration pointing at a missing manifest")]
fn given_missing_manifest(world: &RefCell<DaemonWorld>) {
    world.borrow_mut().source = Some(Source::Healthy(TestConfigLoader::new()));
}

#[given("a malformed configuration file")]
fn given_malformed_configuration(world: &RefCell<DaemonWorld>) {
    world.borrow_mut().source = Some(Source::Malformed(FailingConfigLoader::new()));
}

#[given("the control loop idles for {count} ticks")]
fn given_idle_ticks(world: &RefCell<DaemonWorld>, count: usize) {
    let world = world.borrow();
    for _ in 0..count {
        world.signals.push(Step::Idle);
    }
}

#[given("a watcher named {name} is added before a reload signal")]
fn given_watcher_added(world: &RefCell<DaemonWorld>, name: String) -> StepResult {
    let world = world.borrow();
    let loader = world.loader()?.clone();
    let yaml = manifest_yaml(&["w0", name.as_str()]);
    world
        .signals
        .push(Step::Do(Box::new(move || loader.write_manifest(&yaml))));
    world.signals.push(Step::Deliver(ControlSignal::Reload));
    Ok(())
}

#[given("the manifest is corrupted before a reload signal")]
fn given_manifest_corrupted(world: &RefCell<DaemonWorld>) -> StepResult {
    let world = world.borrow();
    let loader = world.loader()?.clone();
    world.signals.push(Step::Do(Box::new(move || {
        loader.write_manifest("watchers: [ {name: w0\n");
    })));
    world.signals.push(Step::Deliver(ControlSignal::Reload));
    Ok(())
}

#[given("the runtime lock is held by a live process")]
fn given_live_lock(world: &RefCell<DaemonWorld>) -> StepResult {
    let paths = world.borrow().runtime_paths()?;
    fs::write(paths.lock_path(), "").map_err(|error| error.to_string())?;
    fs::write(paths.pid_path(), format!("{}\n", std::process::id()))
        .map_err(|error| error.to_string())
}

#[given("a stale runtime lock exists")]
fn given_stale_lock(world: &RefCell<DaemonWorld>) -> StepResult {
    let paths = world.borrow().runtime_paths()?;
    fs::write(paths.lock_path(), "").map_err(|error| error.to_string())?;
    fs::write(paths.pid_path(), "0\n").map_err(|error| error.to_string())
}

#[when("the supervisor bootstraps")]
fn when_bootstraps(world: &RefCell<DaemonWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    let result = {
        let loader: &dyn ConfigLoader = match world.source.as_ref() {
            Some(Source::Healthy(loader)) => loader,
            Some(Source::Malformed(loader)) => loader,
            None => return Err("no configuration source was prepared".to_owned()),
        };
        bootstrap_with(loader, world.reporter.as_ref())
    };
    world.bootstrap = Some(result);
    Ok(())
}

#[when("the daemon runs in the foreground")]
fn when_runs_foreground(world: &RefCell<DaemonWorld>) -> StepResult {
    world.borrow_mut().run(LaunchMode::Foreground)
}

#[when("the daemon runs in the background")]
fn when_runs_background(world: &RefCell<DaemonWorld>) -> StepResult {
    world.borrow_mut().run(LaunchMode::Background)
}

#[then("bootstrap succeeds with {count} watchers")]
fn then_bootstrap_succeeds(world: &RefCell<DaemonWorld>, count: usize) -> StepResult {
    let world = world.borrow();
    match &world.bootstrap {
        Some(Ok(bootstrapped)) => {
            assert_eq!(bootstrapped.manifest().watchers.len(), count);
            assert_eq!(bootstrapped.config().check_interval_ms, 10);
            Ok(())
        }
        Some(Err(error)) => Err(format!("bootstrap failed: {error}")),
        None => Err("bootstrap was not attempted".to_owned()),
    }
}

#[then("the health reporter saw bootstrap start first")]
fn then_bootstrap_order(world: &RefCell<DaemonWorld>) {
    let events = world.borrow().reporter.events();
    assert_eq!(events.first(), Some(&HealthEvent::BootstrapStarting));
    assert!(matches!(
        events.last(),
        Some(HealthEvent::BootstrapSucceeded { .. })
    ));
}

#[then("bootstrap fails mentioning {subject}")]
fn then_bootstrap_fails(world: &RefCell<DaemonWorld>, subject: String) -> StepResult {
    let world = world.borrow();
    let error = world.bootstrap_error()?;
    let matches_subject = match subject.as_str() {
        "manifest" => matches!(error, BootstrapError::Manifest { .. }),
        "configuration" => matches!(error, BootstrapError::Configuration { .. }),
        other => return Err(format!("unknown bootstrap failure subject {other}")),
    };
    if !matches_subject {
        return Err(format!("expected a {subject} failure, got {error}"));
    }
    let events = world.reporter.events();
    assert!(
        matches!(events.last(), Some(HealthEvent::BootstrapFailed(message)) if message.contains(subject.as_str())),
        "unexpected health events {events:?}"
    );
    Ok(())
}

#[then("the daemon exits cleanly")]
fn then_exits_cleanly(world: &RefCell<DaemonWorld>) -> StepResult {
    match world.borrow().launch_result()? {
        Ok(()) => Ok(()),
        Err(error) => Err(format!("daemon failed: {error}")),
    }
}

#[then("the health file reported ready while running")]
fn then_health_ready(world: &RefCell<DaemonWorld>) {
    let seen = world.borrow().signals.health_seen();
    assert!(!seen.is_empty(), "health file was never observed");
    assert!(seen.iter().all(|status| status == "ready"), "saw {seen:?}");
}

#[then("the runtime directory is left empty")]
fn then_runtime_empty(world: &RefCell<DaemonWorld>) -> StepResult {
    let world = world.borrow();
    let dir = world.loader()?.runtime_dir();
    let leftovers: Vec<_> = fs::read_dir(dir)
        .map_err(|error| error.to_string())?
        .filter_map(Result::ok)
        .map(|entry| entry.file_name())
        .collect();
    assert!(leftovers.is_empty(), "runtime files remain: {leftovers:?}");
    Ok(())
}

#[then("the daemonizer was invoked {count} times")]
fn then_daemonizer_calls(world: &RefCell<DaemonWorld>, count: usize) {
    assert_eq!(world.borrow().daemonizer.calls(), count);
}

#[then("no simulated process remains alive")]
fn then_no_processes(world: &RefCell<DaemonWorld>) {
    let live = world.borrow().sim.host.live_pids();
    assert!(live.is_empty(), "processes still alive: {live:?}");
}

#[then("the reported reload added {name}")]
fn then_reload_added(world: &RefCell<DaemonWorld>, name: String) -> StepResult {
    let events = world.borrow().reporter.events();
    let summary = events
        .iter()
        .find_map(|event| match event {
            HealthEvent::ReloadSucceeded(summary) => Some(summary),
            _ => None,
        })
        .ok_or_else(|| format!("no successful reload in {events:?}"))?;
    assert_eq!(summary.added, vec![name]);
    assert_eq!(summary.restarted, vec!["w0".to_owned()]);
    assert!(summary.removed.is_empty());
    Ok(())
}

#[then("the reload was reported as failed")]
fn then_reload_failed(world: &RefCell<DaemonWorld>) {
    let events = world.borrow().reporter.events();
    assert!(
        events
            .iter()
            .any(|event| matches!(event, HealthEvent::ReloadFailed(message) if message.contains("manifest"))),
        "no failed reload in {events:?}"
    );
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, HealthEvent::ReloadSucceeded(_)))
    );
}

#[then("the launch fails because a supervisor is already running")]
fn then_already_running(world: &RefCell<DaemonWorld>) -> StepResult {
    let world = world.borrow();
    match world.launch_result()? {
        Err(LaunchError::AlreadyRunning { pid }) => {
            assert_eq!(*pid, std::process::id());
            assert!(!world.signals.listening());
            Ok(())
        }
        Err(other) => Err(format!("unexpected launch error: {other}")),
        Ok(()) => Err("second supervisor started".to_owned()),
    }
}

#[scenario(path = "tests/features/daemon_runtime.feature")]
fn daemon_runtime(world: RefCell<DaemonWorld>) -> Result<(), String> {
    let _ = world;
    Ok(())
}
