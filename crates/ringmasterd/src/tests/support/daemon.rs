//! Doubles for the process-level collaborators of the daemon runtime.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ringmaster_config::RuntimePaths;
use serde_json::Value;

use crate::daemon::{ControlSignal, ControlSignals, DaemonizeError, Daemonizer, SignalError};

#[derive(Clone, Default)]
pub struct TestDaemonizer {
    calls: Arc<AtomicUsize>,
}

impl TestDaemonizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Daemonizer for TestDaemonizer {
    fn daemonize(&self, _paths: &RuntimePaths) -> Result<(), DaemonizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One control-loop iteration as seen by [`ScriptedSignals`].
pub enum Step {
    Idle,
    Deliver(ControlSignal),
    /// Runs an action between ticks, then reports no signal.
    Do(Box<dyn FnOnce() + Send>),
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    listening: bool,
    observe: Option<PathBuf>,
    health: Vec<String>,
}

/// Signal source that plays a fixed script, then asks the loop to stop.
#[derive(Clone, Default)]
pub struct ScriptedSignals {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedSignals {
    pub fn push(&self, step: Step) {
        self.lock().steps.push_back(step);
    }

    /// Records the health file status on every poll.
    pub fn observe_health(&self, path: PathBuf) {
        self.lock().observe = Some(path);
    }

    pub fn health_seen(&self) -> Vec<String> {
        self.lock().health.clone()
    }

    pub fn listening(&self) -> bool {
        self.lock().listening
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.inner.lock().expect("signal script mutex poisoned")
    }
}

impl ControlSignals for ScriptedSignals {
    fn listen(&mut self) -> Result<(), SignalError> {
        self.lock().listening = true;
        Ok(())
    }

    fn poll(&mut self) -> Option<ControlSignal> {
        let step = {
            let mut script = self.lock();
            if let Some(status) = script.observe.as_deref().and_then(read_status) {
                script.health.push(status);
            }
            script.steps.pop_front()
        };
        match step {
            None => Some(ControlSignal::Stop),
            Some(Step::Idle) => None,
            Some(Step::Deliver(signal)) => Some(signal),
            Some(Step::Do(action)) => {
                action();
                None
            }
        }
    }
}

fn read_status(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let snapshot: Value = serde_json::from_str(&content).ok()?;
    snapshot.get("status")?.as_str().map(str::to_owned)
}
