//! Supervisor collaborators backed by the simulated process host.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::ManualClock;
use crate::events::{EventBus, EventListener, SupervisorEvent};
use crate::process::{Reaper, SimulatedHost};
use crate::watcher::SupervisorDeps;

use super::listener::RecordingListener;

/// Fake process table, manual clock, and an event recorder wired together.
pub struct SimulatedSupervisor {
    pub host: SimulatedHost,
    pub clock: Arc<ManualClock>,
    pub events: Arc<RecordingListener>,
    deps: SupervisorDeps,
}

impl SimulatedSupervisor {
    #[must_use]
    pub fn new() -> Self {
        let host = SimulatedHost::new();
        let clock = Arc::new(ManualClock::new());
        let events = Arc::new(RecordingListener::default());
        let bus = EventBus::new();
        let recorder = Arc::clone(&events);
        bus.subscribe(move |event: &SupervisorEvent| recorder.on_event(event));
        let deps = SupervisorDeps {
            launcher: Arc::new(host.launcher()),
            reaper: Arc::new(Reaper::new(host.wait_source())),
            clock: clock.clone(),
            events: bus,
        };
        Self {
            host,
            clock,
            events,
            deps,
        }
    }

    /// Collaborators to hand to a watcher or arbiter; every call shares the
    /// same reaper and event bus.
    #[must_use]
    pub fn deps(&self) -> SupervisorDeps {
        self.deps.clone()
    }

    pub fn advance(&self, duration: Duration) {
        self.clock.advance(duration);
    }

    /// Routes pending exits the way the arbiter does before each tick.
    pub fn reap(&self) -> usize {
        self.deps.reaper.reap()
    }
}

impl Default for SimulatedSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
