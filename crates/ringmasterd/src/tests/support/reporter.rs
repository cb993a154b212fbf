//! Test double for [`HealthReporter`] that records lifecycle milestones.

use std::sync::Mutex;

use ringmaster_config::{Config, Manifest};

use crate::arbiter::ReloadSummary;
use crate::bootstrap::BootstrapError;
use crate::daemon::ReloadError;
use crate::health::HealthReporter;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    /// Bootstrap completed with this many watchers declared.
    BootstrapSucceeded { watchers: usize },
    BootstrapFailed(String),
    ReloadSucceeded(ReloadSummary),
    ReloadFailed(String),
}

#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config, manifest: &Manifest) {
        self.record(HealthEvent::BootstrapSucceeded {
            watchers: manifest.watchers.len(),
        });
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn reload_succeeded(&self, summary: &ReloadSummary) {
        self.record(HealthEvent::ReloadSucceeded(summary.clone()));
    }

    fn reload_failed(&self, error: &ReloadError) {
        self.record(HealthEvent::ReloadFailed(error.to_string()));
    }
}
