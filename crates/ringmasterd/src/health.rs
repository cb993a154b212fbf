//! Structured health reporting for daemon lifecycle events.
//!
//! Engine-level events travel over the arbiter's event bus; this observer
//! covers what happens around the engine: bootstrap and manifest reloads.

use std::sync::Arc;

use ringmaster_config::{Config, Manifest};

use crate::arbiter::ReloadSummary;
use crate::bootstrap::BootstrapError;
use crate::daemon::ReloadError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer for daemon lifecycle milestones.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after configuration, telemetry, and manifest are ready.
    fn bootstrap_succeeded(&self, config: &Config, manifest: &Manifest);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked after a manifest reload converged.
    fn reload_succeeded(&self, summary: &ReloadSummary);

    /// Invoked when a reload failed to load or apply.
    fn reload_failed(&self, error: &ReloadError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config, manifest: &Manifest) {
        (**self).bootstrap_succeeded(config, manifest);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn reload_succeeded(&self, summary: &ReloadSummary) {
        (**self).reload_succeeded(summary);
    }

    fn reload_failed(&self, error: &ReloadError) {
        (**self).reload_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting supervisor bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config, manifest: &Manifest) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            manifest = %config.manifest_path(),
            sockets = manifest.sockets.len(),
            watchers = manifest.watchers.len(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "supervisor bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "supervisor bootstrap failed"
        );
    }

    fn reload_succeeded(&self, summary: &ReloadSummary) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "reload_succeeded",
            added = summary.added.len(),
            removed = summary.removed.len(),
            restarted = summary.restarted.len(),
            "manifest reload applied"
        );
    }

    fn reload_failed(&self, error: &ReloadError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "reload_failed",
            error = %error,
            "manifest reload failed"
        );
    }
}
