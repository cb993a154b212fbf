//! Supervisor bootstrap: configuration, telemetry, and the manifest.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use ringmaster_config::{Config, Manifest, ManifestError};

use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out a configuration resolved earlier.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The supervision manifest could not be read or parsed.
    #[error("failed to load manifest: {source}")]
    Manifest {
        /// Underlying manifest error.
        #[source]
        source: ManifestError,
    },
}

/// Everything bootstrap resolved.
#[derive(Debug)]
pub struct Bootstrapped {
    config: Config,
    manifest: Manifest,
    telemetry: TelemetryHandle,
}

impl Bootstrapped {
    /// Resolved daemon settings.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Parsed supervision manifest.
    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Splits into configuration and manifest.
    #[must_use]
    pub fn into_parts(self) -> (Config, Manifest) {
        (self.config, self.manifest)
    }
}

/// Bootstraps the supervisor using the supplied collaborators.
///
/// The reporter sees `bootstrap_starting` first and exactly one of
/// `bootstrap_succeeded` or `bootstrap_failed` last.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
) -> Result<Bootstrapped, BootstrapError> {
    reporter.bootstrap_starting();
    match resolve(loader) {
        Ok(bootstrapped) => {
            reporter.bootstrap_succeeded(&bootstrapped.config, &bootstrapped.manifest);
            Ok(bootstrapped)
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn resolve(loader: &dyn ConfigLoader) -> Result<Bootstrapped, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    let manifest = Manifest::load(config.manifest_path())
        .map_err(|source| BootstrapError::Manifest { source })?;
    Ok(Bootstrapped {
        config,
        manifest,
        telemetry,
    })
}
