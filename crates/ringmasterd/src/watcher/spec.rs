//! Validated watcher definition.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use camino::Utf8PathBuf;
use nix::sys::signal::Signal;
use ringmaster_config::WatcherConfig;

use super::policy::{BackoffPolicy, FlappingPolicy};
use crate::errors::ConfigError;

/// A [`WatcherConfig`] with signals parsed and durations typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherSpec {
    pub name: String,
    pub cmd: String,
    pub args: Vec<String>,
    pub working_dir: Option<Utf8PathBuf>,
    pub env: BTreeMap<String, String>,
    pub numprocesses: usize,
    pub graceful_timeout: Duration,
    pub stop_signal: Signal,
    pub kill_signal: Signal,
    pub stop_children: bool,
    pub sockets: Vec<String>,
    pub autostart: bool,
    pub respawn: bool,
    pub min_uptime: Duration,
    pub max_spawn_attempts: u32,
    pub flapping: FlappingPolicy,
    pub backoff: BackoffPolicy,
}

impl WatcherSpec {
    /// Validates a manifest entry without touching the OS.
    pub fn from_config(config: &WatcherConfig) -> Result<Self, ConfigError> {
        if config.name.trim().is_empty() {
            return Err(ConfigError::EmptyName { kind: "watcher" });
        }
        if config.cmd.trim().is_empty() {
            return Err(ConfigError::EmptyCommand {
                watcher: config.name.clone(),
            });
        }
        if config.backoff.factor == 0 {
            return Err(ConfigError::ZeroBackoffFactor {
                watcher: config.name.clone(),
            });
        }
        Ok(Self {
            name: config.name.clone(),
            cmd: config.cmd.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            env: config.env.clone(),
            numprocesses: config.numprocesses,
            graceful_timeout: Duration::from_millis(config.graceful_timeout_ms),
            stop_signal: parse_signal(&config.name, &config.stop_signal)?,
            kill_signal: parse_signal(&config.name, &config.kill_signal)?,
            stop_children: config.stop_children,
            sockets: config.sockets.clone(),
            autostart: config.autostart,
            respawn: config.respawn,
            min_uptime: Duration::from_millis(config.min_uptime_ms),
            max_spawn_attempts: config.max_spawn_attempts.max(1),
            flapping: FlappingPolicy::from_config(&config.flapping),
            backoff: BackoffPolicy::from_config(&config.backoff),
        })
    }

    /// Grace period in milliseconds, as reported in events.
    #[must_use]
    pub fn graceful_timeout_ms(&self) -> u64 {
        u64::try_from(self.graceful_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Accepts `SIGTERM`, `TERM`, or a signal number, case-insensitively.
fn parse_signal(watcher: &str, value: &str) -> Result<Signal, ConfigError> {
    let invalid = || ConfigError::InvalidSignal {
        watcher: watcher.to_owned(),
        value: value.to_owned(),
    };
    let trimmed = value.trim();
    if let Ok(number) = trimmed.parse::<i32>() {
        return Signal::try_from(number).map_err(|_| invalid());
    }
    let upper = trimmed.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&name).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("SIGTERM", Signal::SIGTERM)]
    #[case("term", Signal::SIGTERM)]
    #[case("SigQuit", Signal::SIGQUIT)]
    #[case("9", Signal::SIGKILL)]
    fn parses_signal_spellings(#[case] value: &str, #[case] expected: Signal) {
        assert_eq!(parse_signal("w", value), Ok(expected));
    }

    #[rstest]
    #[case("SIGNOPE")]
    #[case("")]
    #[case("999")]
    fn rejects_unknown_signals(#[case] value: &str) {
        assert!(matches!(
            parse_signal("w", value),
            Err(ConfigError::InvalidSignal { .. })
        ));
    }

    #[test]
    fn validates_required_fields() {
        let mut config = WatcherConfig::new("web", " ");
        assert!(matches!(
            WatcherSpec::from_config(&config),
            Err(ConfigError::EmptyCommand { .. })
        ));
        config.cmd = "server".to_owned();
        config.name = String::new();
        assert_eq!(
            WatcherSpec::from_config(&config),
            Err(ConfigError::EmptyName { kind: "watcher" })
        );
    }

    #[test]
    fn converts_durations_and_defaults() {
        let mut config = WatcherConfig::new("web", "server");
        config.graceful_timeout_ms = 1_500;
        config.max_spawn_attempts = 0;
        let spec = WatcherSpec::from_config(&config).expect("valid");
        assert_eq!(spec.graceful_timeout, Duration::from_millis(1_500));
        assert_eq!(spec.stop_signal, Signal::SIGTERM);
        assert_eq!(spec.kill_signal, Signal::SIGKILL);
        assert_eq!(spec.max_spawn_attempts, 1);
    }

    #[test]
    fn zero_backoff_factor_is_rejected() {
        let mut config = WatcherConfig::new("web", "server");
        config.backoff.factor = 0;
        assert!(matches!(
            WatcherSpec::from_config(&config),
            Err(ConfigError::ZeroBackoffFactor { .. })
        ));
    }
}
