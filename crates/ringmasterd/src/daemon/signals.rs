//! Non-blocking delivery of operator signals to the control loop.

use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::DAEMON_TARGET;

/// What the operator asked the control loop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Stop the arbiter gracefully and exit.
    Stop,
    /// Re-read the manifest and converge on it.
    Reload,
}

/// Source of control signals polled once per tick.
pub trait ControlSignals: Send {
    /// Starts listening; called once, after daemonisation.
    fn listen(&mut self) -> Result<(), SignalError>;

    /// Returns the most urgent signal received since the last poll.
    ///
    /// A stop request wins over a reload delivered in the same interval.
    fn poll(&mut self) -> Option<ControlSignal>;
}

/// Errors reported by signal listeners.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Listener for `SIGTERM`, `SIGINT`, `SIGQUIT` and `SIGHUP`.
#[derive(Default)]
pub struct SystemControlSignals {
    signals: Option<Signals>,
}

impl SystemControlSignals {
    /// Builds a listener; handlers are installed by [`ControlSignals::listen`].
    #[must_use]
    pub const fn new() -> Self {
        Self { signals: None }
    }
}

impl std::fmt::Debug for SystemControlSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemControlSignals")
            .field("listening", &self.signals.is_some())
            .finish()
    }
}

impl ControlSignals for SystemControlSignals {
    fn listen(&mut self) -> Result<(), SignalError> {
        let signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| SignalError::Install { source })?;
        self.signals = Some(signals);
        Ok(())
    }

    fn poll(&mut self) -> Option<ControlSignal> {
        let signals = self.signals.as_mut()?;
        let mut received = None;
        for signal in signals.pending() {
            let control = classify(signal);
            info!(
                target: DAEMON_TARGET,
                signal,
                action = ?control,
                "control signal received"
            );
            received = match (received, control) {
                (Some(ControlSignal::Stop), _) | (_, ControlSignal::Stop) => {
                    Some(ControlSignal::Stop)
                }
                _ => Some(ControlSignal::Reload),
            };
        }
        received
    }
}

fn classify(signal: i32) -> ControlSignal {
    if signal == SIGHUP {
        ControlSignal::Reload
    } else {
        ControlSignal::Stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SIGHUP, ControlSignal::Reload)]
    #[case(SIGTERM, ControlSignal::Stop)]
    #[case(SIGINT, ControlSignal::Stop)]
    #[case(SIGQUIT, ControlSignal::Stop)]
    fn classifies_signals(#[case] signal: i32, #[case] expected: ControlSignal) {
        assert_eq!(classify(signal), expected);
    }

    #[test]
    fn polling_before_listen_yields_nothing() {
        let mut signals = SystemControlSignals::new();
        assert_eq!(signals.poll(), None);
    }
}
