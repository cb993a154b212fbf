//! Respawn delay and flapping detection.
//!
//! The delay before respawn `n` within a flapping window is
//! `first × factor^n`, clamped to `max`. Arithmetic is integral and
//! saturating so large exponents simply pin the delay at the cap.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ringmaster_config::{BackoffConfig, FlappingConfig};

/// Respawn delay schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first respawn.
    pub first: Duration,
    /// Delay ceiling.
    pub max: Duration,
    /// Growth factor, at least one.
    pub factor: u32,
}

impl BackoffPolicy {
    /// Builds the policy from its manifest form.
    #[must_use]
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self {
            first: Duration::from_millis(config.first_ms),
            max: Duration::from_millis(config.max_ms),
            factor: config.factor.max(1),
        }
    }

    /// Delay for the given attempt number (0-indexed).
    #[must_use]
    pub fn next(&self, attempt: u32) -> Duration {
        let first = u64::try_from(self.first.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        let scaled = u64::from(self.factor)
            .checked_pow(attempt)
            .and_then(|growth| first.checked_mul(growth))
            .unwrap_or(u64::MAX);
        Duration::from_millis(scaled.min(max))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

/// Exit-rate threshold for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlappingPolicy {
    /// Exits tolerated inside the window.
    pub max_exits: usize,
    /// Window width.
    pub window: Duration,
}

impl FlappingPolicy {
    /// Builds the policy from its manifest form.
    #[must_use]
    pub fn from_config(config: &FlappingConfig) -> Self {
        Self {
            max_exits: config.max_exits,
            window: Duration::from_millis(config.window_ms),
        }
    }

    /// Records an exit at `now`, forgets exits older than the window, and
    /// returns how many remain.
    pub fn record(&self, history: &mut VecDeque<Instant>, now: Instant) -> usize {
        history.push_back(now);
        while let Some(oldest) = history.front() {
            if now.saturating_duration_since(*oldest) > self.window {
                history.pop_front();
            } else {
                break;
            }
        }
        history.len()
    }

    /// True once the window holds more exits than tolerated.
    #[must_use]
    pub const fn is_flapping(&self, exits: usize) -> bool {
        exits > self.max_exits
    }
}

impl Default for FlappingPolicy {
    fn default() -> Self {
        Self::from_config(&FlappingConfig::default())
    }
}
