//! Bounded retry policy for queued engine operations.

use crate::error::PlaybackError;
use core_runtime::config::PlaybackSettings;
use std::time::Duration;

/// How many times, and how far apart, a transient failure is retried.
///
/// Only [`PlaybackError::is_transient`] failures are retried. Supersession and
/// resolution failures never are.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    pub fn from_settings(settings: &PlaybackSettings) -> Self {
        Self {
            max_attempts: settings.retry_max_attempts.max(1),
            initial_backoff: settings.retry_initial_backoff,
            multiplier: settings.retry_backoff_multiplier,
        }
    }

    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn should_retry(&self, attempt: u32, error: &PlaybackError) -> bool {
        attempt < self.max_attempts && error.is_transient()
    }

    /// Delay before the attempt following `attempt`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        self.initial_backoff.mul_f64(self.multiplier.powi(exponent))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&PlaybackSettings::default())
    }
}
