//! Circuit breaker guarding the audio engine.
//!
//! Closed while failures stay below the threshold. Open (rejecting) for
//! `reset_timeout` after the threshold is reached. Once the timeout has
//! elapsed the breaker is half-open and admits exactly one trial operation;
//! the trial's outcome closes or re-opens it.

use crate::error::{PlaybackError, Result};
use core_runtime::config::PlaybackSettings;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from(&PlaybackSettings::default())
    }
}

impl From<&PlaybackSettings> for CircuitBreakerConfig {
    fn from(settings: &PlaybackSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            reset_timeout: settings.reset_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Snapshot of the breaker for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Remaining open time, when open.
    pub retry_after: Option<Duration>,
}

/// Permission to run one operation, returned by [`CircuitBreaker::try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Normal,
    /// The single half-open trial.
    Trial,
}

#[derive(Debug, Default)]
struct BreakerInner {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    /// Ask to run an operation now.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::CircuitOpen`] while open, or while the half-open trial
    /// is still running.
    pub fn try_acquire(&self) -> Result<Admission> {
        let mut inner = self.inner.lock();

        let Some(opened_at) = inner.opened_at else {
            return Ok(Admission::Normal);
        };

        let elapsed = opened_at.elapsed();
        if elapsed < self.config.reset_timeout {
            return Err(PlaybackError::CircuitOpen {
                retry_after: self.config.reset_timeout - elapsed,
            });
        }

        if inner.trial_in_flight {
            return Err(PlaybackError::CircuitOpen {
                retry_after: Duration::ZERO,
            });
        }

        inner.trial_in_flight = true;
        info!(
            failures = inner.consecutive_failures,
            "Circuit breaker half-open, admitting trial operation"
        );
        Ok(Admission::Trial)
    }

    pub fn record_success(&self, admission: Admission) {
        let mut inner = self.inner.lock();
        let was_open = inner.opened_at.is_some();

        inner.consecutive_failures = 0;
        inner.opened_at = None;
        if admission == Admission::Trial {
            inner.trial_in_flight = false;
        }

        if was_open {
            info!("Circuit breaker closed");
        }
    }

    pub fn record_failure(&self, admission: Admission, error: &PlaybackError) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        if admission == Admission::Trial {
            inner.trial_in_flight = false;
        }

        if inner.consecutive_failures >= self.config.failure_threshold {
            let reopened = inner.opened_at.is_some();
            inner.opened_at = Some(Instant::now());
            warn!(
                failures = inner.consecutive_failures,
                reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
                error = %error,
                "Circuit breaker {}",
                if reopened { "re-opened" } else { "opened" }
            );
        }
    }

    /// Outcome that neither succeeded nor failed (supersession or a released
    /// queue turn).
    pub fn record_cancelled(&self, admission: Admission) {
        if admission == Admission::Trial {
            self.inner.lock().trial_in_flight = false;
        }
    }

    /// Manual operator override.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        *inner = BreakerInner::default();
        info!("Circuit breaker reset manually");
    }

    pub fn status(&self) -> BreakerStatus {
        let inner = self.inner.lock();
        match inner.opened_at {
            None => BreakerStatus {
                state: CircuitState::Closed,
                consecutive_failures: inner.consecutive_failures,
                retry_after: None,
            },
            Some(opened_at) => {
                let elapsed = opened_at.elapsed();
                if elapsed < self.config.reset_timeout {
                    BreakerStatus {
                        state: CircuitState::Open,
                        consecutive_failures: inner.consecutive_failures,
                        retry_after: Some(self.config.reset_timeout - elapsed),
                    }
                } else {
                    BreakerStatus {
                        state: CircuitState::HalfOpen,
                        consecutive_failures: inner.consecutive_failures,
                        retry_after: None,
                    }
                }
            }
        }
    }
}
