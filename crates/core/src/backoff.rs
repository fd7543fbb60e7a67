//! Adaptive backoff schedule for job status polling.
//!
//! The poller starts at [`BASE_POLL_INTERVAL_MS`] and grows the delay after
//! every check: gently after a successful fetch (long jobs get polled less
//! often), steeply after a failed one. Both branches clamp to
//! [`MAX_POLL_INTERVAL_MS`].

use std::time::Duration;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Delay before the first status check of a polling session.
pub const BASE_POLL_INTERVAL_MS: u64 = 1_000;

/// Upper bound on the delay between two status checks.
pub const MAX_POLL_INTERVAL_MS: u64 = 30_000;

/// Growth factor applied after a successful status fetch.
pub const SUCCESS_MULTIPLIER: f64 = 1.5;

/// Growth factor applied after a failed status fetch.
pub const FAILURE_MULTIPLIER: f64 = 2.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Result of the status check that just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Success,
    Failure,
}

impl PollOutcome {
    pub fn from_success(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Tunable parameters for the polling backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first check, and the floor for every later delay.
    pub base_interval: Duration,
    /// Upper bound on the delay between checks.
    pub max_interval: Duration,
    /// Factor applied after a successful check.
    pub success_multiplier: f64,
    /// Factor applied after a failed check.
    pub failure_multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(BASE_POLL_INTERVAL_MS),
            max_interval: Duration::from_millis(MAX_POLL_INTERVAL_MS),
            success_multiplier: SUCCESS_MULTIPLIER,
            failure_multiplier: FAILURE_MULTIPLIER,
        }
    }
}

impl BackoffConfig {
    /// Reject configurations that would shrink the interval or never let
    /// the poller start.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.base_interval.is_zero() {
            return Err(CoreError::Validation(
                "Base poll interval must be greater than zero".to_string(),
            ));
        }
        if self.base_interval > self.max_interval {
            return Err(CoreError::Validation(format!(
                "Base poll interval ({}ms) must not exceed the maximum ({}ms)",
                self.base_interval.as_millis(),
                self.max_interval.as_millis()
            )));
        }
        for (name, value) in [
            ("success", self.success_multiplier),
            ("failure", self.failure_multiplier),
        ] {
            if !value.is_finite() || value < 1.0 {
                return Err(CoreError::Validation(format!(
                    "The {name} multiplier must be a finite value >= 1.0, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Shorthand for [`next_interval`] with this config.
    pub fn next(&self, current: Duration, outcome: PollOutcome) -> Duration {
        next_interval(current, outcome, self)
    }
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// Calculate the delay before the next status check.
///
/// The result always lies within
/// `[config.base_interval, config.max_interval]`.
pub fn next_interval(current: Duration, outcome: PollOutcome, config: &BackoffConfig) -> Duration {
    let factor = match outcome {
        PollOutcome::Success => config.success_multiplier,
        PollOutcome::Failure => config.failure_multiplier,
    };
    let next_ms = (current.as_millis() as f64 * factor).round() as u64;
    Duration::from_millis(next_ms)
        .max(config.base_interval)
        .min(config.max_interval)
}
