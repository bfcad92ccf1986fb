use std::num::NonZeroUsize;
use std::time::Duration;

/// A bounded retry budget with linear backoff.
///
/// Attempts are counted from 1. After attempt `n` fails, the caller may try
/// again only while `n < max_attempts`, and waits either the hint the
/// upstream supplied or `n * backoff_step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: NonZeroUsize,
    backoff_step: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts in total, backing off one second more each time.
    fn default() -> Self {
        Self {
            max_attempts: NonZeroUsize::MIN.saturating_add(2),
            backoff_step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: NonZeroUsize, backoff_step: Duration) -> Self {
        Self {
            max_attempts,
            backoff_step,
        }
    }

    /// Total attempts allowed, including the first.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts.get()
    }

    pub fn backoff_step(&self) -> Duration {
        self.backoff_step
    }

    /// Whether another attempt may follow attempt number `attempt`.
    pub fn has_attempts_left(&self, attempt: usize) -> bool {
        attempt < self.max_attempts.get()
    }

    /// Linear backoff after attempt number `attempt`.
    pub fn linear_backoff(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt).unwrap_or(u32::MAX);
        self.backoff_step.saturating_mul(factor)
    }

    /// How long to wait before retrying after attempt number `attempt`.
    ///
    /// Returns `None` once the budget is spent. A server supplied `hint`
    /// takes precedence over the computed backoff.
    pub fn delay_after(&self, attempt: usize, hint: Option<Duration>) -> Option<Duration> {
        if !self.has_attempts_left(attempt) {
            return None;
        }
        Some(hint.unwrap_or_else(|| self.linear_backoff(attempt)))
    }
}
