//! Retry policy: maps a delivery-attempt count to the next action on transient failure.

use std::time::Duration;

/// What to do with an envelope after a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Hide the envelope for `delay`, then redeliver.
    Reschedule { delay: Duration },

    /// Out of reschedules; return the envelope to the queue immediately.
    Abandon,
}

/// Exponential reschedule schedule with a fixed number of reschedules.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay for the first reschedule (attempt count 0).
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Attempt counts below this are rescheduled; the rest are abandoned.
    pub max_reschedules: u32,
}

impl Default for RetryPolicy {
    /// 5s, 25s, 125s, then abandon.
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            multiplier: 5.0,
            max_reschedules: 3,
        }
    }
}

impl RetryPolicy {
    /// Delay for a given attempt count: `base_delay * multiplier^attempts`.
    ///
    /// `attempts` is the count read off the envelope at failure time (0-indexed).
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = i32::try_from(attempts).unwrap_or(i32::MAX);
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::MAX)
    }

    pub fn decide(&self, attempts: u32) -> RetryDecision {
        if attempts >= self.max_reschedules {
            RetryDecision::Abandon
        } else {
            RetryDecision::Reschedule {
                delay: self.next_delay(attempts),
            }
        }
    }
}
