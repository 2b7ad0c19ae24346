//! Retry policy with exponential backoff
//!
//! The policy is plain data plus pure functions so the delays it produces
//! can be checked without a network or a clock. [`crate::api::InatClient`]
//! drives the actual loop.

use crate::error::{CliError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Retry and backoff configuration for a single logical API call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per call. Zero is treated as one: a call is always tried.
    pub retries: u32,

    /// Base delay, doubled per attempt
    pub retry_delay: Duration,

    /// Upper bound for the computed backoff (server hints may exceed it)
    pub max_backoff: Duration,

    /// Multiplier applied to the limiter's spacing after each 429
    pub throttle_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            throttle_factor: 1.5,
        }
    }
}

impl RetryPolicy {
    /// Number of attempts actually made for one call.
    pub fn attempts(&self) -> u32 {
        self.retries.max(1)
    }

    /// Delay before the attempt following `attempt` (zero-based).
    ///
    /// `min(retry_delay * 2^attempt, max_backoff)`, raised to the server's
    /// retry hint when that is longer.
    pub fn backoff(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let factor = 2f64.powi(attempt.min(63) as i32);
        let computed = Duration::try_from_secs_f64(self.retry_delay.as_secs_f64() * factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff);

        match hint {
            Some(hint) => computed.max(hint),
            None => computed,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.throttle_factor.is_finite() || self.throttle_factor < 1.0 {
            return Err(CliError::config(format!(
                "throttle factor must be at least 1.0, got {}",
                self.throttle_factor
            )));
        }
        Ok(())
    }
}

/// Parse a `Retry-After` header value.
///
/// Accepts delta-seconds (fractional values tolerated) or an HTTP date; a
/// date in the past yields a zero delay. Anything else is ignored.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
