//! Client-side request spacing
//!
//! The iNaturalist API asks clients to stay at or below roughly one request
//! per second. [`RateLimiter`] enforces a minimum interval between calls and
//! counts them. It has a single owner (the client it is moved into) and is
//! mutated through `&mut self`, so there is no locking.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Spacing a zero delay starts from once the server throttles.
pub const THROTTLED_FLOOR: Duration = Duration::from_millis(100);

/// Minimum-interval limiter with adaptive slowdown
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    max_min_delay: Duration,
    last_call: Option<Instant>,
    call_count: u64,
}

impl RateLimiter {
    /// `max_min_delay` caps how far [`RateLimiter::slow_down`] may raise the
    /// spacing. It is never used to lower `min_delay`.
    pub fn new(min_delay: Duration, max_min_delay: Duration) -> Self {
        Self {
            min_delay,
            max_min_delay,
            last_call: None,
            call_count: 0,
        }
    }

    /// Wait until `min_delay` has passed since the previous call, then
    /// record a new call. The first call never waits.
    pub async fn wait_then_record(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait = self.min_delay - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "Rate limiting before next request");
                tokio::time::sleep(wait).await;
            }
        }

        self.last_call = Some(Instant::now());
        self.call_count += 1;
    }

    /// Permanently widen the spacing after the server throttled us.
    ///
    /// The new spacing is `min_delay * factor`, capped at the ceiling, and
    /// never lower than the current value. A zero spacing is first raised
    /// to [`THROTTLED_FLOOR`] so throttling still has an effect.
    pub fn slow_down(&mut self, factor: f64) {
        let base = if self.min_delay.is_zero() {
            THROTTLED_FLOOR
        } else {
            self.min_delay
        };
        let scaled = Duration::try_from_secs_f64(base.as_secs_f64() * factor)
            .unwrap_or(self.max_min_delay);
        let next = scaled.min(self.max_min_delay).max(self.min_delay);

        if next > self.min_delay {
            warn!(
                previous_ms = self.min_delay.as_millis() as u64,
                current_ms = next.as_millis() as u64,
                "API is throttling requests, increasing delay between calls"
            );
            self.min_delay = next;
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Total calls recorded so far.
    pub fn call_count(&self) -> u64 {
        self.call_count
    }
}
