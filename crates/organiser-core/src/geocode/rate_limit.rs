use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use super::{GeocodeError, LocationResult, ReverseGeocoder};
use crate::media::Coordinate;

/// Throttling and retry settings for an external geocoding service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Minimum time between the starts of two successive calls
    pub min_delay: Duration,
    /// Extra attempts after a failed call
    pub max_retries: u32,
    /// Pause before each retry
    pub error_wait: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_retries: 2,
            error_wait: Duration::from_secs(2),
        }
    }
}

impl RateLimitPolicy {
    /// No waiting and no retries.
    pub fn unthrottled() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_retries: 0,
            error_wait: Duration::ZERO,
        }
    }
}

/// Wraps a geocoder so calls are spaced by the policy's minimum delay and
/// failed calls are retried.
pub struct RateLimited<G> {
    inner: G,
    policy: RateLimitPolicy,
    last_call: Mutex<Option<Instant>>,
}

impl<G> RateLimited<G> {
    pub fn new(inner: G, policy: RateLimitPolicy) -> Self {
        Self {
            inner,
            policy,
            last_call: Mutex::new(None),
        }
    }

    /// Sleep until the minimum delay since the previous call has passed.
    fn wait_turn(&self) {
        let mut last = self.last_call.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.policy.min_delay {
                thread::sleep(self.policy.min_delay - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

impl<G: ReverseGeocoder> ReverseGeocoder for RateLimited<G> {
    fn reverse(
        &self,
        coord: &Coordinate,
        language: &str,
        exactly_one: bool,
    ) -> Result<Option<LocationResult>, GeocodeError> {
        let mut attempt = 0;
        loop {
            self.wait_turn();
            match self.inner.reverse(coord, language, exactly_one) {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.policy.max_retries => {
                    attempt += 1;
                    debug!(
                        "reverse geocode attempt {} for {} failed: {}; retrying",
                        attempt,
                        coord.cache_key(),
                        e
                    );
                    thread::sleep(self.policy.error_wait);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
