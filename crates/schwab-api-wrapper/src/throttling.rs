use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::debug;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Client-side request budget shared by every clone of the API client.
///
/// Schwab allows 120 requests per minute per application; exceeding it
/// earns a 429, so calls wait locally instead.
#[derive(Clone)]
pub struct RequestThrottle {
    limiter: Arc<DirectRateLimiter>,
    clock: DefaultClock,
    requests_per_minute: u32,
}

impl RequestThrottle {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let cells = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(cells))),
            clock: DefaultClock::default(),
            requests_per_minute: cells.get(),
        }
    }

    pub const fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Takes one cell of budget, or returns how long to wait before the
    /// next cell becomes available.
    pub fn acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Waits until a cell is available and takes it.
    pub async fn wait(&self) {
        loop {
            match self.acquire() {
                Ok(()) => return,
                Err(delay) => {
                    debug!(delay_ms = delay.as_millis() as u64, "request throttled");
                    tokio::time::sleep(delay.max(Duration::from_millis(1))).await;
                }
            }
        }
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_is_bounded_by_quota() {
        let throttle = RequestThrottle::per_minute(2);

        assert!(throttle.acquire().is_ok());
        assert!(throttle.acquire().is_ok());

        let delay = throttle.acquire().expect_err("third request should wait");
        assert!(delay > Duration::ZERO);
        assert!(delay <= Duration::from_secs(30));
    }

    #[test]
    fn zero_quota_is_clamped_to_one() {
        let throttle = RequestThrottle::per_minute(0);
        assert_eq!(throttle.requests_per_minute(), 1);
        assert!(throttle.acquire().is_ok());
        assert!(throttle.acquire().is_err());
    }

    #[tokio::test]
    async fn wait_returns_immediately_with_budget() {
        let throttle = RequestThrottle::per_minute(120);
        tokio::time::timeout(Duration::from_millis(100), throttle.wait())
            .await
            .expect("budget available");
    }
}
