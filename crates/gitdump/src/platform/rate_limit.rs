use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default request pacing (requests per second).
pub mod rate_limits {
    /// GitHub: 5000 requests/hour is ~1.4/sec on average; 10/sec allows bursts
    /// while the hourly budget is guarded separately by `RateBudget`.
    pub const GITHUB_DEFAULT_RPS: u32 = 10;
}

/// Proactive per-request pacing backed by the governor crate.
///
/// This smooths bursts (notably page fetches of long comment threads). It is
/// independent of [`RateBudget`](super::RateBudget), which reacts to the
/// tracker's reported remaining budget.
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
    requests_per_second: u32,
}

impl ApiRateLimiter {
    /// Create a limiter allowing `requests_per_second` (0 is treated as 1).
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
            requests_per_second: rps.get(),
        }
    }

    /// Wait until the next request may be sent.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }

    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter")
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}
