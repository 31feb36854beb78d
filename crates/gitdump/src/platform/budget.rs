//! Reactive rate budgeting.
//!
//! Before walking a repository's issues (and again before each comment fetch)
//! the engine asks the tracker how much of its call budget remains. When the
//! budget is low but not yet exhausted, the caller sleeps until the budget
//! resets, plus a safety margin.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::errors::Result;
use super::types::{IssueTracker, RateLimitInfo};

/// Below this many remaining calls the walk cools down.
pub const DEFAULT_BUDGET_THRESHOLD: usize = 100;

/// Extra wait added after the reported reset time.
pub const DEFAULT_COOLDOWN_MARGIN: Duration = Duration::from_secs(60);

/// Outcome of a budget check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetCheck {
    /// Enough calls remain.
    Available { remaining: usize },
    /// No calls remain. Not waited on: the next API call reports the limit.
    Exhausted,
    /// The budget was low and the caller slept this long.
    CooledDown(Duration),
}

/// How long to cool down for a given budget, or `None` when no wait applies.
///
/// Waits only when `0 < remaining < threshold`. A reset time already in the
/// past contributes nothing beyond the margin.
pub fn cooldown_for(
    info: &RateLimitInfo,
    now: DateTime<Utc>,
    threshold: usize,
    margin: Duration,
) -> Option<Duration> {
    if info.remaining == 0 || info.remaining >= threshold {
        return None;
    }
    let until_reset = (info.reset_at - now).to_std().unwrap_or(Duration::ZERO);
    Some(until_reset + margin)
}

/// Tracks the tracker's remaining call budget and enforces cooldowns.
///
/// Checks are serialized: while one caller cools down, concurrent callers
/// queue behind it and re-query the budget once it returns, so a single low
/// budget never puts several tasks to sleep for the full period each.
#[derive(Debug)]
pub struct RateBudget {
    threshold: usize,
    margin: Duration,
    gate: Mutex<()>,
}

impl Default for RateBudget {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET_THRESHOLD, DEFAULT_COOLDOWN_MARGIN)
    }
}

impl RateBudget {
    pub fn new(threshold: usize, margin: Duration) -> Self {
        Self {
            threshold,
            margin,
            gate: Mutex::new(()),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Query the budget and sleep if it is running low.
    ///
    /// # Errors
    /// Propagates the tracker error if the budget cannot be queried.
    pub async fn check_budget<C: IssueTracker + ?Sized>(&self, client: &C) -> Result<BudgetCheck> {
        let _gate = self.gate.lock().await;
        let info = client.get_rate_limit().await?;

        match cooldown_for(&info, Utc::now(), self.threshold, self.margin) {
            Some(wait) => {
                tracing::info!(
                    remaining = info.remaining,
                    limit = info.limit,
                    reset_at = %info.reset_at,
                    wait_secs = wait.as_secs(),
                    "Rate budget low, cooling down"
                );
                tokio::time::sleep(wait).await;
                Ok(BudgetCheck::CooledDown(wait))
            }
            None if info.remaining == 0 => {
                tracing::warn!(
                    limit = info.limit,
                    reset_at = %info.reset_at,
                    "Rate budget exhausted"
                );
                Ok(BudgetCheck::Exhausted)
            }
            None => {
                tracing::debug!(remaining = info.remaining, limit = info.limit, "Rate budget ok");
                Ok(BudgetCheck::Available {
                    remaining: info.remaining,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeDelta;

    use super::*;
    use crate::platform::PlatformError;
    use crate::record::Attributes;

    struct FixedBudget {
        remaining: usize,
        reset_in: TimeDelta,
        queries: AtomicUsize,
    }

    impl FixedBudget {
        fn new(remaining: usize, reset_in: TimeDelta) -> Self {
            Self {
                remaining,
                reset_in,
                queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IssueTracker for FixedBudget {
        async fn get_rate_limit(&self) -> Result<RateLimitInfo> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(RateLimitInfo {
                limit: 5000,
                remaining: self.remaining,
                reset_at: Utc::now() + self.reset_in,
            })
        }

        async fn list_repositories(&self, _: Option<&[String]>) -> Result<Vec<Attributes>> {
            Err(PlatformError::api("unused"))
        }

        async fn get_organization(&self, _: &str) -> Result<Attributes> {
            Err(PlatformError::api("unused"))
        }

        async fn list_issues(&self, _: &str) -> Result<Vec<Attributes>> {
            Err(PlatformError::api("unused"))
        }

        async fn list_comments(
            &self,
            _: &str,
            _: u64,
            _: DateTime<Utc>,
        ) -> Result<Vec<Attributes>> {
            Err(PlatformError::api("unused"))
        }
    }

    fn info(remaining: usize, reset_at: DateTime<Utc>) -> RateLimitInfo {
        RateLimitInfo {
            limit: 5000,
            remaining,
            reset_at,
        }
    }

    #[test]
    fn test_cooldown_only_between_zero_and_threshold() {
        let now = Utc::now();
        let reset = now + TimeDelta::seconds(30);
        let margin = Duration::from_secs(60);

        assert_eq!(cooldown_for(&info(0, reset), now, 100, margin), None);
        assert_eq!(cooldown_for(&info(100, reset), now, 100, margin), None);
        assert_eq!(cooldown_for(&info(4999, reset), now, 100, margin), None);
        assert_eq!(
            cooldown_for(&info(1, reset), now, 100, margin),
            Some(Duration::from_secs(90))
        );
        assert_eq!(
            cooldown_for(&info(99, reset), now, 100, margin),
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn test_cooldown_with_reset_in_the_past_is_margin_only() {
        let now = Utc::now();
        let wait = cooldown_for(
            &info(10, now - TimeDelta::seconds(300)),
            now,
            100,
            Duration::from_secs(60),
        );
        assert_eq!(wait, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_check_budget_available_returns_immediately() {
        let client = FixedBudget::new(4000, TimeDelta::seconds(600));
        let budget = RateBudget::default();
        let outcome = budget.check_budget(&client).await.unwrap();
        assert_eq!(outcome, BudgetCheck::Available { remaining: 4000 });
    }

    #[tokio::test]
    async fn test_check_budget_exhausted_does_not_wait() {
        let client = FixedBudget::new(0, TimeDelta::seconds(3600));
        let budget = RateBudget::default();
        let start = tokio::time::Instant::now();
        let outcome = budget.check_budget(&client).await.unwrap();
        assert_eq!(outcome, BudgetCheck::Exhausted);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_budget_low_sleeps_until_reset_plus_margin() {
        let client = FixedBudget::new(50, TimeDelta::seconds(120));
        let budget = RateBudget::default();
        let start = tokio::time::Instant::now();

        let outcome = budget.check_budget(&client).await.unwrap();

        let BudgetCheck::CooledDown(wait) = outcome else {
            panic!("expected a cooldown, got {outcome:?}");
        };
        assert!(wait > Duration::from_secs(170) && wait <= Duration::from_secs(180));
        assert!(start.elapsed() >= wait);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_checks_are_serialized() {
        let client = Arc::new(FixedBudget::new(50, TimeDelta::seconds(0)));
        let budget = Arc::new(RateBudget::new(100, Duration::from_secs(10)));

        let a = {
            let (client, budget) = (Arc::clone(&client), Arc::clone(&budget));
            tokio::spawn(async move { budget.check_budget(client.as_ref()).await })
        };
        let b = {
            let (client, budget) = (Arc::clone(&client), Arc::clone(&budget));
            tokio::spawn(async move { budget.check_budget(client.as_ref()).await })
        };

        assert!(matches!(a.await.unwrap(), Ok(BudgetCheck::CooledDown(_))));
        assert!(matches!(b.await.unwrap(), Ok(BudgetCheck::CooledDown(_))));
        assert_eq!(client.queries.load(Ordering::SeqCst), 2);
    }
}
