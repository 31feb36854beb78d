//! Issue tracker abstraction and call budgeting.
//!
//! [`IssueTracker`] is the contract the sync engine walks. [`RateBudget`]
//! keeps the walk inside the tracker's hourly call budget, and
//! [`ApiRateLimiter`] paces individual requests.
//!
//! # Example
//!
//! ```ignore
//! use gitdump::platform::{IssueTracker, RateBudget};
//!
//! async fn issues<C: IssueTracker>(client: &C, budget: &RateBudget) -> Result<(), PlatformError> {
//!     budget.check_budget(client).await?;
//!     for issue in client.list_issues("rust-lang/rust").await? {
//!         println!("{:?}", issue.get("title"));
//!     }
//!     Ok(())
//! }
//! ```

mod budget;
mod errors;
mod rate_limit;
mod types;

pub use budget::{
    BudgetCheck, DEFAULT_BUDGET_THRESHOLD, DEFAULT_COOLDOWN_MARGIN, RateBudget, cooldown_for,
};
pub use errors::{PlatformError, Result, short_error_message};
pub use rate_limit::{ApiRateLimiter, rate_limits};
pub use types::{IssueTracker, RateLimitInfo};
