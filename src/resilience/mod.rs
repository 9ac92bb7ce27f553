//! Resilience
//!
//! Retry policy and the executor that applies it to authenticated calls.
//!
//! - **Retry**: exponential backoff with jitter, bounded per logical call
//! - **Executor**: failure classification, 401 re-authentication, correlation headers

pub mod executor;
pub mod retry;

pub use executor::{ApiResponse, AuthenticatedCall, ResilientExecutor};
pub use retry::{RetryBudget, RetryConfig, RetryStats, DEFAULT_RETRY_CONFIG};
