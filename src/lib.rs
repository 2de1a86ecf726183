//! Resilience layer for outbound Notion API calls: retry with backoff,
//! per-call timeouts, and a shared concurrency/spacing limiter.
//!
//! ```text
//! Resilient::fetch(context, op, fallback)
//!     → retry      (classify failure, back off, retry up to budget)
//!       → limiter  (wait for slot, keep dispatch spacing)
//!         → timeout (race op against deadline)
//!     → NoResult or panic → fallback
//! ```

pub mod config;
pub mod diagnostics;
pub mod fetch;
pub mod limiter;
pub mod logging;
pub mod retry;
pub mod timeout;

pub use config::ResilienceConfig;
pub use fetch::{safe_fetch, safe_fetch_or_default, Resilient};
pub use limiter::RateLimiter;
pub use retry::{run_with_retry, ApiError, ErrorFacts, ErrorKind, RetryOutcome, RetryPolicy};
pub use timeout::{with_timeout, TimedOut};
