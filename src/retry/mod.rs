//! Retry and backoff policy.
//!
//! This module encapsulates error classification (throttling, timeouts,
//! network failures, 5xx) and backoff decisions so that the fetch helpers and
//! any direct caller share one consistent policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_http_status};
pub use error::{ApiError, ErrorFacts};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryOutcome};
