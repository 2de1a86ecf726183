use std::fmt;
use std::time::Duration;

/// High-level classification of an error for retry purposes.
///
/// Derived from the error's facts (status, code, message); a best-effort
/// heuristic, not a guaranteed-correct classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// API asked us to slow down (429 or a `rate_limited` code).
    RateLimited,
    /// Operation timed out.
    Timeout,
    /// Network-level failure (connection reset, DNS, etc.).
    Network,
    /// 5xx status.
    Server(u16),
    /// Anything else; never retried.
    NonRetryable,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::NonRetryable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::RateLimited => write!(f, "rate limited"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Network => write!(f, "network error"),
            ErrorKind::Server(status) => write!(f, "server error {}", status),
            ErrorKind::NonRetryable => write!(f, "non-retryable"),
        }
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Attempt budget and backoff base.
///
/// Throttling and 5xx back off linearly (`base_delay * attempt`); timeouts
/// and network errors wait a constant `base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Attempt budget, never below one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Decide what to do after attempt `attempt` (1-based) failed with `kind`.
    ///
    /// Returns `RetryDecision::NoRetry` for non-retryable errors and once the
    /// attempt budget is spent, so no pause follows the last attempt.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.attempts() {
            return RetryDecision::NoRetry;
        }

        match kind {
            ErrorKind::NonRetryable => RetryDecision::NoRetry,
            ErrorKind::RateLimited | ErrorKind::Server(_) => {
                RetryDecision::RetryAfter(self.base_delay.saturating_mul(attempt))
            }
            ErrorKind::Timeout | ErrorKind::Network => RetryDecision::RetryAfter(self.base_delay),
        }
    }
}
