//! Retry loop: run an async operation until success or policy says stop.

use std::future::Future;

use super::classify;
use super::error::ErrorFacts;
use super::policy::{ErrorKind, RetryDecision, RetryPolicy};

/// Result of a retried operation.
///
/// `NoResult` replaces the last error: exhausting the budget or hitting a
/// non-retryable failure is not an error at this layer, it is a signal for
/// the caller to fall back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Success(T),
    NoResult {
        /// Attempts actually made.
        attempts: u32,
        /// Classification of the failure that ended the loop.
        last_error: ErrorKind,
    },
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            RetryOutcome::Success(v) => Some(v),
            RetryOutcome::NoResult { .. } => None,
        }
    }

    pub fn unwrap_or(self, fallback: T) -> T {
        self.into_option().unwrap_or(fallback)
    }
}

/// Runs `op` until it succeeds or the retry policy says to stop.
/// On retryable failure, sleeps for the backoff duration then tries again.
pub async fn run_with_retry<F, Fut, T, E>(policy: &RetryPolicy, mut op: F) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ErrorFacts,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(v) => {
                if attempt > 1 {
                    tracing::debug!(attempt, max_attempts, "api call succeeded after retry");
                }
                return RetryOutcome::Success(v);
            }
            Err(e) => {
                let kind = classify::classify(&e);
                let message = e.message().into_owned();
                tracing::warn!(
                    attempt,
                    max_attempts,
                    kind = %kind,
                    error = %message,
                    "api call failed"
                );
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        if kind.is_retryable() {
                            tracing::error!(
                                attempts = attempt,
                                "api call still failing after all attempts, giving up"
                            );
                        } else {
                            tracing::error!(error = %message, "non-retryable api error");
                        }
                        return RetryOutcome::NoResult {
                            attempts: attempt,
                            last_error: kind,
                        };
                    }
                    RetryDecision::RetryAfter(d) => {
                        tracing::info!(
                            kind = %kind,
                            delay_ms = d.as_millis() as u64,
                            "retrying api call"
                        );
                        tokio::time::sleep(d).await;
                        attempt += 1;
                    }
                }
            }
        }
    }
}
