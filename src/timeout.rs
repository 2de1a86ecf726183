//! Timeout enforcement.
//!
//! Races an operation against a timer. Uses Tokio's timeout facilities: the
//! timer and the losing future are dropped on every exit path, so a timed-out
//! operation can never resolve later. Nothing here retries; wrap the call in
//! [`crate::retry::run_with_retry`] for per-attempt deadlines.

use std::future::Future;
use std::time::Duration;

/// Default deadline for a single API call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// The timer fired before the operation settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out after {}ms", .after.as_millis())]
pub struct TimedOut {
    pub after: Duration,
}

/// Run `fut` with a deadline of `after`.
///
/// If the future settles first its outcome is returned unchanged; otherwise
/// `TimedOut` is converted into the operation's error type.
pub async fn with_timeout<F, T, E>(fut: F, after: Duration) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimedOut>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(settled) => settled,
        Err(_elapsed) => {
            tracing::debug!(timeout_ms = after.as_millis() as u64, "operation timed out");
            Err(TimedOut { after }.into())
        }
    }
}
