//! Fallback-returning fetch helpers.
//!
//! These are the outer boundary of the crate: they always resolve to either
//! the operation's value or the caller's fallback. Exhausted retries,
//! non-retryable errors and panics inside the operation all end up as the
//! fallback, logged but never propagated.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Map;
use tracing::Instrument;

use crate::config::ResilienceConfig;
use crate::diagnostics::{self, Verbosity};
use crate::limiter::RateLimiter;
use crate::retry::{run_with_retry, ErrorFacts, RetryOutcome, RetryPolicy};
use crate::timeout::{with_timeout, TimedOut};

/// Retry `op` under `policy`; return `fallback` if no result is produced.
pub async fn safe_fetch<F, Fut, T, E>(policy: &RetryPolicy, op: F, fallback: T) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ErrorFacts,
{
    or_fallback(run_with_retry(policy, op), fallback).await
}

/// [`safe_fetch`] with `T::default()` as the fallback.
pub async fn safe_fetch_or_default<F, Fut, T, E>(policy: &RetryPolicy, op: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ErrorFacts,
    T: Default,
{
    safe_fetch(policy, op, T::default()).await
}

async fn or_fallback<Fut, T>(retried: Fut, fallback: T) -> T
where
    Fut: Future<Output = RetryOutcome<T>>,
{
    match AssertUnwindSafe(retried).catch_unwind().await {
        Ok(RetryOutcome::Success(v)) => v,
        Ok(RetryOutcome::NoResult {
            attempts,
            last_error,
        }) => {
            tracing::warn!(attempts, last_error = %last_error, "using fallback data");
            fallback
        }
        Err(panic) => {
            tracing::error!(
                panic = %panic_message(panic.as_ref()),
                "api call panicked, using fallback data"
            );
            fallback
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Retry, per-attempt timeout and shared rate limiting in one handle.
///
/// Each attempt waits for a limiter slot, then races the operation against
/// the timeout; the whole sequence is retried under the policy. Clones share
/// the same limiter.
///
/// `op` is called once per attempt before the limiter admits it, so the
/// returned future must do the actual work (as an `async` block or `async fn`
/// does); nothing runs until the slot is granted.
#[derive(Debug, Clone)]
pub struct Resilient {
    policy: RetryPolicy,
    timeout: Duration,
    limiter: Arc<RateLimiter>,
    verbosity: Verbosity,
}

impl Resilient {
    pub fn new(policy: RetryPolicy, timeout: Duration, limiter: Arc<RateLimiter>) -> Self {
        Self {
            policy,
            timeout,
            limiter,
            verbosity: Verbosity::Terse,
        }
    }

    /// Build from config with a fresh limiter.
    pub fn from_config(cfg: &ResilienceConfig) -> Self {
        Self::new(
            cfg.retry.policy(),
            cfg.timeout.duration(),
            Arc::new(RateLimiter::from_config(&cfg.limiter)),
        )
        .with_verbosity(cfg.deploy_env().verbosity())
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run `op` through limiter, timeout and retry; failed attempts are
    /// recorded under `context`.
    pub async fn call<F, Fut, T, E>(&self, context: &str, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorFacts + From<TimedOut>,
    {
        let limiter = &self.limiter;
        let timeout = self.timeout;
        let verbosity = self.verbosity;
        let mut attempt = 0u32;

        let attempt_once = move || {
            attempt += 1;
            let n = attempt;
            let fut = op();
            async move {
                let res = limiter.run(|| with_timeout(fut, timeout)).await;
                if let Err(e) = &res {
                    let mut extra = Map::new();
                    extra.insert("attempt".to_string(), n.into());
                    diagnostics::note_api_error(context, e, extra, verbosity);
                }
                res
            }
        };

        run_with_retry(&self.policy, attempt_once)
            .instrument(tracing::info_span!("api_call", context = %context))
            .await
    }

    /// [`Resilient::call`], returning `fallback` when no result is produced.
    pub async fn fetch<F, Fut, T, E>(&self, context: &str, op: F, fallback: T) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorFacts + From<TimedOut>,
    {
        or_fallback(self.call(context, op), fallback).await
    }

    /// [`Resilient::fetch`] with `T::default()` as the fallback.
    pub async fn fetch_or_default<F, Fut, T, E>(&self, context: &str, op: F) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ErrorFacts + From<TimedOut>,
        T: Default,
    {
        self.fetch(context, op, T::default()).await
    }
}

impl Default for Resilient {
    fn default() -> Self {
        Self::from_config(&ResilienceConfig::default())
    }
}
