//! Concurrency and spacing limiter for outbound API calls.
//!
//! A single `RateLimiter` is created at start-up and shared (via `Arc`) by
//! every call site that talks to the same API, so both limits hold across
//! all callers:
//! - at most `max_concurrent` operations are in flight at once;
//! - consecutive dispatches are at least `min_interval` apart.
//!
//! Admission waits on a Tokio semaphore rather than polling. The semaphore
//! is FIFO, so under sustained load waiters are admitted in arrival order.
//! Spacing is decided under an async lock held across the spacing sleep, so
//! a caller that resumes after sleeping never acts on a stale timestamp.

mod guard;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

use crate::config::LimiterConfig;
use guard::InFlightGuard;

pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct RateLimiter {
    max_concurrent: usize,
    min_interval: Duration,
    slots: Semaphore,
    in_flight: AtomicUsize,
    last_dispatch: Mutex<Option<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT, DEFAULT_MIN_INTERVAL)
    }
}

impl RateLimiter {
    /// Create a limiter. `max_concurrent` is clamped to at least 1.
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            max_concurrent,
            min_interval,
            slots: Semaphore::new(max_concurrent),
            in_flight: AtomicUsize::new(0),
            last_dispatch: Mutex::new(None),
        }
    }

    pub fn from_config(cfg: &LimiterConfig) -> Self {
        Self::new(cfg.max_concurrent, cfg.min_interval())
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Number of operations currently dispatched and not yet settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Wait for a slot, honour the spacing floor, then run `op`.
    ///
    /// The slot is released when `op` settles, whatever its outcome, or when
    /// the returned future is dropped.
    pub async fn run<F, Fut, T>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let permit = self
            .slots
            .acquire()
            .await
            .expect("limiter semaphore is never closed");

        let _guard = {
            let mut last = self.last_dispatch.lock().await;
            if let Some(prev) = *last {
                let ready_at = prev + self.min_interval;
                if Instant::now() < ready_at {
                    tracing::trace!(
                        wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                        "spacing api call"
                    );
                    tokio::time::sleep_until(ready_at).await;
                }
            }
            *last = Some(Instant::now());
            InFlightGuard::admit(&self.in_flight, permit)
        };
        tracing::trace!(in_flight = self.in_flight(), "api call dispatched");

        op().await
    }
}
