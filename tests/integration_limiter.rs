//! Integration test: shared limiter under concurrent callers, and the composed
//! `Resilient` handle (limiter + timeout + retry + fallback).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notion_resilience::diagnostics::Verbosity;
use notion_resilience::{ApiError, ErrorKind, RateLimiter, Resilient, RetryOutcome, RetryPolicy};
use tokio::task::JoinSet;
use tokio::time::Instant;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(start_paused = true)]
async fn five_calls_never_exceed_two_in_flight_and_keep_spacing() {
    let limiter = Arc::new(RateLimiter::new(2, ms(100)));
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut set = JoinSet::new();
    for i in 0..5u32 {
        let limiter = Arc::clone(&limiter);
        let dispatched = Arc::clone(&dispatched);
        let peak = Arc::clone(&peak);
        set.spawn(async move {
            let observer = Arc::clone(&limiter);
            limiter
                .run(|| async move {
                    dispatched.lock().unwrap().push(Instant::now());
                    peak.fetch_max(observer.in_flight(), Ordering::SeqCst);
                    tokio::time::sleep(ms(250)).await;
                    peak.fetch_max(observer.in_flight(), Ordering::SeqCst);
                    i
                })
                .await
        });
    }

    let mut done = Vec::new();
    while let Some(res) = set.join_next().await {
        done.push(res.unwrap());
    }
    done.sort_unstable();
    assert_eq!(done, vec![0, 1, 2, 3, 4]);

    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(limiter.in_flight(), 0);

    let mut times = dispatched.lock().unwrap().clone();
    times.sort();
    assert_eq!(times.len(), 5);
    for pair in times.windows(2) {
        assert!(
            pair[1] - pair[0] >= ms(100),
            "dispatches {:?} apart",
            pair[1] - pair[0]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn failing_calls_release_their_slots() {
    let limiter = Arc::new(RateLimiter::new(1, Duration::ZERO));

    for _ in 0..3 {
        let out = limiter
            .run(|| async { Err::<(), _>(ApiError::http(500)) })
            .await;
        assert!(out.is_err());
    }
    assert_eq!(limiter.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn resilient_retries_a_timed_out_attempt() {
    let r = Resilient::new(
        RetryPolicy::new(3, ms(100)),
        ms(50),
        Arc::new(RateLimiter::new(1, Duration::ZERO)),
    );
    let calls = Arc::new(AtomicUsize::new(0));

    let out = r
        .call("getPage", || {
            let k = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if k == 1 {
                    tokio::time::sleep(ms(1000)).await;
                }
                Ok::<_, ApiError>(k)
            }
        })
        .await;

    assert_eq!(out, RetryOutcome::Success(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(r.limiter().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn resilient_fetch_falls_back_when_every_attempt_times_out() {
    let r = Resilient::new(
        RetryPolicy::new(2, ms(10)),
        ms(20),
        Arc::new(RateLimiter::default()),
    )
    .with_verbosity(Verbosity::Detailed);
    let start = Instant::now();

    let title = r
        .fetch(
            "getPageTitle",
            || async {
                tokio::time::sleep(ms(60_000)).await;
                Ok::<_, ApiError>("live".to_string())
            },
            "fallback".to_string(),
        )
        .await;

    assert_eq!(title, "fallback");
    // Two 20ms deadlines, one 10ms pause, 100ms spacing before the second dispatch.
    assert!(start.elapsed() < ms(1000));
}

#[tokio::test(start_paused = true)]
async fn resilient_non_retryable_reports_kind() {
    let r = Resilient::new(RetryPolicy::default(), ms(1000), Arc::new(RateLimiter::default()));

    let out = r
        .call("queryDatabase", || async {
            Err::<(), _>(anyhow::Error::new(ApiError::http(404)))
        })
        .await;

    assert_eq!(
        out,
        RetryOutcome::NoResult {
            attempts: 1,
            last_error: ErrorKind::NonRetryable,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn clones_share_the_concurrency_bound() {
    let r = Resilient::new(
        RetryPolicy::default(),
        ms(10_000),
        Arc::new(RateLimiter::new(2, Duration::ZERO)),
    );
    let peak = Arc::new(AtomicUsize::new(0));

    let mut set = JoinSet::new();
    for i in 0..6usize {
        let r = r.clone();
        let peak = Arc::clone(&peak);
        set.spawn(async move {
            let observer = Arc::clone(r.limiter());
            r.fetch_or_default("getPost", move || {
                let observer = Arc::clone(&observer);
                let peak = Arc::clone(&peak);
                async move {
                    peak.fetch_max(observer.in_flight(), Ordering::SeqCst);
                    tokio::time::sleep(ms(100)).await;
                    Ok::<_, ApiError>(i)
                }
            })
            .await
        });
    }

    let mut total = 0;
    while let Some(res) = set.join_next().await {
        total += res.unwrap();
    }
    assert_eq!(total, (0..6).sum::<usize>());
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(r.limiter().in_flight(), 0);
}
