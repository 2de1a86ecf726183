//! Classify error facts into retry policy error kinds.

use super::error::ErrorFacts;
use super::policy::ErrorKind;

const NETWORK_CODES: &[&str] = &["ECONNRESET", "ENOTFOUND"];

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        429 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::Server(code),
        _ => ErrorKind::NonRetryable,
    }
}

/// Classify an error by its facts.
///
/// Checks run in priority order: rate limit, timeout, network, 5xx status.
/// Whatever matches none of them is not retried.
pub fn classify<E: ErrorFacts + ?Sized>(e: &E) -> ErrorKind {
    let message = e.message();
    let code = e.code();
    let status = e.status();

    if code == Some("rate_limited") || status == Some(429) || message.contains("rate_limited") {
        return ErrorKind::RateLimited;
    }
    if code == Some("ETIMEDOUT") || message.contains("timeout") || message.contains("ETIMEDOUT") {
        return ErrorKind::Timeout;
    }
    if code.is_some_and(|c| NETWORK_CODES.contains(&c))
        || message.contains("network")
        || message.contains("connect")
    {
        return ErrorKind::Network;
    }
    match status {
        Some(s) => classify_http_status(s),
        None => ErrorKind::NonRetryable,
    }
}
