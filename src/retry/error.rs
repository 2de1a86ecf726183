//! Error facts the retry classifier inspects, and the crate's concrete API error.

use std::borrow::Cow;
use std::fmt;
use std::io;

use crate::timeout::TimedOut;

/// Inspectable fields of a failed API call.
///
/// Any error type an operation returns must expose these so the classifier
/// can pick a backoff. Only `message` is required; `code` is a symbolic error
/// code (`"rate_limited"`, `"ETIMEDOUT"`, `"ECONNRESET"`, ...) and `status` an
/// HTTP status.
pub trait ErrorFacts {
    fn message(&self) -> Cow<'_, str>;

    fn code(&self) -> Option<&str> {
        None
    }

    fn status(&self) -> Option<u16> {
        None
    }

    /// Cause chain, outermost first, for diagnostic dumps.
    fn trace(&self) -> Option<String> {
        None
    }
}

/// Error returned by a single API call (HTTP status, transport code, or both).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    /// Error carrying only an HTTP status, e.g. `ApiError::http(503)`.
    pub fn http(status: u16) -> Self {
        Self {
            message: format!("HTTP {}", status),
            code: None,
            status: Some(status),
        }
    }

    /// Error carrying a symbolic code, e.g. `ApiError::coded("ECONNRESET", "socket hang up")`.
    pub fn coded(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<TimedOut> for ApiError {
    fn from(t: TimedOut) -> Self {
        ApiError::coded("ETIMEDOUT", t.to_string())
    }
}

impl ErrorFacts for ApiError {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.message)
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    fn status(&self) -> Option<u16> {
        self.status
    }
}

impl ErrorFacts for TimedOut {
    fn message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn code(&self) -> Option<&str> {
        Some("ETIMEDOUT")
    }
}

/// Transport failures surfaced as `std::io::Error` map onto the same codes
/// the classifier knows from HTTP client libraries.
impl ErrorFacts for io::Error {
    fn message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn code(&self) -> Option<&str> {
        match self.kind() {
            io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Some("ECONNRESET"),
            io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
            _ => None,
        }
    }
}

/// `anyhow` errors are classified by the first `ApiError`, `TimedOut` or
/// `io::Error` in their chain. The message is the whole chain joined with
/// `": "`, so substring checks see wrapped causes, not just the outer context.
impl ErrorFacts for anyhow::Error {
    fn message(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{:#}", self))
    }

    fn code(&self) -> Option<&str> {
        self.chain().find_map(|cause| {
            if let Some(api) = cause.downcast_ref::<ApiError>() {
                api.code()
            } else if let Some(t) = cause.downcast_ref::<TimedOut>() {
                t.code()
            } else {
                cause.downcast_ref::<io::Error>().and_then(|e| e.code())
            }
        })
    }

    fn status(&self) -> Option<u16> {
        self.chain()
            .find_map(|cause| cause.downcast_ref::<ApiError>().and_then(|api| api.status))
    }

    fn trace(&self) -> Option<String> {
        let causes: Vec<String> = self.chain().map(|c| c.to_string()).collect();
        if causes.len() > 1 {
            Some(causes.join("\n  caused by: "))
        } else {
            None
        }
    }
}
