//! Structured error records for failed API calls.
//!
//! Development deployments get the full record as pretty JSON; everything
//! else logs a terse `context: message` line. The environment comes from
//! `NRL_ENV` unless the config file sets `environment`.

use std::env;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::retry::ErrorFacts;

pub const ENV_VAR: &str = "NRL_ENV";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployEnv {
    Development,
    Test,
    #[default]
    Production,
}

impl DeployEnv {
    /// Read `NRL_ENV`; unset or unrecognised values mean production.
    pub fn from_env() -> Self {
        env::var(ENV_VAR)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub fn verbosity(self) -> Verbosity {
        match self {
            DeployEnv::Development => Verbosity::Detailed,
            DeployEnv::Test | DeployEnv::Production => Verbosity::Terse,
        }
    }
}

impl FromStr for DeployEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(DeployEnv::Development),
            "test" => Ok(DeployEnv::Test),
            "production" | "prod" => Ok(DeployEnv::Production),
            other => Err(format!("unknown deployment environment: {other}")),
        }
    }
}

impl fmt::Display for DeployEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployEnv::Development => write!(f, "development"),
            DeployEnv::Test => write!(f, "test"),
            DeployEnv::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Full record as pretty JSON.
    Detailed,
    /// `context: message` only.
    Terse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub code: Option<String>,
    pub status: Option<u16>,
    pub trace: Option<String>,
}

/// One diagnostic record. `extra` fields are flattened into the top level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorLog {
    pub timestamp: DateTime<Utc>,
    pub context: String,
    pub error: ErrorDetail,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorLog {
    pub fn new<E: ErrorFacts + ?Sized>(context: &str, error: &E, extra: Map<String, Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            context: context.to_string(),
            error: ErrorDetail {
                message: error.message().into_owned(),
                code: error.code().map(str::to_string),
                status: error.status(),
                trace: error.trace(),
            },
            extra,
        }
    }

    /// Render according to `verbosity`.
    pub fn render(&self, verbosity: Verbosity) -> String {
        match verbosity {
            Verbosity::Detailed => match serde_json::to_string_pretty(self) {
                Ok(json) => json,
                Err(_) => self.terse(),
            },
            Verbosity::Terse => self.terse(),
        }
    }

    fn terse(&self) -> String {
        format!("{}: {}", self.context, self.error.message)
    }
}

/// Build, log and return a diagnostic record for a failed call.
pub fn log_api_error<E: ErrorFacts + ?Sized>(
    context: &str,
    error: &E,
    extra: Map<String, Value>,
    verbosity: Verbosity,
) -> ErrorLog {
    let record = ErrorLog::new(context, error, extra);
    tracing::error!(
        context = %record.context,
        code = record.error.code.as_deref(),
        status = record.error.status,
        "[api error] {}",
        record.render(verbosity)
    );
    record
}

/// Like [`log_api_error`] but at debug level, for per-attempt records whose
/// outcome the retry loop already reports.
pub fn note_api_error<E: ErrorFacts + ?Sized>(
    context: &str,
    error: &E,
    extra: Map<String, Value>,
    verbosity: Verbosity,
) -> ErrorLog {
    let record = ErrorLog::new(context, error, extra);
    tracing::debug!(
        context = %record.context,
        code = record.error.code.as_deref(),
        status = record.error.status,
        "[api error] {}",
        record.render(verbosity)
    );
    record
}
