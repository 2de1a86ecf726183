use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::diagnostics::DeployEnv;
use crate::retry::RetryPolicy;

/// Retry policy parameters (`[retry]` in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per call (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds; multiplied by the attempt number for
    /// throttling and 5xx, used as-is for timeouts and network errors.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

/// Per-call deadline (`[timeout]` in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl TimeoutConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Shared limiter parameters (`[limiter]` in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Maximum API calls in flight at once across all callers.
    pub max_concurrent: usize,
    /// Minimum spacing between consecutive dispatches, in milliseconds.
    pub min_interval_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            min_interval_ms: 100,
        }
    }
}

impl LimiterConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// Global configuration loaded from `~/.config/nrl/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub timeout: TimeoutConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    /// Deployment environment; overrides `NRL_ENV` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<DeployEnv>,
}

impl ResilienceConfig {
    /// Semantic checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.timeout.timeout_ms == 0 {
            bail!("timeout.timeout_ms must be greater than 0");
        }
        if self.limiter.max_concurrent == 0 {
            bail!("limiter.max_concurrent must be at least 1");
        }
        Ok(())
    }

    /// Environment from config, else from `NRL_ENV`.
    pub fn deploy_env(&self) -> DeployEnv {
        self.environment.unwrap_or_else(DeployEnv::from_env)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("nrl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load and validate configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<ResilienceConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: ResilienceConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ResilienceConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ResilienceConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ResilienceConfig::default();
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.base_delay_ms, 1000);
        assert_eq!(cfg.timeout.timeout_ms, 10_000);
        assert_eq!(cfg.limiter.max_concurrent, 3);
        assert_eq!(cfg.limiter.min_interval_ms, 100);
        assert!(cfg.environment.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = ResilienceConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ResilienceConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: ResilienceConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, ResilienceConfig::default());
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            environment = "development"

            [retry]
            max_attempts = 5
            base_delay_ms = 250

            [limiter]
            max_concurrent = 2
        "#;
        let cfg: ResilienceConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.retry.policy(), RetryPolicy::new(5, Duration::from_millis(250)));
        assert_eq!(cfg.limiter.max_concurrent, 2);
        // Missing keys within a section keep their defaults.
        assert_eq!(cfg.limiter.min_interval(), Duration::from_millis(100));
        assert_eq!(cfg.timeout.duration(), Duration::from_secs(10));
        assert_eq!(cfg.deploy_env(), DeployEnv::Development);
    }

    #[test]
    fn validate_rejects_zero_values() {
        let mut cfg = ResilienceConfig::default();
        cfg.retry.max_attempts = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ResilienceConfig::default();
        cfg.timeout.timeout_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ResilienceConfig::default();
        cfg.limiter.max_concurrent = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_from_path_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        fs::write(&path, "[timeout]\ntimeout_ms = 2500\n").unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.timeout.duration(), Duration::from_millis(2500));

        fs::write(&path, "[retry]\nmax_attempts = 0\n").unwrap();
        assert!(load_from_path(&path).is_err());

        fs::write(&path, "retry = 3").unwrap();
        assert!(load_from_path(&path).is_err());
    }
}
