//! Harness settings.
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! TOML file, environment variables, and CLI flags (applied by the binary).
//!
//! ```toml
//! base_url = "http://localhost:8001/api"
//! timeout_secs = 15
//! pass_threshold = 80.0
//! concurrency = 8
//! cleanup = true
//! report = "reports/run.json"
//! ```

use crate::expectation::DEFAULT_TOLERANCE;
use crate::policy::{PassPolicy, DEFAULT_PASS_THRESHOLD};
use crate::scenario::RunSettings;
use client::{ClientConfig, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{name}: {reason}")]
    InvalidEnv { name: &'static str, reason: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Environment variables read by [`HarnessConfig::apply_env`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEnv {
    BaseUrl,
    /// Backend host without the `/api` suffix, as the web frontend configures it.
    BackendHost,
    TimeoutSecs,
    PassThreshold,
    Report,
}

impl HarnessEnv {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BaseUrl => "SEAL_HARNESS_BASE_URL",
            Self::BackendHost => "REACT_APP_BACKEND_URL",
            Self::TimeoutSecs => "SEAL_HARNESS_TIMEOUT_SECS",
            Self::PassThreshold => "SEAL_HARNESS_PASS_THRESHOLD",
            Self::Report => "SEAL_HARNESS_REPORT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub pass_threshold: f64,
    pub concurrency: usize,
    pub cleanup: bool,
    pub tolerance: f64,
    pub report: Option<PathBuf>,
    /// Path requested by `harness health`.
    pub health_path: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            concurrency: 4,
            cleanup: true,
            tolerance: DEFAULT_TOLERANCE,
            report: None,
            health_path: "/dashboard/stats".to_string(),
        }
    }
}

impl HarnessConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Defaults or `path`, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        debug!(?config, "configuration loaded");
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = read_env_nonempty(HarnessEnv::BaseUrl)? {
            self.base_url = url;
        } else if let Some(host) = read_env_nonempty(HarnessEnv::BackendHost)? {
            self.base_url = format!("{}/api", host.trim_end_matches('/'));
        }
        if let Some(value) = read_env_nonempty(HarnessEnv::TimeoutSecs)? {
            self.timeout_secs = parse_timeout_seconds(HarnessEnv::TimeoutSecs, &value)?;
        }
        if let Some(value) = read_env_nonempty(HarnessEnv::PassThreshold)? {
            self.pass_threshold = parse_threshold(HarnessEnv::PassThreshold, &value)?;
        }
        if let Some(path) = read_env_nonempty(HarnessEnv::Report)? {
            self.report = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });
        if !(0.0..=100.0).contains(&self.pass_threshold) {
            return invalid(format!(
                "pass_threshold must be between 0 and 100, got {}",
                self.pass_threshold
            ));
        }
        if self.concurrency == 0 {
            return invalid("concurrency must be at least 1".to_string());
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return invalid(format!("tolerance must be positive, got {}", self.tolerance));
        }
        if !self.health_path.starts_with('/') {
            return invalid(format!("health_path must start with '/', got {}", self.health_path));
        }
        self.client_config()
            .validate()
            .map_err(|message| ConfigError::Invalid { message })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_base_url(self.base_url.clone())
            .with_timeout(self.timeout())
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            cleanup: self.cleanup,
            concurrency: self.concurrency,
            tolerance: self.tolerance,
            echo: true,
        }
    }

    pub fn policy(&self) -> PassPolicy {
        PassPolicy::new(self.pass_threshold)
    }
}

fn read_env_nonempty(var: HarnessEnv) -> Result<Option<String>, ConfigError> {
    let name = var.as_str();
    let Some(raw) = std::env::var_os(name) else {
        return Ok(None);
    };
    let value = raw.into_string().map_err(|_| ConfigError::InvalidEnv {
        name,
        reason: "must be valid UTF-8".to_string(),
    })?;
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidEnv {
            name,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(Some(value.trim().to_string()))
}

fn parse_timeout_seconds(var: HarnessEnv, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(seconds),
        _ => Err(ConfigError::InvalidEnv {
            name: var.as_str(),
            reason: format!("must be a positive integer number of seconds, got '{}'", value),
        }),
    }
}

fn parse_threshold(var: HarnessEnv, value: &str) -> Result<f64, ConfigError> {
    match value.parse::<f64>() {
        Ok(percent) if (0.0..=100.0).contains(&percent) => Ok(percent),
        _ => Err(ConfigError::InvalidEnv {
            name: var.as_str(),
            reason: format!("must be a percentage between 0 and 100, got '{}'", value),
        }),
    }
}
