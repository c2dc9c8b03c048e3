//! Configuration types for the Mailgun provider
//!
//! The provider block needs a `domain` and an `apikey`. Either may be left
//! unset, in which case it is read from `MAILGUN_DOMAIN` / `MAILGUN_APIKEY`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Environment variable consulted when `domain` is not configured
pub const DOMAIN_ENV: &str = "MAILGUN_DOMAIN";

/// Environment variable consulted when `apikey` is not configured
pub const API_KEY_ENV: &str = "MAILGUN_APIKEY";

/// Environment variable overriding the API base URL
pub const API_BASE_ENV: &str = "MAILGUN_API_BASE";

/// Default Mailgun API base URL
pub const DEFAULT_API_BASE: &str = "https://api.mailgun.net/v3";

/// Provider-level configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Default sending domain for the account
    pub domain: String,

    /// Mailgun private API key
    /// ⚠️ NEVER log this value
    #[serde(rename = "apikey")]
    pub api_key: String,

    /// API base URL (EU accounts use `https://api.eu.mailgun.net/v3`)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Handler deadlines
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Retry ceilings and backoff
    #[serde(default)]
    pub retry: RetryConfig,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("domain", &self.domain)
            .field("api_key", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .field("timeouts", &self.timeouts)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ProviderConfig {
    /// Create a configuration with default timeouts and retry settings
    pub fn new(domain: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            api_key: api_key.into(),
            api_base: default_api_base(),
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Build a configuration from explicit values, falling back to the
    /// environment for anything left unset
    pub fn with_env_fallback(
        domain: Option<String>,
        api_key: Option<String>,
    ) -> Result<Self, crate::Error> {
        let domain = resolve(domain, DOMAIN_ENV)
            .ok_or_else(|| crate::Error::config(format!("domain is required (or set {DOMAIN_ENV})")))?;
        let api_key = resolve(api_key, API_KEY_ENV)
            .ok_or_else(|| crate::Error::config(format!("apikey is required (or set {API_KEY_ENV})")))?;

        let mut config = Self::new(domain, api_key);
        if let Some(base) = resolve(None, API_BASE_ENV) {
            config.api_base = base;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load the configuration entirely from environment variables
    pub fn from_env() -> Result<Self, crate::Error> {
        Self::with_env_fallback(None, None)
    }

    /// Override the API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domain.trim().is_empty() {
            return Err(crate::Error::config("domain cannot be empty"));
        }
        if self.api_key.trim().is_empty() {
            return Err(crate::Error::config("apikey cannot be empty"));
        }
        if !self.api_base.starts_with("https://") && !self.api_base.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "api_base must use HTTP or HTTPS scheme. Got: {}",
                self.api_base
            )));
        }

        self.timeouts.validate()?;
        self.retry.validate()?;

        Ok(())
    }
}

fn resolve(explicit: Option<String>, env_var: &str) -> Option<String> {
    explicit
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|v| !v.is_empty()))
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

/// Handler deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Deadline for create, update and delete handlers (in seconds)
    #[serde(default = "default_operation_secs")]
    pub operation_secs: u64,

    /// Deadline for full domain reads (in seconds), raised as needed to
    /// cover the IP propagation ceiling
    #[serde(default = "default_read_secs")]
    pub read_secs: u64,
}

impl TimeoutConfig {
    /// Deadline for mutating handlers and single-object reads
    pub fn operation(&self) -> Duration {
        Duration::from_secs(self.operation_secs)
    }

    /// Deadline for full domain reads
    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.operation_secs == 0 || self.read_secs == 0 {
            return Err(crate::Error::config("timeouts must be > 0"));
        }
        Ok(())
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            operation_secs: default_operation_secs(),
            read_secs: default_read_secs(),
        }
    }
}

fn default_operation_secs() -> u64 {
    30
}

fn default_read_secs() -> u64 {
    120
}

/// Retry ceilings and backoff for the two eventually-consistent checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// How long to wait for a new domain's IPs to become readable (in seconds)
    #[serde(default = "default_ip_propagation_secs")]
    pub ip_propagation_secs: u64,

    /// How long to wait for a deleted object to disappear (in seconds)
    #[serde(default = "default_destroy_confirmation_secs")]
    pub destroy_confirmation_secs: u64,

    /// First backoff delay (in milliseconds)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff cap (in milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl RetryConfig {
    /// Policy for the IP address read after domain creation
    pub fn ip_propagation(&self) -> RetryPolicy {
        self.policy(self.ip_propagation_secs)
    }

    /// Policy for destroy confirmation
    pub fn destroy_confirmation(&self) -> RetryPolicy {
        self.policy(self.destroy_confirmation_secs)
    }

    fn policy(&self, ceiling_secs: u64) -> RetryPolicy {
        RetryPolicy::exponential(
            Duration::from_secs(ceiling_secs),
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.initial_backoff_ms == 0 {
            return Err(crate::Error::config("initial_backoff_ms must be > 0"));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(crate::Error::config(
                "max_backoff_ms must be >= initial_backoff_ms",
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            ip_propagation_secs: default_ip_propagation_secs(),
            destroy_confirmation_secs: default_destroy_confirmation_secs(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_ip_propagation_secs() -> u64 {
    120
}

fn default_destroy_confirmation_secs() -> u64 {
    60
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}
