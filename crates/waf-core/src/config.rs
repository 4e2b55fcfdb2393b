//! Configuration for WAF API clients.
//!
//! [`WafClientConfig`] is the explicit struct handed to client construction.
//! Reading it from the environment is a convenience for callers; the client
//! itself never looks at process state.

use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::retry::RetryBudget;
use crate::transport::BaseUrls;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use validator::Validate;

/// Environment variable holding the API id.
pub const ENV_API_ID: &str = "WAF_API_ID";
/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "WAF_API_KEY";
/// Environment variable overriding the legacy base URL.
pub const ENV_BASE_URL: &str = "WAF_BASE_URL";
/// Environment variable overriding the v2 base URL.
pub const ENV_BASE_URL_API: &str = "WAF_BASE_URL_API";
/// Environment variable overriding the v3 base URL.
pub const ENV_BASE_URL_REV_3: &str = "WAF_BASE_URL_REV_3";
/// Environment variable overriding the request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "WAF_TIMEOUT_SECS";
/// Environment variable overriding the attempt limit.
pub const ENV_MAX_ATTEMPTS: &str = "WAF_MAX_ATTEMPTS";

/// Default legacy provisioning API base URL
pub const DEFAULT_BASE_URL: &str = "https://my.imperva.com/api/prov/v1";
/// Default v2 API base URL
pub const DEFAULT_BASE_URL_API_V2: &str = "https://api.imperva.com/policies/v2";
/// Default v3 API base URL
pub const DEFAULT_BASE_URL_API_V3: &str = "https://my.imperva.com/api/prov/v3";

/// Configuration for a WAF API client.
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct WafClientConfig {
    /// API id
    #[validate(length(min = 1))]
    pub api_id: String,

    /// API key, never serialized
    #[serde(default, skip_serializing)]
    #[validate(length(min = 1))]
    pub api_key: String,

    /// Legacy provisioning API base URL
    #[validate(url)]
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// v2 API base URL
    #[validate(url)]
    #[serde(default = "default_base_url_api_v2")]
    pub base_url_api_v2: String,

    /// v3 API base URL
    #[validate(url)]
    #[serde(default = "default_base_url_api_v3")]
    pub base_url_api_v3: String,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum attempts per operation, including the first
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_base_url_api_v2() -> String {
    DEFAULT_BASE_URL_API_V2.to_string()
}

fn default_base_url_api_v3() -> String {
    DEFAULT_BASE_URL_API_V3.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_tls_verify() -> bool {
    true
}

impl WafClientConfig {
    /// Create a configuration with default URLs.
    ///
    /// # Errors
    ///
    /// Returns an error if either credential part is empty.
    pub fn new(api_id: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let config = Self {
            api_id: api_id.into(),
            api_key: api_key.into(),
            base_url: default_base_url(),
            base_url_api_v2: default_base_url_api_v2(),
            base_url_api_v3: default_base_url_api_v3(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_max_attempts(),
            tls_verify: default_tls_verify(),
        };

        config.check()?;
        Ok(config)
    }

    /// Build a configuration from a variable lookup function.
    ///
    /// `WAF_API_ID` and `WAF_API_KEY` are required; everything else falls back
    /// to its default.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a numeric variable
    /// does not parse, or the result fails validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| Error::ConfigError(format!("{name} is not set")))
        };

        let mut config = Self {
            api_id: required(ENV_API_ID)?,
            api_key: required(ENV_API_KEY)?,
            ..Self::default()
        };

        if let Some(url) = lookup(ENV_BASE_URL) {
            config.base_url = url;
        }
        if let Some(url) = lookup(ENV_BASE_URL_API) {
            config.base_url_api_v2 = url;
        }
        if let Some(url) = lookup(ENV_BASE_URL_REV_3) {
            config.base_url_api_v3 = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            config.request_timeout_secs = parse_number(ENV_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_ATTEMPTS) {
            config.max_attempts = parse_number(ENV_MAX_ATTEMPTS, &raw)?;
        }

        config.check()?;
        Ok(config)
    }

    /// Build a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`WafClientConfig::from_lookup`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Set the legacy API base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the v2 API base URL.
    #[must_use]
    pub fn with_base_url_api_v2(mut self, url: impl Into<String>) -> Self {
        self.base_url_api_v2 = url.into();
        self
    }

    /// Set the v3 API base URL.
    #[must_use]
    pub fn with_base_url_api_v3(mut self, url: impl Into<String>) -> Self {
        self.base_url_api_v3 = url.into();
        self
    }

    /// Point every API generation at one URL (useful against a mock server).
    #[must_use]
    pub fn with_all_base_urls(self, url: &str) -> Self {
        self.with_base_url(url)
            .with_base_url_api_v2(url)
            .with_base_url_api_v3(url)
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set the attempt limit.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate ranges and URLs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing every failed field.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))
    }

    /// Credential pair for request signing.
    ///
    /// # Errors
    ///
    /// Returns an error if either part is blank.
    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::new(self.api_id.clone(), self.api_key.clone())
    }

    /// Parsed base URLs for every API generation.
    ///
    /// # Errors
    ///
    /// Returns an error if any URL cannot be parsed.
    pub fn base_urls(&self) -> Result<BaseUrls> {
        BaseUrls::new(&self.base_url, &self.base_url_api_v2, &self.base_url_api_v3)
    }

    /// Default retry budget derived from `max_attempts`.
    #[must_use]
    pub fn retry_budget(&self) -> RetryBudget {
        RetryBudget::new().with_max_attempts(self.max_attempts)
    }
}

impl Default for WafClientConfig {
    fn default() -> Self {
        Self {
            api_id: String::new(),
            api_key: String::new(),
            base_url: default_base_url(),
            base_url_api_v2: default_base_url_api_v2(),
            base_url_api_v3: default_base_url_api_v3(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_max_attempts(),
            tls_verify: default_tls_verify(),
        }
    }
}

impl fmt::Debug for WafClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WafClientConfig")
            .field("api_id", &self.api_id)
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("base_url_api_v2", &self.base_url_api_v2)
            .field("base_url_api_v3", &self.base_url_api_v3)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("tls_verify", &self.tls_verify)
            .finish()
    }
}

fn parse_number<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
{
    raw.trim()
        .parse()
        .map_err(|_| Error::ConfigError(format!("{name} must be a number, got `{raw}`")))
}
