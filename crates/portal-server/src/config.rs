//! Server configuration
//!
//! Layering, lowest first: built-in defaults, TOML file, `PORTAL_*`
//! environment variables, command-line flags.

use portal_subscriptions::ConfirmationCodeConfig;
use portal_wizard::WizardConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File unreadable
    #[error("cannot read {path}: {source}")]
    Io {
        /// Config file
        path: PathBuf,
        /// Cause
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value failed validation
    #[error("invalid value for {key}: {message}")]
    Invalid {
        /// Setting name
        key: String,
        /// Reason
        message: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, message: impl ToString) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

/// Main portal configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// HTTP listener
    pub server: ServerConfig,
    /// Log output
    pub logging: LoggingConfig,
    /// Session persistence
    pub store: StoreConfig,
    /// Wizard engine
    pub wizard: WizardConfig,
    /// Submission back end
    pub submission: SubmissionConfig,
    /// CAPTCHA verification
    pub captcha: CaptchaConfig,
    /// E-mail confirmation codes
    pub confirmation_code: ConfirmationCodeConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Maximum request body size in bytes
    pub body_limit: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            body_limit: 64 * 1024,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Session store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory
    #[default]
    Memory,
    /// One file per key
    File,
    /// File store behind an in-process cache
    Cached,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "cached" => Ok(Self::Cached),
            other => Err(ConfigError::invalid(
                "store.backend",
                format!("unknown backend {other:?}"),
            )),
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend
    pub backend: StoreBackend,
    /// Directory of the file backend
    pub dir: PathBuf,
    /// Entries held by the cache
    pub cache_capacity: u64,
    /// Lifetime of a cached entry in seconds
    pub cache_ttl_secs: u64,
    /// Interval between sweeps of expired in-memory entries
    pub purge_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            dir: PathBuf::from("var/sessions"),
            cache_capacity: 10_000,
            cache_ttl_secs: 30,
            purge_interval_secs: 60,
        }
    }
}

impl StoreConfig {
    /// Cached entry lifetime
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Submission back end configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// `POST` endpoint receiving completed applications
    pub url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9090/v1/applications".to_string(),
            timeout_secs: 30,
        }
    }
}

/// CAPTCHA configuration; verification is off without a `url`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    /// `siteverify` endpoint
    pub url: Option<String>,
    /// Site secret
    pub secret: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: None,
            timeout_secs: 10,
        }
    }
}

impl PortalConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with a TOML file, if given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `PORTAL_*` overrides from the process environment
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `PORTAL_*` overrides from `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("PORTAL_BIND") {
            self.server.bind = bind
                .parse()
                .map_err(|e| ConfigError::invalid("PORTAL_BIND", e))?;
        }
        if let Some(backend) = lookup("PORTAL_STORE") {
            self.store.backend = backend.parse()?;
        }
        if let Some(dir) = lookup("PORTAL_STORE_DIR") {
            self.store.dir = PathBuf::from(dir);
        }
        if let Some(ttl) = lookup("PORTAL_SESSION_TTL_SECS") {
            self.wizard.session_ttl_secs = ttl
                .parse()
                .map_err(|e| ConfigError::invalid("PORTAL_SESSION_TTL_SECS", e))?;
        }
        if let Some(url) = lookup("PORTAL_SUBMISSION_URL") {
            self.submission.url = url;
        }
        Ok(self)
    }

    /// With listen address
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.server.bind = bind;
        self
    }

    /// With session store backend
    #[must_use]
    pub fn with_store_backend(mut self, backend: StoreBackend) -> Self {
        self.store.backend = backend;
        self
    }

    /// With log format
    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.logging.format = format;
        self
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.submission.url.trim().is_empty() {
            return Err(ConfigError::invalid("submission.url", "must not be empty"));
        }
        if self.wizard.max_retries == 0 {
            return Err(ConfigError::invalid("wizard.max_retries", "must be at least 1"));
        }
        if self.confirmation_code.length == 0 {
            return Err(ConfigError::invalid(
                "confirmation_code.length",
                "must be at least 1",
            ));
        }
        if self.captcha.url.is_some() && self.captcha.secret.is_none() {
            return Err(ConfigError::invalid("captcha.secret", "required with captcha.url"));
        }
        // A claim must outlive the call it guards
        if self.wizard.claim_timeout_secs <= self.submission.timeout_secs {
            return Err(ConfigError::invalid(
                "wizard.claim_timeout_secs",
                format!(
                    "must exceed submission.timeout_secs ({})",
                    self.submission.timeout_secs
                ),
            ));
        }
        Ok(())
    }
}
