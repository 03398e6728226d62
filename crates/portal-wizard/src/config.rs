//! Wizard engine configuration

use crate::captcha::CaptchaFailurePolicy;
use crate::repository::DEFAULT_MAX_RETRIES;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wizard engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    /// Session state lifetime in seconds, refreshed on each write; 0 disables expiry
    pub session_ttl_secs: u64,
    /// Compare-and-swap attempts per write
    pub max_retries: u32,
    /// Age in seconds after which a submission claim may be taken over
    pub claim_timeout_secs: u64,
    /// Behaviour on CAPTCHA failure
    pub captcha_failure_policy: CaptchaFailurePolicy,
}

impl WizardConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With session TTL
    #[inline]
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl_secs = ttl.as_secs();
        self
    }

    /// With CAS retry limit
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// With submission claim timeout
    #[inline]
    #[must_use]
    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout_secs = timeout.as_secs();
        self
    }

    /// With CAPTCHA failure policy
    #[inline]
    #[must_use]
    pub fn with_captcha_failure_policy(mut self, policy: CaptchaFailurePolicy) -> Self {
        self.captcha_failure_policy = policy;
        self
    }

    /// Session TTL, `None` when disabled
    #[must_use]
    pub fn session_ttl(&self) -> Option<Duration> {
        (self.session_ttl_secs > 0).then(|| Duration::from_secs(self.session_ttl_secs))
    }

    /// Submission claim timeout
    #[must_use]
    pub fn claim_timeout(&self) -> Duration {
        Duration::from_secs(self.claim_timeout_secs)
    }
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 20 * 60,
            max_retries: DEFAULT_MAX_RETRIES,
            claim_timeout_secs: 60,
            captcha_failure_policy: CaptchaFailurePolicy::AllowRetry,
        }
    }
}
