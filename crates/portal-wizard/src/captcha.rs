//! CAPTCHA verification collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::net::IpAddr;
use std::time::Duration;

/// CAPTCHA verifier failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptchaError {
    /// Verifier unreachable
    #[error("captcha verifier unavailable: {0}")]
    Unavailable(String),
    /// Verifier answered with something unreadable
    #[error("invalid captcha verifier response: {0}")]
    InvalidResponse(String),
}

/// What to do with the session when the CAPTCHA check fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptchaFailurePolicy {
    /// Keep the state; the user may try again
    #[default]
    AllowRetry,
    /// Discard the wizard state
    ClearSession,
}

/// Human-verification check
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptchaVerifier: Send + Sync + Debug {
    /// Whether the response token is valid for the client
    async fn verify(&self, token: &str, remote_addr: Option<IpAddr>) -> Result<bool, CaptchaError>;
}

/// Verifier with a fixed answer, for local runs and tests
///
/// Rejects empty tokens even when accepting.
#[derive(Debug, Clone, Copy)]
pub struct StaticCaptchaVerifier {
    accept: bool,
}

impl StaticCaptchaVerifier {
    /// Accept every non-empty token
    #[must_use]
    pub fn accepting() -> Self {
        Self { accept: true }
    }

    /// Reject every token
    #[must_use]
    pub fn rejecting() -> Self {
        Self { accept: false }
    }
}

#[async_trait]
impl CaptchaVerifier for StaticCaptchaVerifier {
    async fn verify(&self, token: &str, _remote_addr: Option<IpAddr>) -> Result<bool, CaptchaError> {
        Ok(self.accept && !token.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
}

/// `siteverify`-style verifier (hCaptcha, reCAPTCHA)
#[derive(Debug, Clone)]
pub struct HttpCaptchaVerifier {
    client: reqwest::Client,
    endpoint: String,
    secret: String,
}

impl HttpCaptchaVerifier {
    /// Create a verifier posting to `endpoint` with the site secret
    pub fn new(
        endpoint: impl Into<String>,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CaptchaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CaptchaError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            secret: secret.into(),
        })
    }
}

#[async_trait]
impl CaptchaVerifier for HttpCaptchaVerifier {
    async fn verify(&self, token: &str, remote_addr: Option<IpAddr>) -> Result<bool, CaptchaError> {
        if token.is_empty() {
            return Ok(false);
        }

        let mut form = vec![("secret", self.secret.clone()), ("response", token.to_string())];
        if let Some(ip) = remote_addr {
            form.push(("remoteip", ip.to_string()));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| CaptchaError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CaptchaError::Unavailable(format!(
                "status {}",
                response.status()
            )));
        }

        let body: SiteVerifyResponse = response
            .json()
            .await
            .map_err(|e| CaptchaError::InvalidResponse(e.to_string()))?;
        Ok(body.success)
    }
}
