//! HTTP error mapping

use portal_session::StoreError;
use portal_subscriptions::SubscriptionError;
use portal_wizard::{CaptchaError, SubmissionError, ValidationErrors, WizardError};
use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

use crate::config::ConfigError;

/// Failure while wiring the server from configuration
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Bad configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session store could not be opened
    #[error("session store: {0}")]
    Store(#[from] StoreError),

    /// Submission client could not be built
    #[error("submission client: {0}")]
    Submission(#[from] SubmissionError),

    /// CAPTCHA client could not be built
    #[error("captcha client: {0}")]
    Captcha(#[from] CaptchaError),
}

/// JSON error body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    /// Machine-readable kind
    pub error: &'static str,
    /// Human-readable message
    pub message: String,
    /// Field-level validation messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<ValidationErrors>,
    /// Whether repeating the request may succeed
    pub retryable: bool,
}

/// Error response: status plus [`ErrorBody`]
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    /// Error with a status and kind
    #[must_use]
    pub fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error,
                message: message.into(),
                fields: None,
                retryable: false,
            },
        }
    }

    /// Mark as retryable
    #[must_use]
    pub fn retryable(mut self, retryable: bool) -> Self {
        self.body.retryable = retryable;
        self
    }

    /// HTTP status
    #[inline]
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response body
    #[inline]
    #[must_use]
    pub fn body(&self) -> &ErrorBody {
        &self.body
    }
}

impl From<WizardError> for ApiError {
    fn from(err: WizardError) -> Self {
        let retryable = err.is_retryable();
        let message = err.to_string();
        let (status, kind) = match &err {
            WizardError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
            WizardError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            WizardError::UnknownStep { .. } => (StatusCode::NOT_FOUND, "unknown_step"),
            WizardError::SecurityTokenMismatch => (StatusCode::FORBIDDEN, "security_token_mismatch"),
            WizardError::CaptchaFailed { .. } => (StatusCode::BAD_REQUEST, "captcha_failed"),
            WizardError::CaptchaUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "captcha_unavailable")
            }
            WizardError::AlreadySubmitted => (StatusCode::CONFLICT, "already_submitted"),
            WizardError::SubmissionInProgress => (StatusCode::CONFLICT, "submission_in_progress"),
            WizardError::IncompleteApplication { .. } => {
                (StatusCode::BAD_REQUEST, "incomplete_application")
            }
            WizardError::ReviewUnavailable { .. } => (StatusCode::CONFLICT, "review_unavailable"),
            WizardError::NotSubmittable(_) => (StatusCode::BAD_REQUEST, "not_submittable"),
            WizardError::SubmissionFailed(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "submission_failed")
            }
            WizardError::IllegalTransition { .. } => (StatusCode::CONFLICT, "illegal_transition"),
            WizardError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            WizardError::Storage(e) if e.is_transient() => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable")
            }
            WizardError::Storage(_) | WizardError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }

        let mut api = Self::new(status, kind, message).retryable(retryable);
        if let WizardError::Validation(fields) = err {
            api.body.fields = Some(fields);
        }
        api
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        let (status, kind) = match &err {
            SubscriptionError::UserNotFound(_)
            | SubscriptionError::SubscriptionNotFound(_)
            | SubscriptionError::AlertTypeNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            SubscriptionError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            SubscriptionError::EmailChanged(_) => (StatusCode::CONFLICT, "email_changed"),
            SubscriptionError::InvalidEmail(_) | SubscriptionError::InvalidLanguage(_) => {
                (StatusCode::BAD_REQUEST, "validation_failed")
            }
            SubscriptionError::CodeMismatch => (StatusCode::BAD_REQUEST, "code_mismatch"),
            SubscriptionError::CodeExpired => (StatusCode::BAD_REQUEST, "code_expired"),
            SubscriptionError::Notification(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "notification_failed")
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self::new(status, kind, err.to_string()).retryable(!err.is_client_error())
    }
}

impl Reply for ApiError {
    fn into_response(self) -> Response {
        reply::with_status(reply::json(&self.body), self.status).into_response()
    }
}
