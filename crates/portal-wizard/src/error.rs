//! Error types for the apply wizard
//!
//! Covers:
//! - Field-level validation failures (re-rendered inline)
//! - Missing or mismatched sessions (redirect to the start of the flow)
//! - Anti-forgery and CAPTCHA failures
//! - Guarded submission outcomes and collaborator failures
//! - Storage and encoding failures

use crate::lifecycle::Phase;
use crate::step::{ApplicationType, Step};
use crate::submission::SubmissionError;
use portal_session::{SessionId, StoreError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Main wizard error type
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    /// Submitted step data failed validation
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// No wizard state for the session, or it belongs to another flow
    #[error("no {application_type} application for session {session}")]
    NotFound {
        /// Session looked up
        session: SessionId,
        /// Flow that was requested
        application_type: ApplicationType,
    },

    /// Step is not part of the requested flow
    #[error("step {step} is not part of the {application_type} flow")]
    UnknownStep {
        /// Requested step
        step: Step,
        /// Flow that was requested
        application_type: ApplicationType,
    },

    /// Anti-forgery token missing or different from the issued one
    #[error("security token mismatch")]
    SecurityTokenMismatch,

    /// CAPTCHA rejected the request
    #[error("captcha verification failed (session cleared: {session_cleared})")]
    CaptchaFailed {
        /// Whether the wizard state was discarded
        session_cleared: bool,
    },

    /// CAPTCHA verifier could not be reached
    #[error("captcha verifier unavailable: {0}")]
    CaptchaUnavailable(String),

    /// Session already has a confirmation code
    #[error("application already submitted")]
    AlreadySubmitted,

    /// Another request is submitting this session right now
    #[error("submission already in progress")]
    SubmissionInProgress,

    /// Terminal schema not satisfied
    #[error("application incomplete, missing: {missing:?}")]
    IncompleteApplication {
        /// Steps without a payload
        missing: Vec<Step>,
    },

    /// Saved answers no longer lead to the review page
    #[error("review is not reachable, continue at {redirect}")]
    ReviewUnavailable {
        /// Step the review page redirects to
        redirect: Step,
    },

    /// Flow has no terminal submission
    #[error("{0} applications cannot be submitted")]
    NotSubmittable(ApplicationType),

    /// External submission call failed
    #[error("submission failed: {0}")]
    SubmissionFailed(#[source] SubmissionError),

    /// Write would move the state machine backwards
    #[error("illegal phase transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Phase before the write
        from: Phase,
        /// Phase after the write
        to: Phase,
    },

    /// Optimistic write kept losing against concurrent writers
    #[error("concurrent modification of session {session} after {attempts} attempts")]
    Conflict {
        /// Contended session
        session: SessionId,
        /// Attempts made
        attempts: u32,
    },

    /// Session store failure
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Persisted state could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WizardError {
    /// Check if repeating the request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SubmissionFailed(_)
            | Self::SubmissionInProgress
            | Self::CaptchaUnavailable(_)
            | Self::Conflict { .. } => true,
            Self::Storage(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Check if the request itself was at fault
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound { .. }
                | Self::UnknownStep { .. }
                | Self::SecurityTokenMismatch
                | Self::CaptchaFailed { .. }
                | Self::AlreadySubmitted
                | Self::IncompleteApplication { .. }
                | Self::ReviewUnavailable { .. }
                | Self::NotSubmittable(_)
        )
    }
}

/// Field-keyed validation messages
///
/// Keys are dotted field paths such as `mailing_address.postal_code` or
/// `children[1].date_of_birth`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Create empty collection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Record a message when `failed` is true
    pub fn check(&mut self, failed: bool, field: &str, message: &str) {
        if failed {
            self.add(field, message);
        }
    }

    /// Merge another collection under a field prefix
    pub fn nest(&mut self, prefix: &str, other: ValidationErrors) {
        for (field, messages) in other.fields {
            self.fields
                .entry(format!("{prefix}.{field}"))
                .or_default()
                .extend(messages);
        }
    }

    /// Messages for one field
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Whether a field has any message
    #[inline]
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Failing field names
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of failing fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.fields().collect();
        write!(f, "{} field(s) invalid: {}", names.len(), names.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}
