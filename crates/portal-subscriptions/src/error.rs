//! Error types for users, subscriptions and confirmation codes

use uuid::Uuid;

/// Main subscription error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// No user with the id
    #[error("no user with id=[{0}] was found")]
    UserNotFound(Uuid),

    /// User has no subscription with the id
    #[error("no subscription with id=[{0}] was found")]
    SubscriptionNotFound(Uuid),

    /// Alert type code not in the catalog
    #[error("no alert type with code=[{0}] was found")]
    AlertTypeNotFound(String),

    /// User already subscribed to the alert type
    #[error("a subscription with code [{alert_type_code}] already exists for user [{user_id}]")]
    Conflict {
        /// User
        user_id: Uuid,
        /// Duplicate alert type
        alert_type_code: String,
    },

    /// E-mail address failed validation
    #[error("invalid e-mail address: {0}")]
    InvalidEmail(String),

    /// Language code not supported
    #[error("unsupported language: {0}")]
    InvalidLanguage(String),

    /// No outstanding code matches
    #[error("confirmation code does not match")]
    CodeMismatch,

    /// Matching code has expired
    #[error("confirmation code has expired")]
    CodeExpired,

    /// Address changed while a code for the old one was being sent
    #[error("e-mail address of user [{0}] changed while the code was being sent")]
    EmailChanged(Uuid),

    /// E-mail delivery failed
    #[error("notification failed: {0}")]
    Notification(#[from] NotificationError),
}

impl SubscriptionError {
    /// Check if the error means a missing resource
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_) | Self::SubscriptionNotFound(_) | Self::AlertTypeNotFound(_)
        )
    }

    /// Check if the request itself was at fault
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Notification(_))
    }
}

/// E-mail delivery failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not deliver to {recipient}: {reason}")]
pub struct NotificationError {
    /// Target address
    pub recipient: String,
    /// Cause
    pub reason: String,
}
