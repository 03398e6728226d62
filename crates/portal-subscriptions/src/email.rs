//! E-mail delivery collaborator

use crate::domain::ConfirmationCode;
use crate::error::NotificationError;
use async_trait::async_trait;
use std::fmt::Debug;
use tracing::info;

/// Sends confirmation codes to users
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync + Debug {
    /// Deliver a confirmation code in the user's language
    async fn send_confirmation_code(
        &self,
        email: &str,
        language: &str,
        code: &ConfirmationCode,
    ) -> Result<(), NotificationError>;
}

/// Sender that only logs, for local runs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_confirmation_code(
        &self,
        email: &str,
        language: &str,
        code: &ConfirmationCode,
    ) -> Result<(), NotificationError> {
        info!(
            recipient = %email,
            %language,
            code_id = %code.id,
            expiry_date = %code.expiry_date,
            "confirmation code e-mail queued"
        );
        Ok(())
    }
}
