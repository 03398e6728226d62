//! Anti-forgery tokens
//!
//! One token per session, stored under `csrf:<session>` next to the wizard
//! state and compared in constant time.

use crate::error::WizardError;
use portal_session::{SessionId, SharedStore};
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Key namespace of anti-forgery tokens
pub const NAMESPACE: &str = "csrf";

const TOKEN_BYTES: usize = 32;

/// Per-session anti-forgery token store
#[derive(Debug, Clone)]
pub struct CsrfTokens {
    store: SharedStore,
    ttl: Option<Duration>,
}

impl CsrfTokens {
    /// Token store over a session store
    #[must_use]
    pub fn new(store: SharedStore, ttl: Option<Duration>) -> Self {
        Self { store, ttl }
    }

    /// Current token for the session, issuing one if none exists
    pub async fn issue(&self, session: &SessionId) -> Result<String, WizardError> {
        let key = session.key(NAMESPACE);
        if let Some(existing) = self.store.get(&key).await? {
            if let Ok(token) = String::from_utf8(existing) {
                return Ok(token);
            }
        }
        self.rotate(session).await
    }

    /// Replace the session's token with a fresh one
    pub async fn rotate(&self, session: &SessionId) -> Result<String, WizardError> {
        let bytes: [u8; TOKEN_BYTES] = rand::random();
        let token = hex::encode(bytes);
        self.store
            .set(&session.key(NAMESPACE), token.clone().into_bytes(), self.ttl)
            .await?;
        Ok(token)
    }

    /// Check a submitted token against the issued one
    pub async fn verify(&self, session: &SessionId, token: &str) -> Result<(), WizardError> {
        let stored = self.store.get(&session.key(NAMESPACE)).await?;
        let matches = stored.is_some_and(|expected| {
            !token.is_empty() && bool::from(expected.as_slice().ct_eq(token.as_bytes()))
        });
        if matches {
            Ok(())
        } else {
            warn!(session = %session, "anti-forgery token rejected");
            Err(WizardError::SecurityTokenMismatch)
        }
    }

    /// Drop the session's token
    pub async fn revoke(&self, session: &SessionId) -> Result<(), WizardError> {
        self.store.delete(&session.key(NAMESPACE)).await?;
        Ok(())
    }
}
