//! Wizard state persistence
//!
//! [`WizardRepository`] stores one JSON-encoded [`WizardState`] per session
//! under `wizard:<session>`. Every mutation is a load-modify-write guarded by
//! [`SessionStore::compare_and_swap`], retried a bounded number of times, so
//! concurrent saves of different steps never lose each other's payloads.

use crate::error::WizardError;
use crate::lifecycle::validate_transition;
use crate::state::{FieldPatch, WizardState};
use crate::step::ApplicationType;
use chrono::Utc;
use portal_session::{SessionId, SharedStore};
use std::time::Duration;
use tracing::{debug, info};

/// Key namespace of wizard records
pub const NAMESPACE: &str = "wizard";

/// Default number of compare-and-swap attempts per update
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// Session-scoped wizard state storage
#[derive(Debug, Clone)]
pub struct WizardRepository {
    store: SharedStore,
    ttl: Option<Duration>,
    max_retries: u32,
    claim_timeout: Duration,
}

impl WizardRepository {
    /// Repository over a store; `ttl` is refreshed on every write
    #[must_use]
    pub fn new(store: SharedStore, ttl: Option<Duration>) -> Self {
        Self {
            store,
            ttl,
            max_retries: DEFAULT_MAX_RETRIES,
            claim_timeout: Duration::from_secs(60),
        }
    }

    /// Set maximum compare-and-swap attempts
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set how long a submission claim blocks saves and other claims
    #[must_use]
    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = timeout;
        self
    }

    /// Age after which a submission claim may be taken over
    #[inline]
    #[must_use]
    pub fn claim_timeout(&self) -> Duration {
        self.claim_timeout
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    async fn read(&self, session: &SessionId) -> Result<Option<(Vec<u8>, WizardState)>, WizardError> {
        let Some(raw) = self.store.get(&session.key(NAMESPACE)).await? else {
            return Ok(None);
        };
        let state = serde_json::from_slice(&raw)?;
        Ok(Some((raw, state)))
    }

    /// State of any application type, if present
    pub async fn find(&self, session: &SessionId) -> Result<Option<WizardState>, WizardError> {
        Ok(self.read(session).await?.map(|(_, state)| state))
    }

    /// State for the session and flow
    ///
    /// `NotFound` when nothing is stored or the stored state belongs to a
    /// different application type.
    pub async fn load(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
    ) -> Result<WizardState, WizardError> {
        match self.find(session).await? {
            Some(state) if state.application_type == application_type => Ok(state),
            _ => Err(not_found(session, application_type)),
        }
    }

    /// Fresh state with a new id, replacing whatever the session held
    pub async fn start(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
    ) -> Result<WizardState, WizardError> {
        let state = WizardState::new(application_type);
        self.store
            .set(&session.key(NAMESPACE), serde_json::to_vec(&state)?, self.ttl)
            .await?;
        info!(session = %session, application_id = %state.id, %application_type, "wizard started");
        Ok(state)
    }

    /// Existing state for the flow, or a fresh one
    pub async fn load_or_start(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
    ) -> Result<WizardState, WizardError> {
        match self.load(session, application_type).await {
            Err(WizardError::NotFound { .. }) => self.start(session, application_type).await,
            other => other,
        }
    }

    /// Merge step payloads into the stored state
    ///
    /// Steps outside the patch are untouched; each payload in the patch
    /// replaces the stored one for its step.
    pub async fn save(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
        patch: FieldPatch,
    ) -> Result<WizardState, WizardError> {
        let claim_timeout = self.claim_timeout;
        self.update(session, application_type, |state| {
            if state.is_submitted() {
                return Err(WizardError::AlreadySubmitted);
            }
            if state
                .pending_submission
                .as_ref()
                .is_some_and(|claim| !claim.is_stale(Utc::now(), claim_timeout))
            {
                return Err(WizardError::SubmissionInProgress);
            }
            state.merge(patch.clone());
            Ok(())
        })
        .await
    }

    /// Remove all wizard state of the session
    pub async fn clear(&self, session: &SessionId) -> Result<bool, WizardError> {
        let removed = self.store.delete(&session.key(NAMESPACE)).await?;
        if removed {
            info!(session = %session, "wizard state cleared");
        }
        Ok(removed)
    }

    /// Optimistic read-modify-write
    ///
    /// `modify` runs against the freshly loaded state on every attempt and
    /// may reject the write. The result must be a legal phase transition.
    pub async fn update<F>(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
        mut modify: F,
    ) -> Result<WizardState, WizardError>
    where
        F: FnMut(&mut WizardState) -> Result<(), WizardError> + Send,
    {
        let key = session.key(NAMESPACE);
        for attempt in 1..=self.max_retries {
            let Some((raw, current)) = self.read(session).await? else {
                return Err(not_found(session, application_type));
            };
            if current.application_type != application_type {
                return Err(not_found(session, application_type));
            }

            let mut next = current.clone();
            modify(&mut next)?;
            validate_transition(current.phase(), next.phase())?;
            next.id = current.id;
            next.application_type = current.application_type;
            next.version = current.version + 1;
            next.updated_on = Utc::now();

            let bytes = serde_json::to_vec(&next)?;
            if self
                .store
                .compare_and_swap(&key, Some(&raw), bytes, self.ttl)
                .await?
            {
                return Ok(next);
            }
            debug!(session = %session, attempt, "concurrent write detected, retrying");
        }

        Err(WizardError::Conflict {
            session: session.clone(),
            attempts: self.max_retries,
        })
    }
}

fn not_found(session: &SessionId, application_type: ApplicationType) -> WizardError {
    WizardError::NotFound {
        session: session.clone(),
        application_type,
    }
}
