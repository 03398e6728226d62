//! Guarded submission of a completed application
//!
//! # Protocol
//! 1. Claim: CAS-write a `pending_submission` marker after checking the
//!    state is complete, can reach the review page and is not submitted.
//!    Losers never reach the service. A stale claim is renewed with its
//!    original idempotency key.
//! 2. Call the [`SubmissionService`] with the claim's idempotency key.
//! 3. Success: CAS-write `submission_info` and drop the claim.
//! 4. Failure: drop the claim and report a retryable error.

use crate::error::WizardError;
use crate::guard::{Decision, NavigationGuard};
use crate::registry::Registries;
use crate::repository::WizardRepository;
use crate::state::{PendingSubmission, SubmissionInfo, WizardState};
use crate::step::{ApplicationType, Step};
use crate::submission::{SubmissionPayload, SubmissionRequest, SubmissionService};
use chrono::Utc;
use portal_session::SessionId;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Turns a complete wizard state into a recorded submission
#[derive(Debug, Clone)]
pub struct SubmissionFinalizer {
    repository: WizardRepository,
    registries: Arc<Registries>,
    service: Arc<dyn SubmissionService>,
}

impl SubmissionFinalizer {
    /// Create finalizer
    #[must_use]
    pub fn new(
        repository: WizardRepository,
        registries: Arc<Registries>,
        service: Arc<dyn SubmissionService>,
    ) -> Self {
        Self {
            repository,
            registries,
            service,
        }
    }

    /// Submit the session's application exactly once
    pub async fn finalize(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
    ) -> Result<SubmissionInfo, WizardError> {
        let registry = self
            .registries
            .get(application_type)
            .filter(|r| r.is_submittable())
            .ok_or(WizardError::NotSubmittable(application_type))?;

        let timeout = self.repository.claim_timeout();
        let claimed = self
            .repository
            .update(session, application_type, |state| {
                if state.is_submitted() {
                    return Err(WizardError::AlreadySubmitted);
                }
                let now = Utc::now();
                let claim = match &state.pending_submission {
                    Some(existing) if !existing.is_stale(now, timeout) => {
                        return Err(WizardError::SubmissionInProgress);
                    }
                    Some(existing) => {
                        warn!(
                            session = %session,
                            idempotency_key = %existing.idempotency_key,
                            "reclaiming stale submission claim"
                        );
                        existing.renew(now)
                    }
                    None => PendingSubmission::claim(now),
                };

                let missing: Vec<_> = registry
                    .required_data_steps(state)
                    .into_iter()
                    .filter(|step| !state.has(*step))
                    .collect();
                if !missing.is_empty() {
                    return Err(WizardError::IncompleteApplication { missing });
                }
                if let Decision::Redirect { to, reason } =
                    NavigationGuard::new(registry).authorize(Step::ReviewInformation, state)
                {
                    warn!(session = %session, %to, %reason, "submission refused, review not reachable");
                    return Err(WizardError::ReviewUnavailable { redirect: to });
                }

                state.pending_submission = Some(claim);
                state.edit_mode = true;
                Ok(())
            })
            .await?;

        let Some(claim) = claimed.pending_submission.clone() else {
            return Err(WizardError::SubmissionInProgress);
        };

        match self.submit(&claimed, &claim).await {
            Ok(info) => self.record(session, application_type, info).await,
            Err(e) => {
                self.release(session, application_type, &claim).await;
                Err(e)
            }
        }
    }

    async fn submit(
        &self,
        state: &WizardState,
        claim: &PendingSubmission,
    ) -> Result<SubmissionInfo, WizardError> {
        let request = SubmissionRequest {
            idempotency_key: claim.idempotency_key.clone(),
            payload: SubmissionPayload::from_state(state)?,
        };

        let receipt = self.service.submit(&request).await.map_err(|e| {
            error!(
                application_id = %state.id,
                idempotency_key = %claim.idempotency_key,
                error = %e,
                "submission service call failed"
            );
            WizardError::SubmissionFailed(e)
        })?;

        Ok(SubmissionInfo {
            confirmation_code: receipt.confirmation_code,
            submitted_on: Utc::now(),
        })
    }

    async fn record(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
        info: SubmissionInfo,
    ) -> Result<SubmissionInfo, WizardError> {
        let saved = self
            .repository
            .update(session, application_type, |state| {
                if state.is_submitted() {
                    return Err(WizardError::AlreadySubmitted);
                }
                state.submission_info = Some(info.clone());
                state.pending_submission = None;
                Ok(())
            })
            .await?;

        info!(
            session = %session,
            application_id = %saved.id,
            confirmation_code = %info.confirmation_code,
            "application submitted"
        );
        Ok(info)
    }

    async fn release(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
        claim: &PendingSubmission,
    ) {
        let result = self
            .repository
            .update(session, application_type, |state| {
                // A reclaimed claim keeps the key but not the claim time
                if state.pending_submission.as_ref() == Some(claim) {
                    state.pending_submission = None;
                }
                Ok(())
            })
            .await;
        if let Err(e) = result {
            warn!(session = %session, error = %e, "failed to release submission claim");
        }
    }
}
