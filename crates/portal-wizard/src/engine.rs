//! Wizard engine
//!
//! Ties the repository, registry, guard, finalizer, anti-forgery tokens and
//! CAPTCHA verifier together behind the operations a web layer needs. Every
//! operation takes the session id explicitly.

use crate::captcha::{CaptchaFailurePolicy, CaptchaVerifier};
use crate::config::WizardConfig;
use crate::csrf::CsrfTokens;
use crate::error::{ValidationErrors, WizardError};
use crate::finalizer::SubmissionFinalizer;
use crate::guard::{Decision, NavigationGuard};
use crate::payload::{StepData, ValidationContext};
use crate::reference::ReferenceData;
use crate::registry::{Registries, StepRegistry};
use crate::repository::WizardRepository;
use crate::state::{ApplicationId, FieldPatch, SubmissionInfo, WizardState};
use crate::step::{ApplicationType, Step};
use crate::submission::SubmissionService;
use chrono::Utc;
use portal_session::{SessionId, SharedStore};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Everything needed to render one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    /// Application id
    pub application_id: ApplicationId,
    /// Flow
    pub application_type: ApplicationType,
    /// Step shown
    pub step: Step,
    /// Saved payload of this step, for pre-filling
    pub data: Option<StepData>,
    /// Every saved payload, on the review page only
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub summary: Vec<StepData>,
    /// Review page reached
    pub edit_mode: bool,
    /// Target of the back link
    pub back: Step,
    /// Recorded submission, on the confirmation page
    pub submission_info: Option<SubmissionInfo>,
}

/// Result of a navigation request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Navigation {
    /// Render the requested step
    Render(Box<StepView>),
    /// Redirect to another step
    Redirect {
        /// Target step
        to: Step,
    },
}

impl Navigation {
    /// Redirect target, if any
    #[must_use]
    pub fn redirect_target(&self) -> Option<Step> {
        match self {
            Navigation::Render(_) => None,
            Navigation::Redirect { to } => Some(*to),
        }
    }
}

/// Outcome of [`WizardEngine::begin`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Started {
    /// New application id
    pub application_id: ApplicationId,
    /// Where the flow starts
    pub first_step: Step,
    /// Anti-forgery token for subsequent posts
    pub csrf_token: String,
}

/// Apply wizard façade
#[derive(Debug, Clone)]
pub struct WizardEngine {
    repository: WizardRepository,
    registries: Arc<Registries>,
    finalizer: SubmissionFinalizer,
    tokens: CsrfTokens,
    captcha: Arc<dyn CaptchaVerifier>,
    config: WizardConfig,
    reference: &'static ReferenceData,
}

impl WizardEngine {
    /// Engine over a session store with the standard step tables
    #[must_use]
    pub fn new(
        store: SharedStore,
        service: Arc<dyn SubmissionService>,
        captcha: Arc<dyn CaptchaVerifier>,
        config: WizardConfig,
    ) -> Self {
        Self::with_registries(
            store,
            Arc::new(Registries::standard().clone()),
            service,
            captcha,
            config,
        )
    }

    /// Engine with custom step tables
    #[must_use]
    pub fn with_registries(
        store: SharedStore,
        registries: Arc<Registries>,
        service: Arc<dyn SubmissionService>,
        captcha: Arc<dyn CaptchaVerifier>,
        config: WizardConfig,
    ) -> Self {
        let repository = WizardRepository::new(store.clone(), config.session_ttl())
            .with_max_retries(config.max_retries)
            .with_claim_timeout(config.claim_timeout());
        let finalizer =
            SubmissionFinalizer::new(repository.clone(), Arc::clone(&registries), service);
        Self {
            repository,
            registries,
            finalizer,
            tokens: CsrfTokens::new(store, config.session_ttl()),
            captcha,
            config,
            reference: ReferenceData::builtin(),
        }
    }

    /// Repository used by the engine
    #[inline]
    #[must_use]
    pub fn repository(&self) -> &WizardRepository {
        &self.repository
    }

    /// Anti-forgery token store
    #[inline]
    #[must_use]
    pub fn tokens(&self) -> &CsrfTokens {
        &self.tokens
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    /// Step table of a flow
    pub fn registry(&self, application_type: ApplicationType) -> Result<&StepRegistry, WizardError> {
        self.registries
            .get(application_type)
            .ok_or(WizardError::UnknownStep {
                step: Step::TermsAndConditions,
                application_type,
            })
    }

    /// Start, or restart, an application
    #[instrument(skip(self, session), fields(session = %session))]
    pub async fn begin(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
    ) -> Result<Started, WizardError> {
        let registry = self.registry(application_type)?;
        let state = self.repository.start(session, application_type).await?;
        let csrf_token = self.tokens.rotate(session).await?;
        Ok(Started {
            application_id: state.id,
            first_step: registry.first_step(),
            csrf_token,
        })
    }

    /// Request a step page
    ///
    /// Without stored state the first step starts a fresh application and
    /// every other step redirects to it. Showing the review page turns on
    /// edit mode.
    #[instrument(skip(self, session), fields(session = %session))]
    pub async fn enter(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
        step: Step,
    ) -> Result<Navigation, WizardError> {
        let registry = self.registry(application_type)?;
        let first = registry.first_step();
        let mut state = match self.repository.load(session, application_type).await {
            Ok(state) => state,
            Err(WizardError::NotFound { .. }) if step == first => {
                self.repository.load_or_start(session, application_type).await?
            }
            Err(WizardError::NotFound { .. }) => return Ok(Navigation::Redirect { to: first }),
            Err(e) => return Err(e),
        };

        if let Decision::Redirect { to, .. } = NavigationGuard::new(registry).authorize(step, &state) {
            return Ok(Navigation::Redirect { to });
        }

        if step == Step::ReviewInformation && !state.edit_mode {
            state = self
                .repository
                .update(session, application_type, |s| {
                    s.edit_mode = true;
                    Ok(())
                })
                .await?;
        }

        Ok(Navigation::Render(Box::new(Self::view(registry, step, &state))))
    }

    fn view(registry: &StepRegistry, step: Step, state: &WizardState) -> StepView {
        let summary = if step == Step::ReviewInformation {
            registry
                .steps()
                .filter_map(|s| state.get(s).cloned())
                .collect()
        } else {
            Vec::new()
        };
        StepView {
            application_id: state.id,
            application_type: state.application_type,
            step,
            data: state.get(step).cloned(),
            summary,
            edit_mode: state.edit_mode,
            back: registry.resolve_predecessor(step, state),
            submission_info: state.submission_info.clone(),
        }
    }

    /// Validate and save a step's payload, then point at the next step
    ///
    /// A guard redirect is returned without saving anything.
    #[instrument(skip(self, session, data, csrf_token), fields(session = %session))]
    pub async fn submit_step(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
        step: Step,
        data: serde_json::Value,
        csrf_token: &str,
    ) -> Result<Navigation, WizardError> {
        self.tokens.verify(session, csrf_token).await?;

        let registry = self.registry(application_type)?;
        if !step.is_data() || !registry.contains(step) {
            return Err(WizardError::UnknownStep {
                step,
                application_type,
            });
        }

        let state = self.repository.load(session, application_type).await?;
        if let Decision::Redirect { to, .. } = NavigationGuard::new(registry).authorize(step, &state) {
            return Ok(Navigation::Redirect { to });
        }

        let payload = StepData::from_json(step, data).map_err(|e| {
            let mut errors = ValidationErrors::new();
            errors.add("data", e.to_string());
            WizardError::Validation(errors)
        })?;
        payload.validate(&ValidationContext {
            application_type,
            today: Utc::now().date_naive(),
            reference: self.reference,
        })?;

        let patch = dependent_clears(&payload)
            .into_iter()
            .fold(FieldPatch::set(payload), FieldPatch::with_clear);
        let saved = self.repository.save(session, application_type, patch).await?;

        let next = registry.resolve_successor(step, &saved);
        tracing::debug!(%step, %next, version = saved.version, "step saved");
        Ok(Navigation::Redirect { to: next })
    }

    /// Back-navigation target for a step
    pub async fn back(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
        step: Step,
    ) -> Result<Step, WizardError> {
        let registry = self.registry(application_type)?;
        match self.repository.load(session, application_type).await {
            Ok(state) => Ok(registry.resolve_predecessor(step, &state)),
            Err(WizardError::NotFound { .. }) => Ok(registry.first_step()),
            Err(e) => Err(e),
        }
    }

    /// Verify the CAPTCHA and submit the application
    #[instrument(skip(self, session, csrf_token, captcha_token), fields(session = %session))]
    pub async fn confirm(
        &self,
        session: &SessionId,
        application_type: ApplicationType,
        csrf_token: &str,
        captcha_token: &str,
        remote_addr: Option<IpAddr>,
    ) -> Result<SubmissionInfo, WizardError> {
        self.tokens.verify(session, csrf_token).await?;
        let state = self.repository.load(session, application_type).await?;
        if state.is_submitted() {
            return Err(WizardError::AlreadySubmitted);
        }

        let human = self
            .captcha
            .verify(captcha_token, remote_addr)
            .await
            .map_err(|e| WizardError::CaptchaUnavailable(e.to_string()))?;
        if !human {
            let session_cleared =
                self.config.captcha_failure_policy == CaptchaFailurePolicy::ClearSession;
            warn!(session_cleared, "captcha verification failed");
            if session_cleared {
                self.abandon(session).await?;
            }
            return Err(WizardError::CaptchaFailed { session_cleared });
        }

        self.finalizer.finalize(session, application_type).await
    }

    /// Discard the session's wizard state and token
    #[instrument(skip(self, session), fields(session = %session))]
    pub async fn abandon(&self, session: &SessionId) -> Result<(), WizardError> {
        self.repository.clear(session).await?;
        self.tokens.revoke(session).await?;
        info!("application abandoned");
        Ok(())
    }
}

/// Steps invalidated by a new payload
fn dependent_clears(payload: &StepData) -> Vec<Step> {
    match payload {
        StepData::ApplicantInformation(a) if !a.marital_status.has_partner() => {
            vec![Step::PartnerInformation]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::{CaptchaError, MockCaptchaVerifier, StaticCaptchaVerifier};
    use crate::fixtures;
    use crate::payload::MaritalStatus;
    use crate::submission::{MockSubmissionService, SubmissionReceipt};
    use portal_session::MemorySessionStore;
    use serde_json::json;

    fn engine_with(
        service: MockSubmissionService,
        captcha: Arc<dyn CaptchaVerifier>,
        config: WizardConfig,
    ) -> WizardEngine {
        WizardEngine::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(service),
            captcha,
            config,
        )
    }

    fn engine() -> WizardEngine {
        engine_with(
            MockSubmissionService::new(),
            Arc::new(StaticCaptchaVerifier::accepting()),
            WizardConfig::default(),
        )
    }

    fn data_json(data: &StepData) -> serde_json::Value {
        serde_json::to_value(data).unwrap()["data"].clone()
    }

    async fn fill(engine: &WizardEngine, session: &SessionId, csrf: &str, ty: ApplicationType) {
        let state = fixtures::complete_state(ty);
        let steps: Vec<Step> = engine.registry(ty).unwrap().steps().collect();
        for data in steps.into_iter().filter_map(|s| state.get(s).cloned()) {
            engine
                .submit_step(session, ty, data.step(), data_json(&data), csrf)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn enter_without_state_redirects_to_start() {
        let nav = engine()
            .enter(&SessionId::generate(), ApplicationType::Adult, Step::ContactInformation)
            .await
            .unwrap();
        assert_eq!(nav.redirect_target(), Some(Step::TermsAndConditions));
    }

    #[tokio::test]
    async fn enter_first_step_without_state_starts_application() {
        let engine = engine();
        let session = SessionId::generate();
        let nav = engine
            .enter(&session, ApplicationType::Child, Step::TermsAndConditions)
            .await
            .unwrap();
        let Navigation::Render(view) = nav else {
            panic!("expected the first step to render, got {nav:?}");
        };
        assert_eq!(view.step, Step::TermsAndConditions);
        assert_eq!(view.back, Step::TermsAndConditions);

        let stored = engine
            .repository()
            .load(&session, ApplicationType::Child)
            .await
            .unwrap();
        assert_eq!(stored.id, view.application_id);
    }

    #[tokio::test]
    async fn submit_step_advances() {
        let engine = engine();
        let session = SessionId::generate();
        let started = engine.begin(&session, ApplicationType::Adult).await.unwrap();
        assert_eq!(started.first_step, Step::TermsAndConditions);

        let nav = engine
            .submit_step(
                &session,
                ApplicationType::Adult,
                Step::TermsAndConditions,
                data_json(&fixtures::terms()),
                &started.csrf_token,
            )
            .await
            .unwrap();
        assert_eq!(nav.redirect_target(), Some(Step::TaxFiling));

        let nav = engine
            .submit_step(
                &session,
                ApplicationType::Adult,
                Step::TaxFiling,
                json!({ "filed_previous_year": false }),
                &started.csrf_token,
            )
            .await
            .unwrap();
        assert_eq!(nav.redirect_target(), Some(Step::FileYourTaxes));
    }

    #[tokio::test]
    async fn bad_token_rejected_before_anything_else() {
        let engine = engine();
        let session = SessionId::generate();
        engine.begin(&session, ApplicationType::Adult).await.unwrap();

        let err = engine
            .submit_step(
                &session,
                ApplicationType::Adult,
                Step::TermsAndConditions,
                data_json(&fixtures::terms()),
                "forged",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WizardError::SecurityTokenMismatch));
        let state = engine
            .repository()
            .load(&session, ApplicationType::Adult)
            .await
            .unwrap();
        assert!(state.fields.is_empty());
    }

    #[tokio::test]
    async fn invalid_payload_is_validation_error() {
        let engine = engine();
        let session = SessionId::generate();
        let started = engine.begin(&session, ApplicationType::Adult).await.unwrap();

        let err = engine
            .submit_step(
                &session,
                ApplicationType::Adult,
                Step::TermsAndConditions,
                json!({ "acknowledge_terms": "yes" }),
                &started.csrf_token,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WizardError::Validation(ref e) if e.contains("data")));

        let err = engine
            .submit_step(
                &session,
                ApplicationType::Adult,
                Step::TermsAndConditions,
                json!({ "acknowledge_terms": true, "acknowledge_privacy": true, "share_data": false }),
                &started.csrf_token,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WizardError::Validation(ref e) if e.contains("share_data")));
    }

    #[tokio::test]
    async fn premature_step_redirects_without_saving() {
        let engine = engine();
        let session = SessionId::generate();
        let started = engine.begin(&session, ApplicationType::Adult).await.unwrap();

        let nav = engine
            .submit_step(
                &session,
                ApplicationType::Adult,
                Step::ContactInformation,
                data_json(&StepData::ContactInformation(fixtures::contact())),
                &started.csrf_token,
            )
            .await
            .unwrap();
        assert_eq!(nav.redirect_target(), Some(Step::TermsAndConditions));
        let state = engine
            .repository()
            .load(&session, ApplicationType::Adult)
            .await
            .unwrap();
        assert!(!state.has(Step::ContactInformation));
    }

    #[tokio::test]
    async fn review_turns_on_edit_mode_and_lists_everything() {
        let engine = engine();
        let session = SessionId::generate();
        let started = engine.begin(&session, ApplicationType::Adult).await.unwrap();
        fill(&engine, &session, &started.csrf_token, ApplicationType::Adult).await;

        let nav = engine
            .enter(&session, ApplicationType::Adult, Step::ReviewInformation)
            .await
            .unwrap();
        let Navigation::Render(view) = nav else {
            panic!("expected render, got {nav:?}");
        };
        assert!(view.edit_mode);
        assert_eq!(view.summary.len(), 8);

        // Edits now return to review
        let nav = engine
            .submit_step(
                &session,
                ApplicationType::Adult,
                Step::DentalInsurance,
                json!({ "has_dental_insurance": true }),
                &started.csrf_token,
            )
            .await
            .unwrap();
        assert_eq!(nav.redirect_target(), Some(Step::ReviewInformation));
        assert_eq!(
            engine
                .back(&session, ApplicationType::Adult, Step::DentalInsurance)
                .await
                .unwrap(),
            Step::ReviewInformation
        );
    }

    #[tokio::test]
    async fn single_status_clears_partner() {
        let engine = engine();
        let session = SessionId::generate();
        let started = engine.begin(&session, ApplicationType::Adult).await.unwrap();
        for data in [
            fixtures::terms(),
            fixtures::tax_filing(true),
            fixtures::date_of_birth(),
            StepData::ApplicantInformation(fixtures::applicant(MaritalStatus::Married)),
            fixtures::partner(),
            StepData::ApplicantInformation(fixtures::applicant(MaritalStatus::Divorced)),
        ] {
            engine
                .submit_step(
                    &session,
                    ApplicationType::Adult,
                    data.step(),
                    data_json(&data),
                    &started.csrf_token,
                )
                .await
                .unwrap();
        }
        let state = engine
            .repository()
            .load(&session, ApplicationType::Adult)
            .await
            .unwrap();
        assert!(!state.has(Step::PartnerInformation));
    }

    #[tokio::test]
    async fn confirm_submits_once() {
        let mut service = MockSubmissionService::new();
        service.expect_submit().times(1).returning(|_| {
            Ok(SubmissionReceipt {
                confirmation_code: "ABC123".into(),
            })
        });
        let engine = engine_with(
            service,
            Arc::new(StaticCaptchaVerifier::accepting()),
            WizardConfig::default(),
        );
        let session = SessionId::generate();
        let started = engine.begin(&session, ApplicationType::Adult).await.unwrap();
        fill(&engine, &session, &started.csrf_token, ApplicationType::Adult).await;

        let info = engine
            .confirm(&session, ApplicationType::Adult, &started.csrf_token, "ok", None)
            .await
            .unwrap();
        assert_eq!(info.confirmation_code, "ABC123");

        let nav = engine
            .enter(&session, ApplicationType::Adult, Step::ContactInformation)
            .await
            .unwrap();
        assert_eq!(nav.redirect_target(), Some(Step::Confirmation));

        let Navigation::Render(view) = engine
            .enter(&session, ApplicationType::Adult, Step::Confirmation)
            .await
            .unwrap()
        else {
            panic!("confirmation should render");
        };
        assert_eq!(view.submission_info.unwrap().confirmation_code, "ABC123");

        assert!(matches!(
            engine
                .confirm(&session, ApplicationType::Adult, &started.csrf_token, "ok", None)
                .await,
            Err(WizardError::AlreadySubmitted)
        ));
    }

    #[tokio::test]
    async fn captcha_failure_policies() {
        for (policy, cleared) in [
            (CaptchaFailurePolicy::AllowRetry, false),
            (CaptchaFailurePolicy::ClearSession, true),
        ] {
            let mut service = MockSubmissionService::new();
            service.expect_submit().never();
            let engine = engine_with(
                service,
                Arc::new(StaticCaptchaVerifier::rejecting()),
                WizardConfig::default().with_captcha_failure_policy(policy),
            );
            let session = SessionId::generate();
            let started = engine.begin(&session, ApplicationType::Adult).await.unwrap();
            fill(&engine, &session, &started.csrf_token, ApplicationType::Adult).await;

            let err = engine
                .confirm(&session, ApplicationType::Adult, &started.csrf_token, "bot", None)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                WizardError::CaptchaFailed { session_cleared } if session_cleared == cleared
            ));

            let still_there = engine
                .repository()
                .find(&session)
                .await
                .unwrap()
                .is_some();
            assert_eq!(still_there, !cleared);
        }
    }

    #[tokio::test]
    async fn captcha_outage_is_retryable() {
        let mut captcha = MockCaptchaVerifier::new();
        captcha
            .expect_verify()
            .returning(|_, _| Err(CaptchaError::Unavailable("timeout".into())));
        let mut service = MockSubmissionService::new();
        service.expect_submit().never();
        let engine = engine_with(service, Arc::new(captcha), WizardConfig::default());
        let session = SessionId::generate();
        let started = engine.begin(&session, ApplicationType::Adult).await.unwrap();

        let err = engine
            .confirm(&session, ApplicationType::Adult, &started.csrf_token, "t", None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn abandon_then_enter_restarts() {
        let engine = engine();
        let session = SessionId::generate();
        let started = engine.begin(&session, ApplicationType::Child).await.unwrap();
        engine.abandon(&session).await.unwrap();

        assert!(engine.tokens().verify(&session, &started.csrf_token).await.is_err());
        let nav = engine
            .enter(&session, ApplicationType::Child, Step::TaxFiling)
            .await
            .unwrap();
        assert_eq!(nav.redirect_target(), Some(Step::TermsAndConditions));
    }
}
