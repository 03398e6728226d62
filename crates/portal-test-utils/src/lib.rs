//! Testing utilities for the portal workspace
//!
//! Fake collaborators and pre-wired services.

use async_trait::async_trait;
use parking_lot::Mutex;
use portal_session::{MemorySessionStore, SessionId, SharedStore};
use portal_subscriptions::{
    ConfirmationCode, ConfirmationCodeConfig, EmailSender, NotificationError, UserService,
};
use portal_wizard::{
    ApplicationType, StaticCaptchaVerifier, StepData, SubmissionError, SubmissionReceipt,
    SubmissionRequest, SubmissionService, WizardConfig, WizardEngine, WizardError, WizardState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use portal_wizard::fixtures;

/// Submission service that records requests and answers from a script
#[derive(Debug)]
pub struct RecordingSubmissionService {
    confirmation_code: String,
    failure: Option<SubmissionError>,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<SubmissionRequest>>,
}

impl RecordingSubmissionService {
    /// Always answers with `confirmation_code`
    pub fn accepting(confirmation_code: &str) -> Self {
        Self {
            confirmation_code: confirmation_code.to_string(),
            failure: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always fails with `error`
    pub fn failing(error: SubmissionError) -> Self {
        Self {
            failure: Some(error),
            ..Self::accepting("")
        }
    }

    /// Wait before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of `submit` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received, in call order
    pub fn requests(&self) -> Vec<SubmissionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SubmissionService for RecordingSubmissionService {
    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(SubmissionReceipt {
                confirmation_code: self.confirmation_code.clone(),
            }),
        }
    }
}

/// E-mail sender that keeps every sent code
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<(String, String, ConfirmationCode)>>,
}

impl RecordingEmailSender {
    /// Sender with nothing recorded
    pub fn new() -> Self {
        Self::default()
    }

    /// `(email, language, code)` triples in send order
    pub fn sent(&self) -> Vec<(String, String, ConfirmationCode)> {
        self.sent.lock().clone()
    }

    /// Code most recently sent to `email`
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|(to, _, _)| to == email)
            .map(|(_, _, code)| code.code.clone())
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_confirmation_code(
        &self,
        email: &str,
        language: &str,
        code: &ConfirmationCode,
    ) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .push((email.to_string(), language.to_string(), code.clone()));
        Ok(())
    }
}

/// Engine wired to the pieces a test needs to inspect
#[derive(Debug, Clone)]
pub struct TestEngine {
    /// Engine under test
    pub engine: WizardEngine,
    /// Session store behind the engine
    pub store: SharedStore,
    /// Submission service the engine calls
    pub service: Arc<RecordingSubmissionService>,
}

/// Engine over an in-memory store, accepting CAPTCHA, answering `ABC123`
pub fn setup_test_engine() -> TestEngine {
    setup_test_engine_with(
        RecordingSubmissionService::accepting("ABC123"),
        WizardConfig::new(),
    )
}

/// Engine over an in-memory store with a given service and configuration
pub fn setup_test_engine_with(
    service: RecordingSubmissionService,
    config: WizardConfig,
) -> TestEngine {
    let store: SharedStore = Arc::new(MemorySessionStore::new());
    let service = Arc::new(service);
    let engine = WizardEngine::new(
        store.clone(),
        service.clone(),
        Arc::new(StaticCaptchaVerifier::accepting()),
        config,
    );
    TestEngine {
        engine,
        store,
        service,
    }
}

/// Persist a complete, unsubmitted application for `session`
///
/// Goes through the phases one write at a time.
pub async fn seed_complete_state(
    engine: &WizardEngine,
    session: &SessionId,
    application_type: ApplicationType,
) -> Result<WizardState, WizardError> {
    let complete = fixtures::complete_state(application_type);
    let repository = engine.repository();
    repository.start(session, application_type).await?;
    repository
        .update(session, application_type, |state| {
            state.fields.clone_from(&complete.fields);
            Ok(())
        })
        .await?;
    repository
        .update(session, application_type, |state| {
            state.edit_mode = true;
            Ok(())
        })
        .await
}

/// Request body for a step: the payload without its step tag
pub fn payload_json(data: &StepData) -> serde_json::Value {
    serde_json::to_value(data)
        .map(|mut v| v["data"].take())
        .unwrap_or_default()
}

/// Submit every payload of a complete application in step order
pub async fn fill_application(
    engine: &WizardEngine,
    session: &SessionId,
    csrf_token: &str,
    application_type: ApplicationType,
) -> Result<Vec<StepData>, WizardError> {
    let complete = fixtures::complete_state(application_type);
    let mut submitted = Vec::new();
    for step in engine.registry(application_type)?.steps() {
        if let Some(data) = complete.get(step) {
            engine
                .submit_step(session, application_type, step, payload_json(data), csrf_token)
                .await?;
            submitted.push(data.clone());
        }
    }
    Ok(submitted)
}

/// User service delivering codes to a [`RecordingEmailSender`]
pub fn setup_test_user_service() -> (UserService, Arc<RecordingEmailSender>) {
    let email = Arc::new(RecordingEmailSender::new());
    let service = UserService::new(email.clone(), ConfirmationCodeConfig::default());
    (service, email)
}
