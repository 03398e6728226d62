//! Portal Wizard - multi-step apply flow
//!
//! A linear step wizard with branch-dependent navigation and server-side
//! persisted partial state:
//! - Step tables per application type ([`Registries`])
//! - Access decisions for requested steps ([`NavigationGuard`])
//! - Merge-only, compare-and-swap persisted state ([`WizardRepository`])
//! - Exactly-once submission of completed applications ([`SubmissionFinalizer`])
//! - A façade for web handlers ([`WizardEngine`])
//!
//! # Example
//!
//! ```rust,ignore
//! use portal_wizard::{ApplicationType, Step, WizardConfig, WizardEngine};
//!
//! let engine = WizardEngine::new(store, submission_service, captcha, WizardConfig::new());
//! let started = engine.begin(&session, ApplicationType::Adult).await?;
//! let nav = engine
//!     .submit_step(&session, ApplicationType::Adult, Step::TermsAndConditions, data, &started.csrf_token)
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod captcha;
pub mod config;
pub mod csrf;
pub mod engine;
pub mod error;
pub mod finalizer;
pub mod guard;
pub mod lifecycle;
pub mod payload;
pub mod reference;
pub mod registry;
pub mod repository;
pub mod state;
pub mod step;
pub mod submission;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

// Re-exports for convenience
pub use captcha::{
    CaptchaError, CaptchaFailurePolicy, CaptchaVerifier, HttpCaptchaVerifier,
    StaticCaptchaVerifier,
};
pub use config::WizardConfig;
pub use csrf::CsrfTokens;
pub use engine::{Navigation, Started, StepView, WizardEngine};
pub use error::{ValidationErrors, WizardError};
pub use finalizer::SubmissionFinalizer;
pub use guard::{Decision, NavigationGuard, RedirectReason};
pub use lifecycle::{allowed_transitions, validate_transition, Phase};
pub use payload::{StepData, ValidationContext};
pub use reference::ReferenceData;
pub use registry::{Registries, StepDefinition, StepRegistry};
pub use repository::WizardRepository;
pub use state::{ApplicationId, FieldPatch, PendingSubmission, SubmissionInfo, WizardState};
pub use step::{ApplicationType, Step, StepKind};
pub use submission::{
    HttpSubmissionService, SubmissionError, SubmissionPayload, SubmissionReceipt,
    SubmissionRequest, SubmissionService,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
