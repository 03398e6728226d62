//! Persisted wizard state

use crate::lifecycle::Phase;
use crate::payload::{
    ApplicantInformation, ChildrenInformation, CommunicationPreference, ContactInformation,
    DateOfBirth, DentalBenefits, DentalInsurance, MaritalStatus, PartnerInformation, StepData,
    TaxFiling, TermsAndConditions,
};
use crate::step::{ApplicationType, Step};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Opaque application identifier, fixed for the life of a wizard state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(Uuid);

impl ApplicationId {
    /// Generate a fresh random id
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Result of a successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionInfo {
    /// Code returned by the submission service
    pub confirmation_code: String,
    /// When the submission was recorded
    pub submitted_on: DateTime<Utc>,
}

/// In-flight submission claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSubmission {
    /// Key sent with the service call
    pub idempotency_key: String,
    /// When the claim was written
    pub claimed_on: DateTime<Utc>,
}

impl PendingSubmission {
    /// Claim made now with a fresh idempotency key
    #[must_use]
    pub fn claim(now: DateTime<Utc>) -> Self {
        Self {
            idempotency_key: ulid::Ulid::new().to_string(),
            claimed_on: now,
        }
    }

    /// Same claim, with the same idempotency key, taken over at `now`
    #[must_use]
    pub fn renew(&self, now: DateTime<Utc>) -> Self {
        Self {
            idempotency_key: self.idempotency_key.clone(),
            claimed_on: now,
        }
    }

    /// Whether the claim has outlived `timeout`
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        let age = now.signed_duration_since(self.claimed_on);
        age.to_std().is_ok_and(|age| age >= timeout)
    }
}

/// Step payloads to write and remove in one merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    /// Payloads replacing whatever is stored for their step
    pub set: Vec<StepData>,
    /// Steps whose payload is dropped
    pub clear: Vec<Step>,
}

impl FieldPatch {
    /// Patch writing a single payload
    #[must_use]
    pub fn set(data: StepData) -> Self {
        Self {
            set: vec![data],
            clear: Vec::new(),
        }
    }

    /// Also drop `step`
    #[must_use]
    pub fn with_clear(mut self, step: Step) -> Self {
        self.clear.push(step);
        self
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.clear.is_empty()
    }
}

/// Everything the wizard persists for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardState {
    /// Application id
    pub id: ApplicationId,
    /// Flow discriminator
    #[serde(rename = "typeOfApplication")]
    pub application_type: ApplicationType,
    /// Saved payloads keyed by step
    #[serde(default)]
    pub fields: BTreeMap<Step, StepData>,
    /// Review page has been reached
    #[serde(default)]
    pub edit_mode: bool,
    /// Set once, on successful submission
    #[serde(default)]
    pub submission_info: Option<SubmissionInfo>,
    /// Submission claim held by an in-flight finalization
    #[serde(default)]
    pub pending_submission: Option<PendingSubmission>,
    /// Write counter
    #[serde(default)]
    pub version: u64,
    /// Creation time
    pub created_on: DateTime<Utc>,
    /// Last write time
    pub updated_on: DateTime<Utc>,
}

macro_rules! payload_accessor {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        #[must_use]
        pub fn $name(&self) -> Option<&$ty> {
            match self.fields.get(&Step::$variant) {
                Some(StepData::$variant(payload)) => Some(payload),
                _ => None,
            }
        }
    };
}

impl WizardState {
    /// Fresh state with a newly generated id
    #[must_use]
    pub fn new(application_type: ApplicationType) -> Self {
        let now = Utc::now();
        Self {
            id: ApplicationId::generate(),
            application_type,
            fields: BTreeMap::new(),
            edit_mode: false,
            submission_info: None,
            pending_submission: None,
            version: 0,
            created_on: now,
            updated_on: now,
        }
    }

    /// Derived lifecycle phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.submission_info.is_some() {
            Phase::Submitted
        } else if self.edit_mode {
            Phase::Review
        } else if self.fields.is_empty() {
            Phase::New
        } else {
            Phase::InProgress
        }
    }

    /// Whether a confirmation code is recorded
    #[inline]
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.submission_info.is_some()
    }

    /// Saved payload for a step
    #[inline]
    #[must_use]
    pub fn get(&self, step: Step) -> Option<&StepData> {
        self.fields.get(&step)
    }

    /// Whether a step has a saved payload
    #[inline]
    #[must_use]
    pub fn has(&self, step: Step) -> bool {
        self.fields.contains_key(&step)
    }

    /// Apply a patch; steps not named in it are left untouched
    pub fn merge(&mut self, patch: FieldPatch) {
        for step in patch.clear {
            self.fields.remove(&step);
        }
        for data in patch.set {
            self.fields.insert(data.step(), data);
        }
    }

    /// Marital status from the applicant step
    #[must_use]
    pub fn marital_status(&self) -> Option<MaritalStatus> {
        self.applicant_information().map(|a| a.marital_status)
    }

    payload_accessor!(
        /// Terms step payload
        terms_and_conditions, TermsAndConditions, TermsAndConditions
    );
    payload_accessor!(
        /// Tax filing step payload
        tax_filing, TaxFiling, TaxFiling
    );
    payload_accessor!(
        /// Date of birth step payload
        date_of_birth, DateOfBirth, DateOfBirth
    );
    payload_accessor!(
        /// Applicant step payload
        applicant_information, ApplicantInformation, ApplicantInformation
    );
    payload_accessor!(
        /// Partner step payload
        partner_information, PartnerInformation, PartnerInformation
    );
    payload_accessor!(
        /// Children step payload
        children_information, ChildrenInformation, ChildrenInformation
    );
    payload_accessor!(
        /// Contact step payload
        contact_information, ContactInformation, ContactInformation
    );
    payload_accessor!(
        /// Communication step payload
        communication_preference, CommunicationPreference, CommunicationPreference
    );
    payload_accessor!(
        /// Dental insurance step payload
        dental_insurance, DentalInsurance, DentalInsurance
    );
    payload_accessor!(
        /// Benefits step payload
        dental_benefits, FederalProvincialTerritorialBenefits, DentalBenefits
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn phase_follows_state() {
        let mut state = WizardState::new(ApplicationType::Adult);
        assert_eq!(state.phase(), Phase::New);

        state.merge(FieldPatch::set(fixtures::terms()));
        assert_eq!(state.phase(), Phase::InProgress);

        state.edit_mode = true;
        assert_eq!(state.phase(), Phase::Review);

        state.submission_info = Some(SubmissionInfo {
            confirmation_code: "ABC123".into(),
            submitted_on: Utc::now(),
        });
        assert_eq!(state.phase(), Phase::Submitted);
    }

    #[test]
    fn merge_replaces_and_clears() {
        let mut state = WizardState::new(ApplicationType::Adult);
        state.merge(FieldPatch::set(fixtures::tax_filing(true)));
        state.merge(FieldPatch::set(fixtures::tax_filing(false)));
        assert_eq!(state.tax_filing().map(|t| t.filed_previous_year), Some(false));

        state.merge(FieldPatch::set(fixtures::partner()));
        state.merge(
            FieldPatch::set(StepData::ApplicantInformation(fixtures::applicant(
                MaritalStatus::Single,
            )))
            .with_clear(Step::PartnerInformation),
        );
        assert!(!state.has(Step::PartnerInformation));
        assert_eq!(state.marital_status(), Some(MaritalStatus::Single));
    }

    #[test]
    fn state_json_uses_type_of_application_key() {
        let mut state = WizardState::new(ApplicationType::AdultChild);
        state.merge(FieldPatch::set(fixtures::terms()));

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["typeOfApplication"], "adult-child");
        assert!(json["fields"]["terms-and-conditions"].is_object());

        let back: WizardState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn pending_claim_staleness() {
        let now = Utc::now();
        let claim = PendingSubmission::claim(now - chrono::Duration::seconds(90));
        assert!(claim.is_stale(now, Duration::from_secs(60)));
        assert!(!claim.is_stale(now, Duration::from_secs(120)));

        // Clock skew: a claim from the future is never stale
        let future = PendingSubmission::claim(now + chrono::Duration::seconds(30));
        assert!(!future.is_stale(now, Duration::from_secs(1)));
    }

    proptest! {
        #[test]
        fn prop_merge_is_last_write_wins_per_step(
            writes in prop::collection::vec((0usize..4, any::<bool>()), 1..24)
        ) {
            let payload = |idx: usize, flag: bool| match idx {
                0 => fixtures::tax_filing(flag),
                1 => StepData::DentalInsurance(DentalInsurance { has_dental_insurance: flag }),
                2 => StepData::ApplicantInformation(fixtures::applicant(
                    if flag { MaritalStatus::Married } else { MaritalStatus::Single },
                )),
                _ => fixtures::terms(),
            };

            let mut state = WizardState::new(ApplicationType::Adult);
            let mut expected = BTreeMap::new();
            for (idx, flag) in writes {
                let data = payload(idx, flag);
                expected.insert(data.step(), data.clone());
                state.merge(FieldPatch::set(data));
            }
            prop_assert_eq!(state.fields, expected);
        }
    }
}
