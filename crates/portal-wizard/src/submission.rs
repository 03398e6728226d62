//! External submission collaborator
//!
//! [`SubmissionPayload::from_state`] maps saved step payloads one-to-one onto
//! the record the benefits back end expects. [`SubmissionService`] is the
//! seam to that back end; [`HttpSubmissionService`] is the production
//! implementation.

use crate::error::WizardError;
use crate::payload::{
    ChildInformation, CommunicationPreference, ContactInformation, DentalBenefits,
    MaritalStatus, PartnerInformation,
};
use crate::state::{ApplicationId, WizardState};
use crate::step::{ApplicationType, Step};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

/// Applicant part of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantRecord {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Date of birth
    pub date_of_birth: NaiveDate,
    /// SIN, digits only
    pub social_insurance_number: String,
    /// Marital status
    pub marital_status: MaritalStatus,
}

/// Record sent to the submission service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    /// Application id
    pub application_id: ApplicationId,
    /// Flow the application came from
    pub type_of_application: ApplicationType,
    /// Applicant
    pub applicant: ApplicantRecord,
    /// Partner, when declared
    pub partner: Option<PartnerInformation>,
    /// Children, empty for adult-only applications
    pub children: Vec<ChildInformation>,
    /// Contact details
    pub contact: ContactInformation,
    /// Communication preference
    pub communication: CommunicationPreference,
    /// Applicant has private dental insurance
    pub has_dental_insurance: Option<bool>,
    /// Public dental benefits
    pub dental_benefits: Option<DentalBenefits>,
    /// Data-sharing consent
    pub share_data: bool,
}

impl SubmissionPayload {
    /// Build the payload from saved steps
    ///
    /// Fails with `IncompleteApplication` naming the steps the payload
    /// cannot be built without.
    pub fn from_state(state: &WizardState) -> Result<Self, WizardError> {
        let terms = state.terms_and_conditions();
        let dob = state.date_of_birth();
        let applicant = state.applicant_information();
        let contact = state.contact_information();
        let communication = state.communication_preference();

        let (Some(terms), Some(dob), Some(applicant), Some(contact), Some(communication)) =
            (terms, dob, applicant, contact, communication)
        else {
            let missing = [
                (Step::TermsAndConditions, terms.is_none()),
                (Step::DateOfBirth, dob.is_none()),
                (Step::ApplicantInformation, applicant.is_none()),
                (Step::ContactInformation, contact.is_none()),
                (Step::CommunicationPreference, communication.is_none()),
            ]
            .into_iter()
            .filter_map(|(step, absent)| absent.then_some(step))
            .collect();
            return Err(WizardError::IncompleteApplication { missing });
        };

        Ok(Self {
            application_id: state.id,
            type_of_application: state.application_type,
            applicant: ApplicantRecord {
                first_name: applicant.first_name.trim().to_string(),
                last_name: applicant.last_name.trim().to_string(),
                date_of_birth: dob.date_of_birth,
                social_insurance_number: digits_only(&applicant.social_insurance_number),
                marital_status: applicant.marital_status,
            },
            partner: state
                .partner_information()
                .filter(|_| applicant.marital_status.has_partner())
                .cloned(),
            children: state
                .children_information()
                .map(|c| c.children.clone())
                .unwrap_or_default(),
            contact: contact.clone(),
            communication: communication.clone(),
            has_dental_insurance: state.dental_insurance().map(|d| d.has_dental_insurance),
            dental_benefits: state.dental_benefits().cloned(),
            share_data: terms.share_data,
        })
    }
}

fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// One submission attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionRequest {
    /// Key identifying the attempt; repeated calls with it are deduplicated
    pub idempotency_key: String,
    /// Application record
    pub payload: SubmissionPayload,
}

/// Successful submission response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    /// Code to show the applicant
    pub confirmation_code: String,
}

/// Submission collaborator failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    /// Service unreachable or timed out
    #[error("transport error: {0}")]
    Transport(String),

    /// Service answered with an error status
    #[error("rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Success status with an unreadable body
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl SubmissionError {
    /// Check if the call may succeed when repeated
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SubmissionError::Transport(_) => true,
            SubmissionError::Rejected { status, .. } => *status >= 500 || *status == 429,
            SubmissionError::InvalidResponse(_) => false,
        }
    }
}

/// Back end accepting completed applications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubmissionService: Send + Sync + Debug {
    /// Submit one application
    async fn submit(&self, request: &SubmissionRequest)
        -> Result<SubmissionReceipt, SubmissionError>;
}

/// Idempotency header sent with every submission
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Submission over HTTP: `POST <endpoint>` with a JSON body
#[derive(Debug, Clone)]
pub struct HttpSubmissionService {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSubmissionService {
    /// Create a client with a request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Target URL
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SubmissionService for HttpSubmissionService {
    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(IDEMPOTENCY_HEADER, &request.idempotency_key)
            .json(&request.payload)
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<SubmissionReceipt>()
            .await
            .map_err(|e| SubmissionError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::payload::StepData;
    use crate::state::FieldPatch;
    use pretty_assertions::assert_eq;

    #[test]
    fn payload_maps_saved_steps() {
        let state = fixtures::complete_state(ApplicationType::AdultChild);
        let payload = SubmissionPayload::from_state(&state).unwrap();

        assert_eq!(payload.application_id, state.id);
        assert_eq!(payload.type_of_application, ApplicationType::AdultChild);
        assert_eq!(payload.applicant.social_insurance_number, "046454286");
        assert_eq!(payload.children.len(), 1);
        assert!(payload.partner.is_none());
        assert_eq!(payload.has_dental_insurance, Some(false));
        assert!(payload.share_data);
    }

    #[test]
    fn payload_includes_partner_only_with_partnered_status() {
        let mut state = fixtures::complete_state(ApplicationType::Adult);
        state.merge(FieldPatch::set(fixtures::partner()));
        assert!(SubmissionPayload::from_state(&state).unwrap().partner.is_none());

        state.merge(FieldPatch::set(StepData::ApplicantInformation(
            fixtures::applicant(MaritalStatus::Married),
        )));
        assert!(SubmissionPayload::from_state(&state).unwrap().partner.is_some());
    }

    #[test]
    fn payload_reports_missing_steps() {
        let state = WizardState::new(ApplicationType::Adult);
        match SubmissionPayload::from_state(&state) {
            Err(WizardError::IncompleteApplication { missing }) => {
                assert_eq!(missing.len(), 5);
                assert_eq!(missing[0], Step::TermsAndConditions);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn payload_json_is_camel_case() {
        let state = fixtures::complete_state(ApplicationType::Adult);
        let json = serde_json::to_value(SubmissionPayload::from_state(&state).unwrap()).unwrap();
        assert_eq!(json["typeOfApplication"], "adult");
        assert!(json["applicant"]["socialInsuranceNumber"].is_string());
    }

    #[test]
    fn retryable_submission_errors() {
        assert!(SubmissionError::Transport("reset".into()).is_retryable());
        assert!(SubmissionError::Rejected {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(!SubmissionError::Rejected {
            status: 422,
            message: String::new()
        }
        .is_retryable());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let service =
            HttpSubmissionService::new("http://127.0.0.1:9/applications", Duration::from_millis(200))
                .unwrap();
        let request = SubmissionRequest {
            idempotency_key: "01HZX".into(),
            payload: SubmissionPayload::from_state(&fixtures::complete_state(ApplicationType::Adult))
                .unwrap(),
        };
        assert!(matches!(
            service.submit(&request).await,
            Err(SubmissionError::Transport(_))
        ));
    }
}
