//! Step and application-type identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One page of the apply wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// Terms, conditions and privacy notice
    TermsAndConditions,
    /// Whether the applicant filed last year's taxes
    TaxFiling,
    /// Exit page for applicants who have not filed
    FileYourTaxes,
    /// Applicant date of birth
    DateOfBirth,
    /// Applicant name, SIN and marital status
    ApplicantInformation,
    /// Spouse or common-law partner
    PartnerInformation,
    /// Children covered by the application
    ChildrenInformation,
    /// Phone, e-mail and addresses
    ContactInformation,
    /// Language and contact method
    CommunicationPreference,
    /// Access to private dental insurance
    DentalInsurance,
    /// Federal and provincial/territorial dental benefits
    FederalProvincialTerritorialBenefits,
    /// Review of everything entered so far
    ReviewInformation,
    /// Post-submission confirmation
    Confirmation,
    /// Exit page for people applying on someone else's behalf
    ApplicationDelegate,
}

/// What kind of page a step is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Collects and persists a payload
    Data,
    /// Review page; reaching it turns on edit mode
    Review,
    /// Informational dead end (ineligible, delegate)
    Exit,
    /// Terminal confirmation page
    Confirmation,
}

impl Step {
    /// Every step, in declaration order
    pub const ALL: [Step; 14] = [
        Step::TermsAndConditions,
        Step::TaxFiling,
        Step::FileYourTaxes,
        Step::DateOfBirth,
        Step::ApplicantInformation,
        Step::PartnerInformation,
        Step::ChildrenInformation,
        Step::ContactInformation,
        Step::CommunicationPreference,
        Step::DentalInsurance,
        Step::FederalProvincialTerritorialBenefits,
        Step::ReviewInformation,
        Step::Confirmation,
        Step::ApplicationDelegate,
    ];

    /// URL-safe identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Step::TermsAndConditions => "terms-and-conditions",
            Step::TaxFiling => "tax-filing",
            Step::FileYourTaxes => "file-your-taxes",
            Step::DateOfBirth => "date-of-birth",
            Step::ApplicantInformation => "applicant-information",
            Step::PartnerInformation => "partner-information",
            Step::ChildrenInformation => "children-information",
            Step::ContactInformation => "contact-information",
            Step::CommunicationPreference => "communication-preference",
            Step::DentalInsurance => "dental-insurance",
            Step::FederalProvincialTerritorialBenefits => {
                "federal-provincial-territorial-benefits"
            }
            Step::ReviewInformation => "review-information",
            Step::Confirmation => "confirmation",
            Step::ApplicationDelegate => "application-delegate",
        }
    }

    /// Page kind
    #[must_use]
    pub const fn kind(self) -> StepKind {
        match self {
            Step::ReviewInformation => StepKind::Review,
            Step::Confirmation => StepKind::Confirmation,
            Step::FileYourTaxes | Step::ApplicationDelegate => StepKind::Exit,
            _ => StepKind::Data,
        }
    }

    /// Whether the step persists a payload
    #[inline]
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self.kind(), StepKind::Data)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown step or application type identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseIdError {
    kind: &'static str,
    value: String,
}

impl FromStr for Step {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| ParseIdError {
                kind: "step",
                value: s.to_string(),
            })
    }
}

/// Discriminator selecting the step sequence for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationType {
    /// Adult applying for themselves
    Adult,
    /// Adult applying for themselves and their children
    AdultChild,
    /// Parent or guardian applying for children only
    Child,
    /// Someone applying on behalf of another person
    Delegate,
}

impl ApplicationType {
    /// Every application type
    pub const ALL: [ApplicationType; 4] = [
        ApplicationType::Adult,
        ApplicationType::AdultChild,
        ApplicationType::Child,
        ApplicationType::Delegate,
    ];

    /// URL-safe identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ApplicationType::Adult => "adult",
            ApplicationType::AdultChild => "adult-child",
            ApplicationType::Child => "child",
            ApplicationType::Delegate => "delegate",
        }
    }

    /// Whether children are part of this application
    #[inline]
    #[must_use]
    pub const fn includes_children(self) -> bool {
        matches!(self, ApplicationType::AdultChild | ApplicationType::Child)
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationType {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| ParseIdError {
                kind: "application type",
                value: s.to_string(),
            })
    }
}
