//! Valid sample payloads and states
//!
//! Compiled for this crate's tests and, with the `fixtures` feature, for
//! downstream test code.

use crate::payload::{
    Address, ApplicantInformation, ChildInformation, ChildrenInformation, CommunicationMethod,
    CommunicationPreference, ContactInformation, DateOfBirth, DentalBenefits, DentalInsurance,
    MaritalStatus, PartnerInformation, StepData, TaxFiling, TermsAndConditions,
};
use crate::state::{FieldPatch, WizardState};
use crate::step::ApplicationType;
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// All acknowledgements given
#[must_use]
pub fn terms() -> StepData {
    StepData::TermsAndConditions(TermsAndConditions {
        acknowledge_terms: true,
        acknowledge_privacy: true,
        share_data: true,
    })
}

/// Tax filing answer
#[must_use]
pub fn tax_filing(filed: bool) -> StepData {
    StepData::TaxFiling(TaxFiling {
        filed_previous_year: filed,
    })
}

/// Adult date of birth
#[must_use]
pub fn date_of_birth() -> StepData {
    StepData::DateOfBirth(DateOfBirth {
        date_of_birth: date(1985, 4, 12),
    })
}

/// Applicant with the given marital status
#[must_use]
pub fn applicant(marital_status: MaritalStatus) -> ApplicantInformation {
    ApplicantInformation {
        first_name: "Jean".into(),
        last_name: "Tremblay".into(),
        social_insurance_number: "046 454 286".into(),
        marital_status,
    }
}

/// Consenting partner
#[must_use]
pub fn partner() -> StepData {
    StepData::PartnerInformation(PartnerInformation {
        first_name: "Alex".into(),
        last_name: "Tremblay".into(),
        date_of_birth: date(1986, 9, 30),
        social_insurance_number: "130692544".into(),
        confirm: true,
    })
}

/// Young child without insurance
#[must_use]
pub fn child() -> ChildInformation {
    ChildInformation {
        first_name: "Sam".into(),
        last_name: "Tremblay".into(),
        date_of_birth: date(2018, 3, 15),
        social_insurance_number: None,
        is_parent: true,
        has_dental_insurance: false,
    }
}

/// Ottawa mailing address, home same as mailing
#[must_use]
pub fn contact() -> ContactInformation {
    ContactInformation {
        phone_number: Some("613-555-0199".into()),
        alternate_phone_number: None,
        mailing_address: Address {
            address: "111 Wellington St".into(),
            apartment: None,
            city: "Ottawa".into(),
            province: Some("ON".into()),
            postal_code: Some("K1A 0B1".into()),
            country: "CAN".into(),
        },
        home_address: None,
    }
}

/// English by e-mail
#[must_use]
pub fn communication() -> StepData {
    StepData::CommunicationPreference(CommunicationPreference {
        preferred_language: "en".into(),
        preferred_method: CommunicationMethod::Email,
        email: Some("jean.tremblay@example.com".into()),
    })
}

/// No private insurance
#[must_use]
pub fn dental_insurance() -> StepData {
    StepData::DentalInsurance(DentalInsurance {
        has_dental_insurance: false,
    })
}

/// Enrolled in an Ontario programme
#[must_use]
pub fn benefits() -> StepData {
    StepData::FederalProvincialTerritorialBenefits(DentalBenefits {
        federal_programme: None,
        province: Some("ON".into()),
        provincial_programme: Some("ON-HSO".into()),
    })
}

/// Every payload of an adult application with a single applicant
#[must_use]
pub fn all_payloads(include_children: bool) -> Vec<StepData> {
    let mut payloads = vec![
        terms(),
        tax_filing(true),
        date_of_birth(),
        StepData::ApplicantInformation(applicant(MaritalStatus::Single)),
        StepData::ContactInformation(contact()),
        communication(),
        dental_insurance(),
        benefits(),
    ];
    if include_children {
        payloads.push(StepData::ChildrenInformation(ChildrenInformation {
            children: vec![child()],
        }));
    }
    payloads
}

/// State holding every payload the flow requires, not yet reviewed
#[must_use]
pub fn complete_state(application_type: ApplicationType) -> WizardState {
    let set = match application_type {
        ApplicationType::Adult => all_payloads(false),
        ApplicationType::AdultChild => all_payloads(true),
        ApplicationType::Child => vec![
            terms(),
            tax_filing(true),
            date_of_birth(),
            StepData::ChildrenInformation(ChildrenInformation {
                children: vec![child()],
            }),
            StepData::ApplicantInformation(applicant(MaritalStatus::Single)),
            StepData::ContactInformation(contact()),
            communication(),
        ],
        ApplicationType::Delegate => vec![terms()],
    };
    let mut state = WizardState::new(application_type);
    state.merge(FieldPatch {
        set,
        clear: Vec::new(),
    });
    state
}
