//! Typed step payloads and their validation
//!
//! Each data step persists exactly one [`StepData`] variant. Validation is
//! field-level and never touches stored state.

use crate::error::ValidationErrors;
use crate::reference::{ReferenceData, CANADA, USA};
use crate::step::{ApplicationType, Step};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const MAX_NAME_LEN: usize = 100;
const ADULT_AGE: u32 = 18;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));
static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?1?[\s.-]?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}$").expect("static regex")
});
static POSTAL_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ABCEGHJ-NPRSTVXY]\d[ABCEGHJ-NPRSTV-Z] ?\d[ABCEGHJ-NPRSTV-Z]\d$")
        .expect("static regex")
});
static ZIP_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("static regex"));

/// Inputs validation depends on besides the payload itself
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Flow being filled in
    pub application_type: ApplicationType,
    /// Date used for age and future-date checks
    pub today: NaiveDate,
    /// Reference catalogs
    pub reference: &'a ReferenceData,
}

impl<'a> ValidationContext<'a> {
    /// Context for today with the built-in catalogs
    #[must_use]
    pub fn current(application_type: ApplicationType) -> ValidationContext<'static> {
        ValidationContext {
            application_type,
            today: chrono::Utc::now().date_naive(),
            reference: ReferenceData::builtin(),
        }
    }
}

/// Payload of one data step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", content = "data", rename_all = "kebab-case")]
pub enum StepData {
    /// Terms and privacy acknowledgements
    TermsAndConditions(TermsAndConditions),
    /// Tax filing answer
    TaxFiling(TaxFiling),
    /// Applicant date of birth
    DateOfBirth(DateOfBirth),
    /// Applicant identity
    ApplicantInformation(ApplicantInformation),
    /// Partner identity
    PartnerInformation(PartnerInformation),
    /// Children
    ChildrenInformation(ChildrenInformation),
    /// Contact details
    ContactInformation(ContactInformation),
    /// Language and method
    CommunicationPreference(CommunicationPreference),
    /// Private insurance answer
    DentalInsurance(DentalInsurance),
    /// Public benefits
    FederalProvincialTerritorialBenefits(DentalBenefits),
}

impl StepData {
    /// Step this payload belongs to
    #[must_use]
    pub fn step(&self) -> Step {
        match self {
            StepData::TermsAndConditions(_) => Step::TermsAndConditions,
            StepData::TaxFiling(_) => Step::TaxFiling,
            StepData::DateOfBirth(_) => Step::DateOfBirth,
            StepData::ApplicantInformation(_) => Step::ApplicantInformation,
            StepData::PartnerInformation(_) => Step::PartnerInformation,
            StepData::ChildrenInformation(_) => Step::ChildrenInformation,
            StepData::ContactInformation(_) => Step::ContactInformation,
            StepData::CommunicationPreference(_) => Step::CommunicationPreference,
            StepData::DentalInsurance(_) => Step::DentalInsurance,
            StepData::FederalProvincialTerritorialBenefits(_) => {
                Step::FederalProvincialTerritorialBenefits
            }
        }
    }

    /// Decode the bare payload posted for `step`
    pub fn from_json(step: Step, data: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "step": step, "data": data }))
    }

    /// Validate against the context
    pub fn validate(&self, ctx: &ValidationContext<'_>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match self {
            StepData::TermsAndConditions(p) => p.validate_into(&mut errors),
            StepData::TaxFiling(_) | StepData::DentalInsurance(_) => {}
            StepData::DateOfBirth(p) => p.validate_into(ctx, &mut errors),
            StepData::ApplicantInformation(p) => p.validate_into(&mut errors),
            StepData::PartnerInformation(p) => p.validate_into(ctx, &mut errors),
            StepData::ChildrenInformation(p) => p.validate_into(ctx, &mut errors),
            StepData::ContactInformation(p) => p.validate_into(ctx, &mut errors),
            StepData::CommunicationPreference(p) => p.validate_into(ctx, &mut errors),
            StepData::FederalProvincialTerritorialBenefits(p) => {
                p.validate_into(ctx, &mut errors);
            }
        }
        errors.into_result()
    }
}

/// Terms and conditions step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsAndConditions {
    /// Terms accepted
    pub acknowledge_terms: bool,
    /// Privacy notice accepted
    pub acknowledge_privacy: bool,
    /// Consent to share data with the benefits administrator
    pub share_data: bool,
}

impl TermsAndConditions {
    fn validate_into(&self, errors: &mut ValidationErrors) {
        errors.check(!self.acknowledge_terms, "acknowledge_terms", "must be accepted");
        errors.check(!self.acknowledge_privacy, "acknowledge_privacy", "must be accepted");
        errors.check(!self.share_data, "share_data", "must be accepted");
    }
}

/// Tax filing step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxFiling {
    /// Filed the previous year's return
    pub filed_previous_year: bool,
}

/// Date of birth step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOfBirth {
    /// Applicant date of birth
    pub date_of_birth: NaiveDate,
}

impl DateOfBirth {
    fn validate_into(&self, ctx: &ValidationContext<'_>, errors: &mut ValidationErrors) {
        if self.date_of_birth > ctx.today {
            errors.add("date_of_birth", "must not be in the future");
        } else if age_on(self.date_of_birth, ctx.today) < ADULT_AGE {
            errors.add("date_of_birth", "applicant must be at least 18 years old");
        }
    }
}

/// Marital status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaritalStatus {
    /// Single, never married
    Single,
    /// Married
    Married,
    /// Common-law
    CommonLaw,
    /// Separated
    Separated,
    /// Divorced
    Divorced,
    /// Widowed
    Widowed,
}

impl MaritalStatus {
    /// Whether a partner must be declared
    #[inline]
    #[must_use]
    pub fn has_partner(self) -> bool {
        matches!(self, MaritalStatus::Married | MaritalStatus::CommonLaw)
    }
}

/// Applicant information step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantInformation {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Social Insurance Number
    pub social_insurance_number: String,
    /// Marital status
    pub marital_status: MaritalStatus,
}

impl ApplicantInformation {
    fn validate_into(&self, errors: &mut ValidationErrors) {
        validate_name(errors, "first_name", &self.first_name);
        validate_name(errors, "last_name", &self.last_name);
        validate_sin(errors, "social_insurance_number", &self.social_insurance_number);
    }
}

/// Partner information step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerInformation {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Partner date of birth
    pub date_of_birth: NaiveDate,
    /// Partner SIN
    pub social_insurance_number: String,
    /// Partner consented to sharing
    pub confirm: bool,
}

impl PartnerInformation {
    fn validate_into(&self, ctx: &ValidationContext<'_>, errors: &mut ValidationErrors) {
        validate_name(errors, "first_name", &self.first_name);
        validate_name(errors, "last_name", &self.last_name);
        errors.check(
            self.date_of_birth > ctx.today,
            "date_of_birth",
            "must not be in the future",
        );
        validate_sin(errors, "social_insurance_number", &self.social_insurance_number);
        errors.check(!self.confirm, "confirm", "partner consent is required");
    }
}

/// One child
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildInformation {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Child date of birth
    pub date_of_birth: NaiveDate,
    /// Child SIN, when one has been issued
    #[serde(default)]
    pub social_insurance_number: Option<String>,
    /// Applicant is parent or legal guardian
    pub is_parent: bool,
    /// Child has access to private dental insurance
    pub has_dental_insurance: bool,
}

impl ChildInformation {
    fn validate_into(&self, ctx: &ValidationContext<'_>, errors: &mut ValidationErrors) {
        validate_name(errors, "first_name", &self.first_name);
        validate_name(errors, "last_name", &self.last_name);
        if self.date_of_birth > ctx.today {
            errors.add("date_of_birth", "must not be in the future");
        } else if age_on(self.date_of_birth, ctx.today) >= ADULT_AGE {
            errors.add("date_of_birth", "child must be under 18 years old");
        }
        if let Some(sin) = &self.social_insurance_number {
            validate_sin(errors, "social_insurance_number", sin);
        }
        errors.check(
            !self.is_parent,
            "is_parent",
            "only a parent or legal guardian can apply for a child",
        );
    }
}

/// Children information step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildrenInformation {
    /// Children on the application
    pub children: Vec<ChildInformation>,
}

impl ChildrenInformation {
    fn validate_into(&self, ctx: &ValidationContext<'_>, errors: &mut ValidationErrors) {
        if !ctx.application_type.includes_children() {
            errors.add("children", "this application does not include children");
            return;
        }
        if self.children.is_empty() {
            errors.add("children", "at least one child is required");
        }
        for (i, child) in self.children.iter().enumerate() {
            let mut child_errors = ValidationErrors::new();
            child.validate_into(ctx, &mut child_errors);
            errors.nest(&format!("children[{i}]"), child_errors);
        }
    }
}

/// Postal address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Street line
    pub address: String,
    /// Apartment or unit
    #[serde(default)]
    pub apartment: Option<String>,
    /// City or town
    pub city: String,
    /// Province or state code
    #[serde(default)]
    pub province: Option<String>,
    /// Postal or ZIP code
    #[serde(default)]
    pub postal_code: Option<String>,
    /// ISO alpha-3 country code
    pub country: String,
}

impl Address {
    fn validate_into(&self, reference: &ReferenceData, errors: &mut ValidationErrors) {
        errors.check(self.address.trim().is_empty(), "address", "is required");
        errors.check(self.city.trim().is_empty(), "city", "is required");

        if !reference.is_country(&self.country) {
            errors.add("country", "unknown country");
            return;
        }

        if reference.requires_region(&self.country) {
            match self.province.as_deref() {
                None | Some("") => errors.add("province", "is required"),
                Some(code) if !reference.is_region(&self.country, code) => {
                    errors.add("province", "unknown province or state");
                }
                Some(_) => {}
            }
        }

        let postal = self.postal_code.as_deref().map(str::trim).unwrap_or_default();
        match self.country.as_str() {
            CANADA if postal.is_empty() => errors.add("postal_code", "is required"),
            CANADA if !POSTAL_CODE.is_match(&postal.to_ascii_uppercase()) => {
                errors.add("postal_code", "must be a valid Canadian postal code");
            }
            USA if postal.is_empty() => errors.add("postal_code", "is required"),
            USA if !ZIP_CODE.is_match(postal) => {
                errors.add("postal_code", "must be a valid ZIP code");
            }
            _ => {}
        }
    }
}

/// Contact information step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInformation {
    /// Primary phone
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Alternate phone
    #[serde(default)]
    pub alternate_phone_number: Option<String>,
    /// Mailing address
    pub mailing_address: Address,
    /// Home address; `None` means same as mailing
    #[serde(default)]
    pub home_address: Option<Address>,
}

impl ContactInformation {
    fn validate_into(&self, ctx: &ValidationContext<'_>, errors: &mut ValidationErrors) {
        for (field, phone) in [
            ("phone_number", &self.phone_number),
            ("alternate_phone_number", &self.alternate_phone_number),
        ] {
            if let Some(phone) = phone.as_deref().filter(|p| !p.trim().is_empty()) {
                errors.check(!PHONE.is_match(phone.trim()), field, "invalid phone number");
            }
        }

        let mut mailing = ValidationErrors::new();
        self.mailing_address.validate_into(ctx.reference, &mut mailing);
        errors.nest("mailing_address", mailing);

        if let Some(home) = &self.home_address {
            let mut home_errors = ValidationErrors::new();
            home.validate_into(ctx.reference, &mut home_errors);
            errors.nest("home_address", home_errors);
        }
    }
}

/// Preferred contact method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommunicationMethod {
    /// Electronic correspondence
    Email,
    /// Paper mail
    Mail,
}

/// Communication preference step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationPreference {
    /// Language code
    pub preferred_language: String,
    /// Contact method
    pub preferred_method: CommunicationMethod,
    /// E-mail, required for [`CommunicationMethod::Email`]
    #[serde(default)]
    pub email: Option<String>,
}

impl CommunicationPreference {
    fn validate_into(&self, ctx: &ValidationContext<'_>, errors: &mut ValidationErrors) {
        errors.check(
            !ctx.reference.is_language(&self.preferred_language),
            "preferred_language",
            "unknown language",
        );
        match self.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => {
                errors.check(!EMAIL.is_match(email), "email", "invalid e-mail address");
            }
            _ => errors.check(
                self.preferred_method == CommunicationMethod::Email,
                "email",
                "is required for e-mail communication",
            ),
        }
    }
}

/// Dental insurance step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DentalInsurance {
    /// Has access to private dental insurance
    pub has_dental_insurance: bool,
}

/// Federal and provincial/territorial benefits step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DentalBenefits {
    /// Federal programme code, if enrolled
    #[serde(default)]
    pub federal_programme: Option<String>,
    /// Province of the provincial programme
    #[serde(default)]
    pub province: Option<String>,
    /// Provincial/territorial programme code, if enrolled
    #[serde(default)]
    pub provincial_programme: Option<String>,
}

impl DentalBenefits {
    fn validate_into(&self, ctx: &ValidationContext<'_>, errors: &mut ValidationErrors) {
        if let Some(code) = &self.federal_programme {
            errors.check(
                !ctx.reference.is_federal_programme(code),
                "federal_programme",
                "unknown federal programme",
            );
        }
        match (&self.province, &self.provincial_programme) {
            (None, None) => {}
            (Some(_), None) => {
                errors.add("provincial_programme", "is required when a province is selected");
            }
            (None, Some(_)) => errors.add("province", "is required"),
            (Some(province), Some(code)) => {
                if !ctx.reference.is_region(CANADA, province) {
                    errors.add("province", "unknown province or territory");
                } else if !ctx.reference.is_provincial_programme(province, code) {
                    errors.add("provincial_programme", "unknown programme for province");
                }
            }
        }
    }
}

fn validate_name(errors: &mut ValidationErrors, field: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "is required");
    } else if value.chars().count() > MAX_NAME_LEN {
        errors.add(field, "must be at most 100 characters");
    }
}

fn validate_sin(errors: &mut ValidationErrors, field: &str, value: &str) {
    if !is_valid_sin(value) {
        errors.add(field, "must be a valid Social Insurance Number");
    }
}

/// Nine digits (spaces and dashes ignored) passing the Luhn check
#[must_use]
pub fn is_valid_sin(value: &str) -> bool {
    let digits: Vec<u32> = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .map(|c| c.to_digit(10))
        .collect::<Option<_>>()
        .unwrap_or_default();
    if digits.len() != 9 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Whole years between `born` and `on`
#[must_use]
pub fn age_on(born: NaiveDate, on: NaiveDate) -> u32 {
    on.years_since(born).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn ctx(application_type: ApplicationType) -> ValidationContext<'static> {
        ValidationContext {
            application_type,
            today: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            reference: ReferenceData::builtin(),
        }
    }

    #[test]
    fn sin_luhn() {
        assert!(is_valid_sin("046 454 286"));
        assert!(is_valid_sin("130-692-544"));
        assert!(!is_valid_sin("046454287"));
        assert!(!is_valid_sin("12345"));
        assert!(!is_valid_sin("04645428a"));
    }

    #[test]
    fn age_computation() {
        let born = NaiveDate::from_ymd_opt(2006, 6, 2).unwrap();
        assert_eq!(age_on(born, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()), 17);
        assert_eq!(age_on(born, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()), 18);
    }

    #[test]
    fn fixture_payloads_are_valid() {
        let ctx = ctx(ApplicationType::AdultChild);
        for data in fixtures::all_payloads(true) {
            assert!(data.validate(&ctx).is_ok(), "{:?}", data.step());
        }
    }

    #[test]
    fn terms_must_be_accepted() {
        let data = StepData::TermsAndConditions(TermsAndConditions {
            acknowledge_terms: true,
            acknowledge_privacy: false,
            share_data: false,
        });
        let errors = data.validate(&ctx(ApplicationType::Adult)).unwrap_err();
        assert!(errors.contains("acknowledge_privacy"));
        assert!(errors.contains("share_data"));
        assert!(!errors.contains("acknowledge_terms"));
    }

    #[test]
    fn date_of_birth_rules() {
        let future = StepData::DateOfBirth(DateOfBirth {
            date_of_birth: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
        });
        assert!(future.validate(&ctx(ApplicationType::Adult)).is_err());

        let minor = StepData::DateOfBirth(DateOfBirth {
            date_of_birth: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
        });
        let errors = minor.validate(&ctx(ApplicationType::Adult)).unwrap_err();
        assert!(errors.get("date_of_birth").unwrap()[0].contains("18"));
    }

    #[test]
    fn applicant_rejects_bad_sin_and_blank_name() {
        let mut applicant = fixtures::applicant(MaritalStatus::Single);
        applicant.first_name = "  ".into();
        applicant.social_insurance_number = "123456789".into();

        let errors = StepData::ApplicantInformation(applicant)
            .validate(&ctx(ApplicationType::Adult))
            .unwrap_err();
        assert!(errors.contains("first_name"));
        assert!(errors.contains("social_insurance_number"));
    }

    #[test]
    fn children_errors_are_indexed() {
        let mut adult_child = fixtures::child();
        adult_child.date_of_birth = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        let data = StepData::ChildrenInformation(ChildrenInformation {
            children: vec![fixtures::child(), adult_child],
        });

        let errors = data.validate(&ctx(ApplicationType::Child)).unwrap_err();
        assert!(errors.contains("children[1].date_of_birth"));
        assert!(!errors.contains("children[0].date_of_birth"));
    }

    #[test]
    fn children_rejected_for_adult_flow() {
        let data = StepData::ChildrenInformation(ChildrenInformation {
            children: vec![fixtures::child()],
        });
        let errors = data.validate(&ctx(ApplicationType::Adult)).unwrap_err();
        assert!(errors.contains("children"));
    }

    #[test]
    fn empty_children_rejected() {
        let data = StepData::ChildrenInformation(ChildrenInformation { children: vec![] });
        assert!(data.validate(&ctx(ApplicationType::Child)).is_err());
    }

    #[test]
    fn address_rules_for_canada() {
        let mut contact = fixtures::contact();
        contact.mailing_address.postal_code = Some("12345".into());
        contact.mailing_address.province = Some("ZZ".into());
        contact.phone_number = Some("call me".into());

        let errors = StepData::ContactInformation(contact)
            .validate(&ctx(ApplicationType::Adult))
            .unwrap_err();
        assert!(errors.contains("mailing_address.postal_code"));
        assert!(errors.contains("mailing_address.province"));
        assert!(errors.contains("phone_number"));
    }

    #[test]
    fn address_abroad_needs_no_region() {
        let mut contact = fixtures::contact();
        contact.mailing_address = Address {
            address: "10 Downing St".into(),
            apartment: None,
            city: "London".into(),
            province: None,
            postal_code: Some("SW1A 2AA".into()),
            country: "GBR".into(),
        };
        assert!(StepData::ContactInformation(contact)
            .validate(&ctx(ApplicationType::Adult))
            .is_ok());
    }

    #[test]
    fn email_required_for_email_method() {
        let pref = CommunicationPreference {
            preferred_language: "fr".into(),
            preferred_method: CommunicationMethod::Email,
            email: None,
        };
        let errors = StepData::CommunicationPreference(pref)
            .validate(&ctx(ApplicationType::Adult))
            .unwrap_err();
        assert!(errors.contains("email"));

        let pref = CommunicationPreference {
            preferred_language: "de".into(),
            preferred_method: CommunicationMethod::Mail,
            email: Some("not-an-email".into()),
        };
        let errors = StepData::CommunicationPreference(pref)
            .validate(&ctx(ApplicationType::Adult))
            .unwrap_err();
        assert!(errors.contains("preferred_language"));
        assert!(errors.contains("email"));
    }

    #[test]
    fn benefits_programmes_checked() {
        let benefits = DentalBenefits {
            federal_programme: Some("NOPE".into()),
            province: Some("ON".into()),
            provincial_programme: Some("QC-RAMQ".into()),
        };
        let errors = StepData::FederalProvincialTerritorialBenefits(benefits)
            .validate(&ctx(ApplicationType::Adult))
            .unwrap_err();
        assert!(errors.contains("federal_programme"));
        assert!(errors.contains("provincial_programme"));
    }

    #[test]
    fn from_json_uses_step_tag() {
        let data = StepData::from_json(
            Step::TaxFiling,
            serde_json::json!({ "filed_previous_year": true }),
        )
        .unwrap();
        assert_eq!(
            data,
            StepData::TaxFiling(TaxFiling {
                filed_previous_year: true
            })
        );
        assert_eq!(data.step(), Step::TaxFiling);

        // Non-data steps have no payload variant
        assert!(StepData::from_json(Step::ReviewInformation, serde_json::json!({})).is_err());
    }
}
