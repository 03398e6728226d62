//! Read-only reference catalogs used for validation and display
//!
//! Countries, provinces/territories (and US states), languages, and the
//! social-programme codes accepted on the dental-benefits step.

use indexmap::IndexMap;
use once_cell::sync::Lazy;

/// Canada
pub const CANADA: &str = "CAN";
/// United States
pub const USA: &str = "USA";

/// Code → display name, in display order
pub type Catalog = IndexMap<&'static str, &'static str>;

/// Reference data catalogs
#[derive(Debug, Clone)]
pub struct ReferenceData {
    countries: Catalog,
    regions: IndexMap<&'static str, Catalog>,
    languages: Catalog,
    federal_programmes: Catalog,
    provincial_programmes: IndexMap<&'static str, Catalog>,
}

static BUILTIN: Lazy<ReferenceData> = Lazy::new(ReferenceData::build);

fn catalog(entries: &[(&'static str, &'static str)]) -> Catalog {
    entries.iter().copied().collect()
}

impl ReferenceData {
    /// Built-in catalogs
    #[must_use]
    pub fn builtin() -> &'static ReferenceData {
        &BUILTIN
    }

    fn build() -> Self {
        let countries = catalog(&[
            (CANADA, "Canada"),
            (USA, "United States"),
            ("MEX", "Mexico"),
            ("GBR", "United Kingdom"),
            ("FRA", "France"),
            ("DEU", "Germany"),
            ("IND", "India"),
            ("CHN", "China"),
            ("PHL", "Philippines"),
            ("AUS", "Australia"),
        ]);

        let provinces = catalog(&[
            ("AB", "Alberta"),
            ("BC", "British Columbia"),
            ("MB", "Manitoba"),
            ("NB", "New Brunswick"),
            ("NL", "Newfoundland and Labrador"),
            ("NS", "Nova Scotia"),
            ("NT", "Northwest Territories"),
            ("NU", "Nunavut"),
            ("ON", "Ontario"),
            ("PE", "Prince Edward Island"),
            ("QC", "Quebec"),
            ("SK", "Saskatchewan"),
            ("YT", "Yukon"),
        ]);

        let states = catalog(&[
            ("AK", "Alaska"),
            ("AL", "Alabama"),
            ("AR", "Arkansas"),
            ("AZ", "Arizona"),
            ("CA", "California"),
            ("CO", "Colorado"),
            ("CT", "Connecticut"),
            ("DC", "District of Columbia"),
            ("DE", "Delaware"),
            ("FL", "Florida"),
            ("GA", "Georgia"),
            ("HI", "Hawaii"),
            ("IA", "Iowa"),
            ("ID", "Idaho"),
            ("IL", "Illinois"),
            ("IN", "Indiana"),
            ("KS", "Kansas"),
            ("KY", "Kentucky"),
            ("LA", "Louisiana"),
            ("MA", "Massachusetts"),
            ("MD", "Maryland"),
            ("ME", "Maine"),
            ("MI", "Michigan"),
            ("MN", "Minnesota"),
            ("MO", "Missouri"),
            ("MS", "Mississippi"),
            ("MT", "Montana"),
            ("NC", "North Carolina"),
            ("ND", "North Dakota"),
            ("NE", "Nebraska"),
            ("NH", "New Hampshire"),
            ("NJ", "New Jersey"),
            ("NM", "New Mexico"),
            ("NV", "Nevada"),
            ("NY", "New York"),
            ("OH", "Ohio"),
            ("OK", "Oklahoma"),
            ("OR", "Oregon"),
            ("PA", "Pennsylvania"),
            ("RI", "Rhode Island"),
            ("SC", "South Carolina"),
            ("SD", "South Dakota"),
            ("TN", "Tennessee"),
            ("TX", "Texas"),
            ("UT", "Utah"),
            ("VA", "Virginia"),
            ("VT", "Vermont"),
            ("WA", "Washington"),
            ("WI", "Wisconsin"),
            ("WV", "West Virginia"),
            ("WY", "Wyoming"),
        ]);

        let mut regions = IndexMap::new();
        regions.insert(CANADA, provinces);
        regions.insert(USA, states);

        let languages = catalog(&[("en", "English"), ("fr", "Français")]);

        let federal_programmes = catalog(&[
            ("NIHB", "Non-Insured Health Benefits Program"),
            ("VAC", "Veterans Affairs Canada dental benefits"),
            ("IFHP", "Interim Federal Health Program"),
            ("CFHS", "Canadian Forces Health Services"),
        ]);

        let mut provincial_programmes = IndexMap::new();
        provincial_programmes.insert(
            "ON",
            catalog(&[
                ("ON-HSO", "Healthy Smiles Ontario"),
                ("ON-ODSP", "Ontario Disability Support Program dental"),
                ("ON-OSDCP", "Ontario Seniors Dental Care Program"),
            ]),
        );
        provincial_programmes.insert(
            "QC",
            catalog(&[("QC-RAMQ", "Régie de l'assurance maladie du Québec dental services")]),
        );
        provincial_programmes.insert(
            "BC",
            catalog(&[("BC-HKP", "Healthy Kids Program")]),
        );
        provincial_programmes.insert(
            "AB",
            catalog(&[
                ("AB-ACHB", "Alberta Child Health Benefit"),
                ("AB-DAS", "Dental Assistance for Seniors"),
            ]),
        );
        provincial_programmes.insert(
            "NS",
            catalog(&[("NS-CDP", "Children's Oral Health Program")]),
        );

        Self {
            countries,
            regions,
            languages,
            federal_programmes,
            provincial_programmes,
        }
    }

    /// Countries catalog
    #[inline]
    #[must_use]
    pub fn countries(&self) -> &Catalog {
        &self.countries
    }

    /// Provinces/states for a country, if the country has subdivisions on file
    #[inline]
    #[must_use]
    pub fn regions(&self, country: &str) -> Option<&Catalog> {
        self.regions.get(country)
    }

    /// Languages catalog
    #[inline]
    #[must_use]
    pub fn languages(&self) -> &Catalog {
        &self.languages
    }

    /// Federal social programmes
    #[inline]
    #[must_use]
    pub fn federal_programmes(&self) -> &Catalog {
        &self.federal_programmes
    }

    /// Provincial/territorial social programmes for a province
    #[must_use]
    pub fn provincial_programmes(&self, province: &str) -> Option<&Catalog> {
        self.provincial_programmes.get(province)
    }

    /// Known country code
    #[inline]
    #[must_use]
    pub fn is_country(&self, code: &str) -> bool {
        self.countries.contains_key(code)
    }

    /// Whether the country requires a province/state
    #[inline]
    #[must_use]
    pub fn requires_region(&self, country: &str) -> bool {
        self.regions.contains_key(country)
    }

    /// Known province/state of a country
    #[must_use]
    pub fn is_region(&self, country: &str, code: &str) -> bool {
        self.regions
            .get(country)
            .is_some_and(|regions| regions.contains_key(code))
    }

    /// Known language code
    #[inline]
    #[must_use]
    pub fn is_language(&self, code: &str) -> bool {
        self.languages.contains_key(code)
    }

    /// Known federal programme code
    #[inline]
    #[must_use]
    pub fn is_federal_programme(&self, code: &str) -> bool {
        self.federal_programmes.contains_key(code)
    }

    /// Known provincial programme code for the province
    #[must_use]
    pub fn is_provincial_programme(&self, province: &str, code: &str) -> bool {
        self.provincial_programmes
            .get(province)
            .is_some_and(|programmes| programmes.contains_key(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_countries_and_regions() {
        let data = ReferenceData::builtin();
        assert!(data.is_country(CANADA));
        assert!(!data.is_country("XXX"));
        assert!(data.requires_region(CANADA));
        assert!(!data.requires_region("FRA"));
        assert!(data.is_region(CANADA, "ON"));
        assert!(!data.is_region(CANADA, "CA"));
        assert!(data.is_region(USA, "CA"));
        assert_eq!(data.regions(CANADA).unwrap().len(), 13);
    }

    #[test]
    fn reference_languages_ordered() {
        let codes: Vec<_> = ReferenceData::builtin().languages().keys().copied().collect();
        assert_eq!(codes, ["en", "fr"]);
    }

    #[test]
    fn reference_programmes() {
        let data = ReferenceData::builtin();
        assert!(data.is_federal_programme("NIHB"));
        assert!(!data.is_federal_programme("ON-HSO"));
        assert!(data.is_provincial_programme("ON", "ON-HSO"));
        assert!(!data.is_provincial_programme("QC", "ON-HSO"));
        assert!(data.provincial_programmes("YT").is_none());
    }
}
