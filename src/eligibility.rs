use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Income ceiling for a BTO application, SGD per month.
pub const INCOME_CEILING_SGD: u32 = 14_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Citizenship {
    Citizen,
    PermanentResident,
    Foreigner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FamilyNucleus {
    /// Applying with spouse, parents or children.
    PublicScheme,
    FianceScheme,
    /// Unmarried siblings applying together.
    OrphanScheme,
    /// Single applicant, age 35 and above.
    SingleScheme,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub citizenship: Citizenship,
    pub age: u32,
    pub family_nucleus: FamilyNucleus,
    pub monthly_household_income: u32,
    pub owns_other_property: bool,
    pub disposed_private_property: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityReport {
    pub eligible: bool,
    pub reasons: Vec<String>,
}

/// Flat decision table over the application. Rules never short-circuit:
/// every failed rule contributes its own reason.
pub fn check(applicant: &Applicant) -> EligibilityReport {
    let mut reasons = Vec::new();

    if applicant.citizenship == Citizenship::Foreigner {
        reasons.push(
            "At least one applicant must be a Singapore Citizen or Permanent Resident."
                .to_string(),
        );
    }
    if applicant.age < 21 {
        reasons.push("Applicants must be at least 21 years old.".to_string());
    }
    if applicant.family_nucleus == FamilyNucleus::SingleScheme && applicant.age < 35 {
        reasons.push(
            "Applicants under the Single Bachelor Scheme must be at least 35 years old."
                .to_string(),
        );
    }
    if applicant.family_nucleus == FamilyNucleus::FianceScheme
        && applicant.citizenship == Citizenship::Foreigner
        && applicant.age < 21
    {
        reasons.push(
            "You must be at least 21 years old and engaged to apply under the Fiancé/Fiancée Scheme."
                .to_string(),
        );
    }
    if applicant.family_nucleus == FamilyNucleus::PublicScheme
        && applicant.citizenship == Citizenship::Foreigner
    {
        reasons.push(
            "You cannot apply under the Public Scheme with a foreigner as a spouse unless you are married."
                .to_string(),
        );
    }
    if applicant.monthly_household_income > INCOME_CEILING_SGD {
        reasons.push(format!(
            "Average gross monthly household income must not exceed ${INCOME_CEILING_SGD}."
        ));
    }
    if applicant.owns_other_property {
        reasons.push("Applicants must not own any other property locally or overseas.".to_string());
    }
    if applicant.disposed_private_property {
        reasons.push(
            "Applicants must not have disposed of any private property within the last 30 months."
                .to_string(),
        );
    }

    EligibilityReport {
        eligible: reasons.is_empty(),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eligible_applicant() -> Applicant {
        Applicant {
            citizenship: Citizenship::Citizen,
            age: 30,
            family_nucleus: FamilyNucleus::PublicScheme,
            monthly_household_income: 8_000,
            owns_other_property: false,
            disposed_private_property: false,
        }
    }

    #[test]
    fn baseline_applicant_is_eligible() {
        let report = check(&eligible_applicant());
        assert!(report.eligible);
        assert!(report.reasons.is_empty());
    }

    #[test]
    fn foreigner_is_ineligible() {
        let mut applicant = eligible_applicant();
        applicant.citizenship = Citizenship::Foreigner;
        let report = check(&applicant);
        assert!(!report.eligible);
        // Both the citizenship rule and the public-scheme rule fire.
        assert_eq!(report.reasons.len(), 2);
    }

    #[test]
    fn underage_single_scheme_collects_both_reasons() {
        let mut applicant = eligible_applicant();
        applicant.age = 20;
        applicant.family_nucleus = FamilyNucleus::SingleScheme;
        let report = check(&applicant);
        assert!(!report.eligible);
        assert_eq!(report.reasons.len(), 2);
    }

    #[test]
    fn single_scheme_under_35_is_ineligible() {
        let mut applicant = eligible_applicant();
        applicant.age = 34;
        applicant.family_nucleus = FamilyNucleus::SingleScheme;
        let report = check(&applicant);
        assert!(!report.eligible);
        assert_eq!(report.reasons.len(), 1);
    }

    #[test]
    fn income_above_ceiling_is_ineligible() {
        let mut applicant = eligible_applicant();
        applicant.monthly_household_income = 14_001;
        assert!(!check(&applicant).eligible);

        applicant.monthly_household_income = INCOME_CEILING_SGD;
        assert!(check(&applicant).eligible);
    }

    #[test]
    fn property_rules_are_independent() {
        let mut applicant = eligible_applicant();
        applicant.owns_other_property = true;
        applicant.disposed_private_property = true;
        let report = check(&applicant);
        assert_eq!(report.reasons.len(), 2);
    }
}
