use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AllergyProfile, CartSnapshot};

// ---------------------------------------------------------------------------
// MatchKind
// ---------------------------------------------------------------------------

/// Confidence of a single ingredient-to-allergen match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Derivative, synonym or ambiguous overlap: flagged for review.
    Possible,
    /// Direct textual or family match.
    Confirmed,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Possible => "possible",
            Self::Confirmed => "confirmed",
        }
    }
}

// ---------------------------------------------------------------------------
// MatchedFamily
// ---------------------------------------------------------------------------

/// The allergen family a match was attributed to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchedFamily {
    /// A family from the knowledge base, or a profile allergen the knowledge
    /// base has no entry for.
    Known { name: String },
    /// Synthetic family for an ingredient word the knowledge base does not
    /// recognize but which overlaps a profile allergen.
    Unclassified { allergen: String, overlap: String },
}

impl MatchedFamily {
    pub fn known(name: impl Into<String>) -> Self {
        Self::Known { name: name.into() }
    }

    /// The profile allergen this match is about. Used as the dedup key when
    /// scoring, so every flavor of match on one allergen counts once.
    pub fn allergen(&self) -> &str {
        match self {
            Self::Known { name } => name,
            Self::Unclassified { allergen, .. } => allergen,
        }
    }

    /// Name shown to the customer.
    pub fn display_name(&self) -> String {
        match self {
            Self::Known { name } => name.clone(),
            Self::Unclassified { allergen, .. } => format!("unclassified ({allergen})"),
        }
    }

    pub fn is_unclassified(&self) -> bool {
        matches!(self, Self::Unclassified { .. })
    }
}

// ---------------------------------------------------------------------------
// MatchRecord
// ---------------------------------------------------------------------------

/// One classified ingredient. Produced per ingredient by the matcher, consumed
/// by the scorer and the assembler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchRecord {
    /// Ingredient text exactly as supplied.
    pub ingredient: String,
    /// The normalized phrase or word that produced the match.
    pub matched_text: String,
    pub family: MatchedFamily,
    pub kind: MatchKind,
}

// ---------------------------------------------------------------------------
// AllergyAssessment & AssessmentOutcome
// ---------------------------------------------------------------------------

/// The engine's result record handed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AllergyAssessment {
    pub confirmed_allergens: Vec<String>,
    pub possible_allergens: Vec<String>,
    pub risk_rating: u8,
    pub recommendation: String,
}

/// How much of the cart carried usable data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataCoverage {
    /// Empty profile or empty cart: nothing to assess.
    NoData,
    /// At least one line had no ingredient information.
    Partial,
    Complete,
}

/// Assessment plus the evidence behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentOutcome {
    pub assessment: AllergyAssessment,
    pub matches: Vec<MatchRecord>,
    pub coverage: DataCoverage,
    pub lines_assessed: usize,
    pub lines_without_ingredients: usize,
    pub advisory_suggestions: usize,
    pub processing_time_us: u64,
}

// ---------------------------------------------------------------------------
// AssessmentError
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssessmentError {
    #[error("Reference data load failed ({0}): {1}")]
    ReferenceDataLoad(String, String),

    #[error("Reference data parse failed ({0}): {1}")]
    ReferenceDataParse(String, String),

    #[error("Reference data rejected: {0}")]
    ReferenceDataInvalid(String),

    #[error("Configuration load failed ({0}): {1}")]
    ConfigLoad(String, String),

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}

// ---------------------------------------------------------------------------
// AssessmentEngine trait
// ---------------------------------------------------------------------------

/// Allergen conflict and risk assessment over a whole cart.
pub trait AssessmentEngine {
    /// Assess a cart against an allergy profile, keeping the match evidence.
    fn assess_cart_detailed(&self, profile: &AllergyProfile, cart: &CartSnapshot)
        -> AssessmentOutcome;

    /// Assess a cart against an allergy profile.
    fn assess_cart(&self, profile: &AllergyProfile, cart: &CartSnapshot) -> AllergyAssessment {
        self.assess_cart_detailed(profile, cart).assessment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_kind_ordering() {
        assert!(MatchKind::Possible < MatchKind::Confirmed);
        assert_eq!(MatchKind::Confirmed.as_str(), "confirmed");
    }

    #[test]
    fn unclassified_family_keys_on_allergen() {
        let family = MatchedFamily::Unclassified {
            allergen: "soy".into(),
            overlap: "soybean".into(),
        };
        assert_eq!(family.allergen(), "soy");
        assert_eq!(family.display_name(), "unclassified (soy)");
        assert!(family.is_unclassified());
        assert!(!MatchedFamily::known("soy").is_unclassified());
    }

    #[test]
    fn assessment_serializes_camel_case() {
        let assessment = AllergyAssessment {
            confirmed_allergens: vec!["peanut".into()],
            possible_allergens: vec![],
            risk_rating: 3,
            recommendation: "text".into(),
        };
        let json = serde_json::to_value(&assessment).unwrap();
        assert_eq!(json["confirmedAllergens"][0], "peanut");
        assert!(json["possibleAllergens"].as_array().unwrap().is_empty());
        assert_eq!(json["riskRating"], 3);
        assert_eq!(json["recommendation"], "text");
    }
}
