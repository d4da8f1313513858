use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::models::{AllergyProfile, CartSnapshot};

use super::detection::match_line;
use super::messages::RecommendationTable;
use super::reference::AllergenKnowledgeBase;
use super::scoring::{exposure, score};
use super::types::{
    AllergyAssessment, AssessmentEngine, AssessmentError, AssessmentOutcome, DataCoverage,
    MatchKind, MatchRecord,
};

/// Build the result record from match evidence and a rating.
///
/// Allergen lists are sorted. A possible allergen is shown under its family
/// name when any known-family record names it, otherwise as
/// "unclassified (<allergy>)".
pub fn assemble(
    records: &[MatchRecord],
    rating: u8,
    coverage: DataCoverage,
    table: &RecommendationTable,
) -> AllergyAssessment {
    let exposure = exposure(records);

    let possible_allergens: BTreeSet<String> = exposure
        .possible
        .iter()
        .map(|allergen| {
            let mut candidates = records.iter().filter(|r| {
                r.kind == MatchKind::Possible && r.family.allergen() == allergen.as_str()
            });
            let known = candidates.clone().find(|r| !r.family.is_unclassified());
            known
                .or_else(|| candidates.next())
                .map(|r| r.family.display_name())
                .unwrap_or_else(|| allergen.clone())
        })
        .collect();

    AllergyAssessment {
        confirmed_allergens: exposure.confirmed.into_iter().collect(),
        possible_allergens: possible_allergens.into_iter().collect(),
        risk_rating: rating,
        recommendation: table.select(rating, coverage).to_string(),
    }
}

/// Default implementation of the assessment engine.
/// Matches every cart line, scores the cart, and assembles the result.
pub struct DefaultAssessmentEngine {
    reference: Arc<AllergenKnowledgeBase>,
    config: EngineConfig,
    recommendations: RecommendationTable,
}

impl DefaultAssessmentEngine {
    /// Fails when the configuration does not validate, so a running engine
    /// always has a knowledge base and a complete tier table.
    pub fn new(
        reference: Arc<AllergenKnowledgeBase>,
        config: EngineConfig,
    ) -> Result<Self, AssessmentError> {
        config.validate()?;
        let recommendations = RecommendationTable::from_config(&config);
        Ok(Self {
            reference,
            config,
            recommendations,
        })
    }

    /// Engine over the knowledge base compiled into the crate.
    pub fn with_bundled_reference(config: EngineConfig) -> Result<Self, AssessmentError> {
        Self::new(AllergenKnowledgeBase::bundled()?, config)
    }

    pub fn reference(&self) -> &AllergenKnowledgeBase {
        &self.reference
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Re-score an outcome with extra match evidence appended.
    ///
    /// Extra records only ever add allergens, so the rating cannot drop.
    pub fn merge_records(
        &self,
        mut outcome: AssessmentOutcome,
        extra: Vec<MatchRecord>,
    ) -> AssessmentOutcome {
        if extra.is_empty() {
            return outcome;
        }
        outcome.matches.extend(extra);
        let rating = score(&outcome.matches, outcome.lines_assessed, &self.config.scoring);
        let rating = rating.max(outcome.assessment.risk_rating);
        outcome.assessment =
            assemble(&outcome.matches, rating, outcome.coverage, &self.recommendations);
        outcome
    }
}

impl AssessmentEngine for DefaultAssessmentEngine {
    fn assess_cart_detailed(
        &self,
        profile: &AllergyProfile,
        cart: &CartSnapshot,
    ) -> AssessmentOutcome {
        let start = Instant::now();
        let profile = profile.canonicalized(&self.reference);

        let lines_without_ingredients = cart
            .lines
            .iter()
            .filter(|line| !line.has_ingredient_data())
            .count();

        let (matches, coverage) = if profile.is_empty() || cart.is_empty() {
            (Vec::new(), DataCoverage::NoData)
        } else {
            let matches: Vec<MatchRecord> = cart
                .lines
                .iter()
                .flat_map(|line| {
                    match_line(&profile, line, &self.reference, self.config.min_overlap)
                })
                .collect();
            let coverage = if lines_without_ingredients > 0 {
                DataCoverage::Partial
            } else {
                DataCoverage::Complete
            };
            (matches, coverage)
        };

        let rating = score(&matches, cart.len(), &self.config.scoring);
        let assessment = assemble(&matches, rating, coverage, &self.recommendations);
        let processing_time_us = start.elapsed().as_micros() as u64;

        tracing::info!(
            lines = cart.len(),
            lines_without_ingredients,
            allergies = profile.len(),
            confirmed = assessment.confirmed_allergens.len(),
            possible = assessment.possible_allergens.len(),
            rating,
            processing_us = processing_time_us,
            "Cart allergen assessment complete"
        );

        AssessmentOutcome {
            assessment,
            matches,
            coverage,
            lines_assessed: cart.len(),
            lines_without_ingredients,
            advisory_suggestions: 0,
            processing_time_us,
        }
    }
}
