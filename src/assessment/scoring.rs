use std::collections::BTreeSet;

use crate::config::ScoringWeights;

use super::types::{MatchKind, MatchRecord};

/// Distinct allergens a cart is exposed to, by confidence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exposure {
    pub confirmed: BTreeSet<String>,
    /// Allergens only ever matched as possible. Never overlaps `confirmed`.
    pub possible: BTreeSet<String>,
}

/// Collapse records to distinct allergens. An allergen confirmed anywhere
/// in the cart is dropped from the possible set.
pub fn exposure(records: &[MatchRecord]) -> Exposure {
    let confirmed: BTreeSet<String> = records
        .iter()
        .filter(|r| r.kind == MatchKind::Confirmed)
        .map(|r| r.family.allergen().to_string())
        .collect();

    let possible = records
        .iter()
        .filter(|r| r.kind == MatchKind::Possible)
        .map(|r| r.family.allergen())
        .filter(|allergen| !confirmed.contains(*allergen))
        .map(str::to_string)
        .collect();

    Exposure {
        confirmed,
        possible,
    }
}

/// Risk rating for a whole cart.
///
/// Each distinct confirmed allergen adds `confirmed_weight`, each distinct
/// possible-only allergen adds `possible_weight`; repeats add nothing. The
/// sum is clamped to `max_rating`. A cart with no lines rates 0.
pub fn score(records: &[MatchRecord], cart_line_count: usize, weights: &ScoringWeights) -> u8 {
    if cart_line_count == 0 {
        return 0;
    }
    let exposure = exposure(records);
    let raw = (exposure.confirmed.len() as u64) * u64::from(weights.confirmed_weight)
        + (exposure.possible.len() as u64) * u64::from(weights.possible_weight);
    raw.min(u64::from(weights.max_rating)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::types::MatchedFamily;

    fn record(family: &str, kind: MatchKind) -> MatchRecord {
        MatchRecord {
            ingredient: family.into(),
            matched_text: family.into(),
            family: MatchedFamily::known(family),
            kind,
        }
    }

    fn unclassified(allergen: &str, overlap: &str) -> MatchRecord {
        MatchRecord {
            ingredient: overlap.into(),
            matched_text: overlap.into(),
            family: MatchedFamily::Unclassified {
                allergen: allergen.into(),
                overlap: overlap.into(),
            },
            kind: MatchKind::Possible,
        }
    }

    #[test]
    fn confirmed_and_possible_weights() {
        let weights = ScoringWeights::default();
        let records = vec![
            record("peanut", MatchKind::Confirmed),
            record("dairy", MatchKind::Possible),
        ];
        assert_eq!(score(&records, 1, &weights), 4);
    }

    #[test]
    fn repeats_do_not_add() {
        let weights = ScoringWeights::default();
        let records = vec![
            record("peanut", MatchKind::Confirmed),
            record("peanut", MatchKind::Confirmed),
            record("peanut", MatchKind::Confirmed),
            record("dairy", MatchKind::Possible),
            unclassified("dairy", "milkshake"),
        ];
        assert_eq!(score(&records, 3, &weights), 4);
    }

    #[test]
    fn confirmed_elsewhere_suppresses_possible() {
        let records = vec![
            record("dairy", MatchKind::Possible),
            record("dairy", MatchKind::Confirmed),
            unclassified("dairy", "milky"),
        ];
        let exp = exposure(&records);
        assert_eq!(exp.confirmed.len(), 1);
        assert!(exp.possible.is_empty());
        assert_eq!(score(&records, 2, &ScoringWeights::default()), 3);
    }

    #[test]
    fn clamped_to_max_rating() {
        let records: Vec<MatchRecord> = ["dairy", "egg", "peanut", "soy"]
            .iter()
            .map(|f| record(f, MatchKind::Confirmed))
            .collect();
        assert_eq!(score(&records, 4, &ScoringWeights::default()), 10);
    }

    #[test]
    fn empty_cart_rates_zero() {
        let records = vec![record("peanut", MatchKind::Confirmed)];
        assert_eq!(score(&records, 0, &ScoringWeights::default()), 0);
        assert_eq!(score(&[], 5, &ScoringWeights::default()), 0);
    }

    #[test]
    fn custom_weights() {
        let weights = ScoringWeights {
            confirmed_weight: 5,
            possible_weight: 2,
            max_rating: 10,
        };
        let records = vec![
            record("peanut", MatchKind::Confirmed),
            record("dairy", MatchKind::Possible),
        ];
        assert_eq!(score(&records, 1, &weights), 7);
    }

    #[test]
    fn upgrading_possible_to_confirmed_never_lowers() {
        let weights = ScoringWeights::default();
        let before = vec![record("dairy", MatchKind::Possible)];
        let after = vec![
            record("dairy", MatchKind::Possible),
            record("dairy", MatchKind::Confirmed),
        ];
        assert!(score(&after, 2, &weights) >= score(&before, 1, &weights));
    }
}
