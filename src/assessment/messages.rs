use crate::config::{EngineConfig, RecommendationTier};

use super::types::DataCoverage;

/// Recommendation texts, selected by rating and data coverage.
#[derive(Debug, Clone)]
pub struct RecommendationTable {
    tiers: Vec<RecommendationTier>,
    no_data: String,
    insufficient_data: String,
}

impl RecommendationTable {
    /// Build from a validated configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut tiers = config.recommendations.clone();
        tiers.sort_by_key(|t| t.min);
        Self {
            tiers,
            no_data: config.no_data_text.clone(),
            insufficient_data: config.insufficient_data_text.clone(),
        }
    }

    /// Text for a rating. "Nothing to assess" and "nothing found, but some
    /// lines could not be checked" each have their own text; any positive
    /// rating uses its tier.
    pub fn select(&self, rating: u8, coverage: DataCoverage) -> &str {
        match coverage {
            DataCoverage::NoData => &self.no_data,
            DataCoverage::Partial if rating == 0 => &self.insufficient_data,
            _ => self.tier_text(rating),
        }
    }

    fn tier_text(&self, rating: u8) -> &str {
        self.tiers
            .iter()
            .find(|t| t.contains(rating))
            .or_else(|| self.tiers.last())
            .map(|t| t.text.as_str())
            .unwrap_or(&self.no_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RecommendationTable {
        RecommendationTable::from_config(&EngineConfig::default())
    }

    #[test]
    fn tier_boundaries() {
        let table = table();
        assert_eq!(table.select(0, DataCoverage::Complete), "No known conflicts detected");
        for rating in 1..=3 {
            assert!(table.select(rating, DataCoverage::Complete).starts_with("Minor risk"));
        }
        for rating in 4..=7 {
            assert!(table.select(rating, DataCoverage::Complete).starts_with("Moderate risk"));
        }
        for rating in 8..=10 {
            assert!(table.select(rating, DataCoverage::Complete).starts_with("High risk"));
        }
    }

    #[test]
    fn no_data_has_its_own_text() {
        let table = table();
        assert_eq!(table.select(0, DataCoverage::NoData), "No allergy or cart data to assess");
    }

    #[test]
    fn partial_coverage_never_reads_as_no_risk() {
        let table = table();
        let text = table.select(0, DataCoverage::Partial);
        assert_ne!(text, "No known conflicts detected");
        assert!(text.contains("no ingredient information"));
    }

    #[test]
    fn partial_coverage_with_matches_uses_tier() {
        let table = table();
        assert!(table.select(3, DataCoverage::Partial).starts_with("Minor risk"));
    }

    #[test]
    fn custom_tiers() {
        let mut config = EngineConfig::default();
        config.scoring.max_rating = 5;
        config.recommendations = vec![
            RecommendationTier::new(3, 5, "careful"),
            RecommendationTier::new(0, 2, "fine"),
        ];
        config.validate().unwrap();
        let table = RecommendationTable::from_config(&config);
        assert_eq!(table.select(2, DataCoverage::Complete), "fine");
        assert_eq!(table.select(5, DataCoverage::Complete), "careful");
    }
}
