use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assessment::types::AssessmentError;

/// Application-level constants
pub const APP_NAME: &str = "allergen-guard";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine configuration file name inside the config directory.
pub const CONFIG_FILE: &str = "engine.json";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "allergen_guard=info,warn"
}

/// Per-user configuration directory, e.g. ~/.config/allergen-guard/ on Linux.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Default location of the engine configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Points per distinct allergen and the rating ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub confirmed_weight: u32,
    pub possible_weight: u32,
    pub max_rating: u8,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            confirmed_weight: 3,
            possible_weight: 1,
            max_rating: 10,
        }
    }
}

/// Inclusive rating band mapped to a recommendation text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationTier {
    pub min: u8,
    pub max: u8,
    pub text: String,
}

impl RecommendationTier {
    pub fn new(min: u8, max: u8, text: impl Into<String>) -> Self {
        Self {
            min,
            max,
            text: text.into(),
        }
    }

    pub fn contains(&self, rating: u8) -> bool {
        (self.min..=self.max).contains(&rating)
    }
}

/// Optional language-model second opinion. Off unless enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:11434".into(),
            model: "llama3.1:8b".into(),
            timeout_secs: 20,
            max_attempts: 2,
            retry_backoff_ms: 250,
        }
    }
}

/// Everything tunable about an assessment, supplied at engine construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringWeights,
    /// Minimum characters an unrecognized word must share with an allergy.
    pub min_overlap: usize,
    pub recommendations: Vec<RecommendationTier>,
    /// Recommendation when the profile or the cart is empty.
    pub no_data_text: String,
    /// Recommendation when nothing matched but some lines had no ingredients.
    pub insufficient_data_text: String,
    pub advisory: AdvisoryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringWeights::default(),
            min_overlap: 4,
            recommendations: default_recommendations(),
            no_data_text: "No allergy or cart data to assess".into(),
            insufficient_data_text: "No known conflicts detected, but some items have no \
                                     ingredient information. Review them manually"
                .into(),
            advisory: AdvisoryConfig::default(),
        }
    }
}

fn default_recommendations() -> Vec<RecommendationTier> {
    vec![
        RecommendationTier::new(0, 0, "No known conflicts detected"),
        RecommendationTier::new(1, 3, "Minor risk — review possible allergens before consuming"),
        RecommendationTier::new(
            4,
            7,
            "Moderate risk — confirmed allergens present, review carefully",
        ),
        RecommendationTier::new(8, 10, "High risk — strongly recommend avoiding this order"),
    ]
}

// ═══════════════════════════════════════════════════════════
// Loading & validation
// ═══════════════════════════════════════════════════════════

impl EngineConfig {
    /// Parse and validate JSON text. Missing fields take their defaults.
    pub fn from_json(json: &str, source: &str) -> Result<Self, AssessmentError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AssessmentError::ConfigLoad(source.into(), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, AssessmentError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AssessmentError::ConfigLoad(path.display().to_string(), e.to_string()))?;
        let config = Self::from_json(&json, &path.display().to_string())?;
        tracing::info!(path = %path.display(), "Engine configuration loaded");
        Ok(config)
    }

    /// An explicit path must load. Otherwise the per-user file is used when
    /// present, and the built-in defaults when not.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, AssessmentError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => {
                tracing::debug!("No engine configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject configurations that would break the rating contract.
    pub fn validate(&self) -> Result<(), AssessmentError> {
        let scoring = &self.scoring;
        if scoring.max_rating == 0 || scoring.max_rating > 10 {
            return Err(invalid(format!(
                "max_rating must be between 1 and 10, got {}",
                scoring.max_rating
            )));
        }
        if scoring.possible_weight == 0 {
            return Err(invalid("possible_weight must be at least 1".into()));
        }
        if scoring.confirmed_weight < scoring.possible_weight {
            return Err(invalid(format!(
                "confirmed_weight ({}) must not be below possible_weight ({})",
                scoring.confirmed_weight, scoring.possible_weight
            )));
        }
        if self.min_overlap < 3 {
            return Err(invalid(format!(
                "min_overlap must be at least 3, got {}",
                self.min_overlap
            )));
        }
        if self.no_data_text.trim().is_empty() || self.insufficient_data_text.trim().is_empty() {
            return Err(invalid("recommendation texts must not be empty".into()));
        }
        self.validate_tiers()?;

        let advisory = &self.advisory;
        if advisory.enabled {
            if advisory.base_url.trim().is_empty() || advisory.model.trim().is_empty() {
                return Err(invalid("advisory needs a base_url and a model".into()));
            }
            if advisory.timeout_secs == 0 || advisory.max_attempts == 0 {
                return Err(invalid(
                    "advisory timeout_secs and max_attempts must be positive".into(),
                ));
            }
        }
        Ok(())
    }

    /// Tiers must cover 0..=max_rating exactly once each.
    fn validate_tiers(&self) -> Result<(), AssessmentError> {
        let mut tiers: Vec<&RecommendationTier> = self.recommendations.iter().collect();
        tiers.sort_by_key(|t| t.min);

        let mut next: u16 = 0;
        for tier in tiers {
            if tier.min > tier.max {
                return Err(invalid(format!("tier {}-{} is inverted", tier.min, tier.max)));
            }
            if tier.text.trim().is_empty() {
                return Err(invalid(format!("tier {}-{} has no text", tier.min, tier.max)));
            }
            match u16::from(tier.min).cmp(&next) {
                std::cmp::Ordering::Greater => {
                    return Err(invalid(format!("no tier covers rating {next}")));
                }
                std::cmp::Ordering::Less => {
                    return Err(invalid(format!("tiers overlap at rating {}", tier.min)));
                }
                std::cmp::Ordering::Equal => {}
            }
            next = u16::from(tier.max) + 1;
        }

        if next != u16::from(self.scoring.max_rating) + 1 {
            return Err(invalid(format!(
                "tiers must end exactly at max_rating {}",
                self.scoring.max_rating
            )));
        }
        Ok(())
    }
}

fn invalid(reason: String) -> AssessmentError {
    AssessmentError::InvalidConfig(reason)
}
