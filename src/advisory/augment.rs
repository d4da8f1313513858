use std::collections::BTreeSet;
use std::time::Duration;

use crate::assessment::engine::DefaultAssessmentEngine;
use crate::assessment::normalize::normalize;
use crate::assessment::types::{AssessmentOutcome, MatchKind, MatchRecord, MatchedFamily};
use crate::config::AdvisoryConfig;
use crate::models::{AllergyProfile, CartSnapshot};

use super::ollama::OllamaClient;
use super::parser::parse_advisory_response;
use super::prompt::{build_advisory_prompt, ADVISORY_SYSTEM_PROMPT};
use super::types::LlmClient;
use super::AdvisoryError;

/// Ingredient label on records that came from the model rather than a cart line.
pub const ADVISORY_SOURCE: &str = "advisory model";

/// Adds model-suggested possible allergens to a deterministic outcome.
pub struct AdvisoryAugmenter {
    client: Box<dyn LlmClient>,
    config: AdvisoryConfig,
}

impl AdvisoryAugmenter {
    pub fn new(client: Box<dyn LlmClient>, config: AdvisoryConfig) -> Self {
        Self { client, config }
    }

    /// Ollama-backed augmenter, or `None` when advisory is disabled.
    pub fn from_config(config: &AdvisoryConfig) -> Result<Option<Self>, AdvisoryError> {
        if !config.enabled {
            return Ok(None);
        }
        let client = OllamaClient::from_config(config)?;
        tracing::info!(
            base_url = client.base_url(),
            model = %config.model,
            "Advisory model enabled"
        );
        Ok(Some(Self::new(Box::new(client), config.clone())))
    }

    /// Ask the model which profile allergies the cart may contain.
    ///
    /// Transport failures are retried up to `max_attempts` with a linear
    /// backoff; a response that does not parse is not retried.
    pub fn suggest(
        &self,
        profile: &AllergyProfile,
        cart: &CartSnapshot,
    ) -> Result<Vec<String>, AdvisoryError> {
        let prompt = build_advisory_prompt(profile, cart);
        let attempts = self.config.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self
                .client
                .generate(&self.config.model, &prompt, ADVISORY_SYSTEM_PROMPT)
            {
                Ok(response) => return parse_advisory_response(&response),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    tracing::warn!(attempt, error = %e, "Advisory request failed, retrying");
                    let backoff = self.config.retry_backoff_ms.saturating_mul(u64::from(attempt));
                    std::thread::sleep(Duration::from_millis(backoff));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Merge suggestions into `outcome` as possible matches.
    ///
    /// Suggestions are normalized and kept only when they name an allergy
    /// in the profile that the outcome does not already flag. Any failure is
    /// logged and the outcome returned unchanged.
    pub fn augment(
        &self,
        engine: &DefaultAssessmentEngine,
        profile: &AllergyProfile,
        cart: &CartSnapshot,
        outcome: AssessmentOutcome,
    ) -> AssessmentOutcome {
        let profile = profile.canonicalized(engine.reference());
        if profile.is_empty() || !cart.lines.iter().any(|l| l.has_ingredient_data()) {
            return outcome;
        }

        let suggestions = match self.suggest(&profile, cart) {
            Ok(suggestions) => suggestions,
            Err(e) => {
                tracing::warn!(error = %e, "Advisory model unavailable, keeping deterministic assessment");
                return outcome;
            }
        };

        let flagged: BTreeSet<&str> = outcome
            .matches
            .iter()
            .map(|r| r.family.allergen())
            .collect();

        let mut added: BTreeSet<String> = BTreeSet::new();
        for raw in &suggestions {
            let token = normalize(raw);
            let accepted: Vec<String> = if token.is_empty() {
                Vec::new()
            } else {
                engine
                    .reference()
                    .canonical_tokens(&token)
                    .into_iter()
                    .filter(|t| profile.contains(t) && !flagged.contains(t.as_str()))
                    .collect()
            };
            if accepted.is_empty() {
                tracing::debug!(suggestion = %raw, "Advisory suggestion ignored");
            }
            added.extend(accepted);
        }

        let extra: Vec<MatchRecord> = added
            .into_iter()
            .map(|allergen| MatchRecord {
                ingredient: ADVISORY_SOURCE.to_string(),
                matched_text: allergen.clone(),
                family: MatchedFamily::known(allergen),
                kind: MatchKind::Possible,
            })
            .collect();

        let count = extra.len();
        tracing::info!(
            suggested = suggestions.len(),
            accepted = count,
            "Advisory suggestions merged"
        );

        let mut merged = engine.merge_records(outcome, extra);
        merged.advisory_suggestions = count;
        merged
    }
}
