use std::collections::BTreeMap;

use crate::models::{AllergyProfile, CartLine};

use super::normalize::{normalize, words};
use super::reference::{AllergenKnowledgeBase, PhraseClass};
use super::types::{MatchKind, MatchRecord, MatchedFamily};

/// Shortest overlap ever accepted, whatever the configuration says.
const OVERLAP_FLOOR: usize = 3;

/// Outcome of looking one phrase up against the profile and knowledge base.
enum PhraseHit {
    Confirmed(String),
    Possible(String),
}

// ---------------------------------------------------------------------------
// Line matching
// ---------------------------------------------------------------------------

/// Classify every ingredient of a cart line against the profile.
///
/// Lines without ingredients yield nothing; the caller accounts for them
/// as insufficient data.
pub fn match_line(
    profile: &AllergyProfile,
    line: &CartLine,
    reference: &AllergenKnowledgeBase,
    min_overlap: usize,
) -> Vec<MatchRecord> {
    if profile.is_empty() {
        return Vec::new();
    }

    let records: Vec<MatchRecord> = line
        .ingredients
        .iter()
        .flat_map(|ingredient| match_ingredient(profile, ingredient, reference, min_overlap))
        .collect();

    for record in &records {
        tracing::debug!(
            product_id = %line.product_id,
            ingredient = %record.ingredient,
            matched = %record.matched_text,
            family = %record.family.display_name(),
            kind = record.kind.as_str(),
            "Allergen match"
        );
    }
    records
}

/// Classify a single ingredient string.
///
/// The normalized ingredient is segmented greedily into the longest phrases
/// the knowledge base or the profile knows, so "peanut butter" is read as
/// one phrase and "cocoa butter" never reaches the dairy lookup. Words left
/// over go through the overlap fallback. An ingredient never produces both
/// a confirmed and a possible record for the same allergen.
pub fn match_ingredient(
    profile: &AllergyProfile,
    ingredient: &str,
    reference: &AllergenKnowledgeBase,
    min_overlap: usize,
) -> Vec<MatchRecord> {
    let token = normalize(ingredient);
    let tokens = words(&token);
    if tokens.is_empty() {
        return Vec::new();
    }

    let max_span = reference.max_phrase_words().max(profile.max_words()).max(1);

    // Keyed by allergen so repeated hits inside one ingredient collapse.
    let mut confirmed: BTreeMap<String, String> = BTreeMap::new();
    let mut possible: BTreeMap<String, (MatchedFamily, String)> = BTreeMap::new();
    let mut unmatched: Vec<&str> = Vec::new();

    let mut start = 0;
    while start < tokens.len() {
        let longest = max_span.min(tokens.len() - start);
        let mut consumed = 0;

        for span in (1..=longest).rev() {
            let phrase = tokens[start..start + span].join(" ");
            let Some(hits) = classify_phrase(profile, reference, &phrase) else {
                continue;
            };
            for hit in hits {
                match hit {
                    PhraseHit::Confirmed(family) => {
                        confirmed.entry(family).or_insert_with(|| phrase.clone());
                    }
                    PhraseHit::Possible(family) => {
                        possible
                            .entry(family.clone())
                            .or_insert_with(|| (MatchedFamily::known(family), phrase.clone()));
                    }
                }
            }
            consumed = span;
            break;
        }

        if consumed == 0 {
            unmatched.push(tokens[start]);
            consumed = 1;
        }
        start += consumed;
    }

    if !unmatched.is_empty() {
        for allergen in profile.iter() {
            if confirmed.contains_key(allergen) || possible.contains_key(allergen) {
                continue;
            }
            let candidates = overlap_candidates(allergen, reference);
            let hit = unmatched.iter().find(|word| {
                candidates
                    .iter()
                    .any(|candidate| overlaps(word, candidate, min_overlap))
            });
            if let Some(word) = hit {
                let family = MatchedFamily::Unclassified {
                    allergen: allergen.to_string(),
                    overlap: word.to_string(),
                };
                possible.insert(allergen.to_string(), (family, word.to_string()));
            }
        }
    }

    possible.retain(|allergen, _| !confirmed.contains_key(allergen));

    let confirmed_records = confirmed.into_iter().map(|(family, matched_text)| MatchRecord {
        ingredient: ingredient.to_string(),
        matched_text,
        family: MatchedFamily::known(family),
        kind: MatchKind::Confirmed,
    });
    let possible_records = possible.into_values().map(|(family, matched_text)| MatchRecord {
        ingredient: ingredient.to_string(),
        matched_text,
        family,
        kind: MatchKind::Possible,
    });
    confirmed_records.chain(possible_records).collect()
}

/// Hits for one phrase, or `None` when neither the profile nor the
/// knowledge base knows it. An empty list means the phrase is known but
/// irrelevant to this profile.
fn classify_phrase(
    profile: &AllergyProfile,
    reference: &AllergenKnowledgeBase,
    phrase: &str,
) -> Option<Vec<PhraseHit>> {
    if profile.contains(phrase) {
        let family = reference
            .lookup_direct(phrase)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| phrase.to_string());
        let mut hits = vec![PhraseHit::Confirmed(family)];
        // A listed derivative still implicates its listed family.
        if let Some(owner) = reference.lookup_derivative(phrase) {
            if profile.contains(&owner.name) {
                hits.push(PhraseHit::Possible(owner.name.clone()));
            }
        }
        return Some(hits);
    }

    let hits = match reference.classify(phrase)? {
        PhraseClass::Direct(family) if profile.contains(&family.name) => {
            vec![PhraseHit::Confirmed(family.name.clone())]
        }
        PhraseClass::Derivative(family) if profile.contains(&family.name) => {
            vec![PhraseHit::Possible(family.name.clone())]
        }
        _ => Vec::new(),
    };
    Some(hits)
}

// ---------------------------------------------------------------------------
// Overlap fallback
// ---------------------------------------------------------------------------

/// Words an unrecognized ingredient word is compared with for one profile
/// allergen: the allergen's own words plus its family's single-word direct
/// names ("dairy" is also checked as "milk", "cheese", ...).
fn overlap_candidates<'a>(allergen: &'a str, reference: &'a AllergenKnowledgeBase) -> Vec<&'a str> {
    let mut candidates = words(allergen);
    if let Some(family) = reference.lookup_family(allergen) {
        candidates.extend(
            family
                .direct
                .iter()
                .map(String::as_str)
                .filter(|name| !name.contains(' ')),
        );
    }
    candidates.sort_unstable();
    candidates.dedup();
    candidates
}

/// Prefix or substring overlap between an ingredient word and an allergen
/// word of at least `min(min_overlap, allergen length)` characters, never
/// fewer than three.
pub fn overlaps(word: &str, allergen: &str, min_overlap: usize) -> bool {
    let allergen_len = allergen.chars().count();
    let word_len = word.chars().count();
    let threshold = min_overlap.min(allergen_len).max(OVERLAP_FLOOR);

    let shared_prefix = word
        .chars()
        .zip(allergen.chars())
        .take_while(|(a, b)| a == b)
        .count();
    if shared_prefix >= threshold {
        return true;
    }
    if allergen_len >= threshold && word.contains(allergen) {
        return true;
    }
    word_len >= threshold && allergen.contains(word)
}
