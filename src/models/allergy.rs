use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assessment::normalize::{normalize, words};
use crate::assessment::reference::AllergenKnowledgeBase;

/// A customer's declared allergies as canonical allergen tokens.
///
/// Entries that are direct names of a known family are stored under the
/// family's canonical name ("milk" becomes "dairy").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllergyProfile {
    allergens: BTreeSet<String>,
}

impl AllergyProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a profile from free-text entries. Blank entries are skipped.
    pub fn from_entries<I, S>(entries: I, reference: &AllergenKnowledgeBase) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut profile = Self::new();
        for entry in entries {
            profile.add(entry.as_ref(), reference);
        }
        profile
    }

    /// Lenient intake from loosely-typed input.
    ///
    /// Accepts a list of strings or an object with an `allergies` list.
    /// Non-string entries are dropped; anything else yields an empty profile.
    pub fn from_json_value(value: &Value, reference: &AllergenKnowledgeBase) -> Self {
        let entries = match value {
            Value::Array(items) => items,
            Value::Object(map) => match map.get("allergies") {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => return Self::new(),
                Some(other) => {
                    tracing::warn!(kind = json_kind(other), "Allergy list is not a sequence, dropped");
                    return Self::new();
                }
            },
            Value::Null => return Self::new(),
            other => {
                tracing::warn!(kind = json_kind(other), "Allergy profile is malformed, dropped");
                return Self::new();
            }
        };

        let mut profile = Self::new();
        for (index, entry) in entries.iter().enumerate() {
            match entry {
                Value::String(text) => {
                    profile.add(text, reference);
                }
                other => tracing::warn!(
                    index,
                    kind = json_kind(other),
                    "Non-string allergy entry dropped"
                ),
            }
        }
        profile
    }

    /// Add an allergy. Free text naming a family anywhere ("dairy
    /// products") is stored as that family. Returns true when the profile
    /// changed.
    pub fn add(&mut self, raw: &str, reference: &AllergenKnowledgeBase) -> bool {
        let token = normalize(raw);
        if token.is_empty() {
            return false;
        }
        let mut changed = false;
        for canonical in reference.canonical_tokens(&token) {
            changed |= self.allergens.insert(canonical);
        }
        changed
    }

    /// Remove an allergy, however it was phrased. Returns true when the
    /// profile changed.
    pub fn remove(&mut self, raw: &str, reference: &AllergenKnowledgeBase) -> bool {
        let token = normalize(raw);
        if token.is_empty() {
            return false;
        }
        let mut changed = false;
        for canonical in reference.canonical_tokens(&token) {
            changed |= self.allergens.remove(&canonical);
        }
        changed
    }

    /// Re-canonicalize every entry, e.g. for a profile deserialized verbatim.
    pub fn canonicalized(&self, reference: &AllergenKnowledgeBase) -> Self {
        Self::from_entries(self.allergens.iter(), reference)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.allergens.contains(token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.allergens.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.allergens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allergens.is_empty()
    }

    /// Longest entry, in words.
    pub fn max_words(&self) -> usize {
        self.allergens.iter().map(|a| words(a).len()).max().unwrap_or(0)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
