use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

use super::normalize::{normalize, words};
use super::types::AssessmentError;

/// File name of the allergen family table inside a resources directory.
pub const REFERENCE_FILE: &str = "allergen_families.json";

/// The allergen family table shipped with the crate.
const BUNDLED_REFERENCE: &str = include_str!("../../resources/allergen_families.json");

static BUNDLED: LazyLock<Result<Arc<AllergenKnowledgeBase>, AssessmentError>> =
    LazyLock::new(|| {
        AllergenKnowledgeBase::from_json(BUNDLED_REFERENCE, "bundled allergen_families.json")
            .map(Arc::new)
    });

/// One family as written in the reference file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyEntry {
    pub name: String,
    #[serde(default)]
    pub direct: Vec<String>,
    #[serde(default)]
    pub derivatives: Vec<String>,
}

/// Reference file layout (allergen_families.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceFile {
    #[serde(default)]
    pub version: u32,
    pub families: Vec<FamilyEntry>,
    /// Phrases that contain allergen words but are not allergens
    /// ("cocoa butter"). Recognized so their words are not matched on.
    #[serde(default)]
    pub neutral: Vec<String>,
}

/// A canonical allergen concept with its normalized names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllergenFamily {
    pub name: String,
    /// Textually synonymous names, including the canonical name itself.
    pub direct: BTreeSet<String>,
    /// Related but not identical names.
    pub derivatives: BTreeSet<String>,
}

/// How the knowledge base classifies a normalized phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseClass<'a> {
    Direct(&'a AllergenFamily),
    Derivative(&'a AllergenFamily),
    Neutral,
}

/// Immutable allergen knowledge base, queryable by direct or derivative name.
#[derive(Debug)]
pub struct AllergenKnowledgeBase {
    families: Vec<AllergenFamily>,
    direct: HashMap<String, usize>,
    derivative: HashMap<String, usize>,
    neutral: HashSet<String>,
    max_phrase_words: usize,
}

impl AllergenKnowledgeBase {
    /// Load the reference table from a resources directory.
    pub fn load(resources_dir: &Path) -> Result<Self, AssessmentError> {
        Self::load_file(&resources_dir.join(REFERENCE_FILE))
    }

    /// Load the reference table from an explicit file.
    pub fn load_file(path: &Path) -> Result<Self, AssessmentError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            AssessmentError::ReferenceDataLoad(path.display().to_string(), e.to_string())
        })?;
        Self::from_json(&json, &path.display().to_string())
    }

    /// The table compiled into the crate, built once per process.
    pub fn bundled() -> Result<Arc<Self>, AssessmentError> {
        BUNDLED.clone()
    }

    /// Parse and build from JSON text. `source` names the input in errors.
    pub fn from_json(json: &str, source: &str) -> Result<Self, AssessmentError> {
        let file: ReferenceFile = serde_json::from_str(json)
            .map_err(|e| AssessmentError::ReferenceDataParse(source.into(), e.to_string()))?;
        let kb = Self::from_reference(file)?;

        tracing::info!(
            source,
            families = kb.families.len(),
            direct_names = kb.direct.len(),
            derivative_names = kb.derivative.len(),
            neutral = kb.neutral.len(),
            "Allergen knowledge base loaded"
        );
        Ok(kb)
    }

    /// Build the lookup maps, normalizing every name.
    ///
    /// A direct name may belong to one family only. A derivative that is
    /// a direct name elsewhere is excluded. An empty table is rejected.
    pub fn from_reference(file: ReferenceFile) -> Result<Self, AssessmentError> {
        if file.families.is_empty() {
            return Err(AssessmentError::ReferenceDataInvalid(
                "no allergen families defined".into(),
            ));
        }

        let mut families: Vec<AllergenFamily> = Vec::with_capacity(file.families.len());
        let mut direct: HashMap<String, usize> = HashMap::new();

        for entry in &file.families {
            let name = normalize(&entry.name);
            if name.is_empty() {
                return Err(AssessmentError::ReferenceDataInvalid(format!(
                    "family name {:?} is empty after normalization",
                    entry.name
                )));
            }
            if families.iter().any(|f| f.name == name) {
                return Err(AssessmentError::ReferenceDataInvalid(format!(
                    "family '{name}' is defined twice"
                )));
            }

            let index = families.len();
            let mut names = BTreeSet::new();
            names.insert(name.clone());
            names.extend(entry.direct.iter().map(|d| normalize(d)).filter(|d| !d.is_empty()));

            for token in &names {
                if let Some(&other) = direct.get(token) {
                    return Err(AssessmentError::ReferenceDataInvalid(format!(
                        "'{token}' is a direct name of both '{}' and '{name}'",
                        families[other].name
                    )));
                }
                direct.insert(token.clone(), index);
            }

            families.push(AllergenFamily {
                name,
                direct: names,
                derivatives: BTreeSet::new(),
            });
        }

        let mut derivative: HashMap<String, usize> = HashMap::new();
        for (index, entry) in file.families.iter().enumerate() {
            for raw in &entry.derivatives {
                let token = normalize(raw);
                if token.is_empty() {
                    continue;
                }
                match direct.get(&token) {
                    Some(&owner) if owner == index => continue,
                    Some(&owner) => {
                        tracing::warn!(
                            token = %token,
                            family = %families[index].name,
                            direct_of = %families[owner].name,
                            "Derivative is a direct name of another family, excluded"
                        );
                        continue;
                    }
                    None => {}
                }
                if let Some(&other) = derivative.get(&token) {
                    if other != index {
                        return Err(AssessmentError::ReferenceDataInvalid(format!(
                            "'{token}' is a derivative of both '{}' and '{}'",
                            families[other].name, families[index].name
                        )));
                    }
                }
                derivative.insert(token.clone(), index);
                families[index].derivatives.insert(token);
            }
        }

        let mut neutral = HashSet::new();
        for raw in &file.neutral {
            let token = normalize(raw);
            if token.is_empty() {
                continue;
            }
            if direct.contains_key(&token) || derivative.contains_key(&token) {
                return Err(AssessmentError::ReferenceDataInvalid(format!(
                    "neutral phrase '{token}' is also an allergen name"
                )));
            }
            neutral.insert(token);
        }

        let max_phrase_words = direct
            .keys()
            .chain(derivative.keys())
            .chain(neutral.iter())
            .map(|k| words(k).len())
            .max()
            .unwrap_or(1);

        Ok(Self {
            families,
            direct,
            derivative,
            neutral,
            max_phrase_words,
        })
    }

    /// Family whose direct names include `token` (already normalized).
    pub fn lookup_direct(&self, token: &str) -> Option<&AllergenFamily> {
        self.direct.get(token).map(|&i| &self.families[i])
    }

    /// Family whose derivative names include `token` (already normalized).
    pub fn lookup_derivative(&self, token: &str) -> Option<&AllergenFamily> {
        self.derivative.get(token).map(|&i| &self.families[i])
    }

    pub fn lookup_family(&self, name: &str) -> Option<&AllergenFamily> {
        self.families.iter().find(|f| f.name == name)
    }

    pub fn classify(&self, phrase: &str) -> Option<PhraseClass<'_>> {
        if let Some(family) = self.lookup_direct(phrase) {
            return Some(PhraseClass::Direct(family));
        }
        if let Some(family) = self.lookup_derivative(phrase) {
            return Some(PhraseClass::Derivative(family));
        }
        self.neutral.contains(phrase).then_some(PhraseClass::Neutral)
    }

    pub fn is_recognized(&self, phrase: &str) -> bool {
        self.classify(phrase).is_some()
    }

    /// Map a normalized allergen to its family's canonical name when it is a
    /// direct name; otherwise return it unchanged.
    pub fn canonicalize(&self, token: &str) -> String {
        self.lookup_direct(token)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| token.to_string())
    }

    /// Canonical allergen tokens for one normalized profile entry.
    ///
    /// A whole known phrase is canonicalized as is. Otherwise the entry is
    /// segmented into the longest known phrases: every family named by a
    /// direct phrase is returned ("dairy product" gives "dairy", "milk and
    /// egg" gives both). With no family named, the derivative or neutral
    /// phrases found are returned ("whey allergy" gives "whey"), and failing
    /// that the entry itself.
    pub fn canonical_tokens(&self, token: &str) -> Vec<String> {
        if self.is_recognized(token) {
            return vec![self.canonicalize(token)];
        }

        let tokens = words(token);
        let mut families: Vec<String> = Vec::new();
        let mut phrases: Vec<String> = Vec::new();

        let mut start = 0;
        while start < tokens.len() {
            let longest = self.max_phrase_words.min(tokens.len() - start);
            let mut consumed = 1;
            for span in (1..=longest).rev() {
                let phrase = tokens[start..start + span].join(" ");
                let Some(class) = self.classify(&phrase) else {
                    continue;
                };
                match class {
                    PhraseClass::Direct(family) => {
                        if !families.contains(&family.name) {
                            families.push(family.name.clone());
                        }
                    }
                    PhraseClass::Derivative(_) | PhraseClass::Neutral => {
                        if !phrases.contains(&phrase) {
                            phrases.push(phrase);
                        }
                    }
                }
                consumed = span;
                break;
            }
            start += consumed;
        }

        if !families.is_empty() {
            families
        } else if !phrases.is_empty() {
            phrases
        } else {
            vec![token.to_string()]
        }
    }

    pub fn families(&self) -> &[AllergenFamily] {
        &self.families
    }

    /// Longest phrase, in words, across all known names.
    pub fn max_phrase_words(&self) -> usize {
        self.max_phrase_words
    }

    /// Small table for tests (no file I/O).
    #[cfg(test)]
    pub fn load_test() -> Self {
        fn family(name: &str, direct: &[&str], derivatives: &[&str]) -> FamilyEntry {
            FamilyEntry {
                name: name.into(),
                direct: direct.iter().map(|s| s.to_string()).collect(),
                derivatives: derivatives.iter().map(|s| s.to_string()).collect(),
            }
        }

        Self::from_reference(ReferenceFile {
            version: 1,
            families: vec![
                family("dairy", &["milk", "butter", "cheese", "cream"], &["whey", "casein", "lactose"]),
                family("peanut", &["peanut", "groundnut", "peanut butter"], &["arachis"]),
                family("tree nut", &["almond", "cashew", "walnut"], &["marzipan", "praline"]),
                family("soy", &["soy", "soya", "tofu"], &["vegetable protein"]),
                family("shellfish", &["shellfish", "shrimp", "prawn", "crab"], &["glucosamine"]),
                family("egg", &["egg"], &["albumin", "mayonnaise"]),
            ],
            neutral: vec!["cocoa butter".into(), "eggplant".into()],
        })
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(json: &str) -> Result<AllergenKnowledgeBase, AssessmentError> {
        AllergenKnowledgeBase::from_json(json, "test")
    }

    #[test]
    fn lookup_direct_and_derivative() {
        let kb = AllergenKnowledgeBase::load_test();
        assert_eq!(kb.lookup_direct("milk").unwrap().name, "dairy");
        assert_eq!(kb.lookup_direct("dairy").unwrap().name, "dairy");
        assert_eq!(kb.lookup_derivative("whey").unwrap().name, "dairy");
        assert!(kb.lookup_direct("whey").is_none());
        assert!(kb.lookup_derivative("milk").is_none());
        assert!(kb.lookup_direct("sugar").is_none());
    }

    #[test]
    fn names_are_normalized_at_load() {
        let kb = reference(
            r#"{"families": [{"name": "Tree Nuts", "direct": ["Walnuts", "CASHEWS"], "derivatives": ["Pralines"]}]}"#,
        )
        .unwrap();
        assert_eq!(kb.lookup_direct("walnut").unwrap().name, "tree nut");
        assert_eq!(kb.lookup_direct("cashew").unwrap().name, "tree nut");
        assert_eq!(kb.lookup_derivative("praline").unwrap().name, "tree nut");
    }

    #[test]
    fn classify_neutral_phrase() {
        let kb = AllergenKnowledgeBase::load_test();
        assert_eq!(kb.classify("cocoa butter"), Some(PhraseClass::Neutral));
        assert!(matches!(kb.classify("butter"), Some(PhraseClass::Direct(f)) if f.name == "dairy"));
        assert!(kb.is_recognized("eggplant"));
        assert!(!kb.is_recognized("soybean"));
    }

    #[test]
    fn canonicalize_direct_names_only() {
        let kb = AllergenKnowledgeBase::load_test();
        assert_eq!(kb.canonicalize("milk"), "dairy");
        assert_eq!(kb.canonicalize("groundnut"), "peanut");
        assert_eq!(kb.canonicalize("whey"), "whey");
        assert_eq!(kb.canonicalize("strawberry"), "strawberry");
    }

    #[test]
    fn canonical_tokens_find_family_inside_phrase() {
        let kb = AllergenKnowledgeBase::load_test();
        assert_eq!(kb.canonical_tokens("dairy product"), vec!["dairy"]);
        assert_eq!(kb.canonical_tokens("peanut allergy"), vec!["peanut"]);
        assert_eq!(kb.canonical_tokens("severe shrimp allergy"), vec!["shellfish"]);
        assert_eq!(kb.canonical_tokens("milk and egg"), vec!["dairy", "egg"]);
    }

    #[test]
    fn canonical_tokens_keep_known_and_unknown_phrases() {
        let kb = AllergenKnowledgeBase::load_test();
        assert_eq!(kb.canonical_tokens("milk"), vec!["dairy"]);
        assert_eq!(kb.canonical_tokens("whey"), vec!["whey"]);
        assert_eq!(kb.canonical_tokens("whey allergy"), vec!["whey"]);
        assert_eq!(kb.canonical_tokens("cocoa butter"), vec!["cocoa butter"]);
        assert_eq!(kb.canonical_tokens("eggplant allergy"), vec!["eggplant"]);
        assert_eq!(kb.canonical_tokens("strawberry"), vec!["strawberry"]);
    }

    #[test]
    fn canonical_tokens_prefer_longest_phrase() {
        let kb = AllergenKnowledgeBase::load_test();
        // "peanut butter" is one peanut phrase, not peanut plus dairy.
        assert_eq!(kb.canonical_tokens("peanut butter sauce"), vec!["peanut"]);
    }

    #[test]
    fn max_phrase_words_tracks_longest_name() {
        let kb = AllergenKnowledgeBase::load_test();
        assert_eq!(kb.max_phrase_words(), 2);
    }

    // --- Validation ---

    #[test]
    fn empty_table_rejected() {
        let err = reference(r#"{"families": []}"#).unwrap_err();
        assert!(matches!(err, AssessmentError::ReferenceDataInvalid(_)));
    }

    #[test]
    fn malformed_json_rejected() {
        let err = reference("{ not json").unwrap_err();
        assert!(matches!(err, AssessmentError::ReferenceDataParse(..)));
    }

    #[test]
    fn direct_name_in_two_families_rejected() {
        let err = reference(
            r#"{"families": [
                {"name": "dairy", "direct": ["butter"]},
                {"name": "peanut", "direct": ["butter"]}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AssessmentError::ReferenceDataInvalid(msg) if msg.contains("butter")));
    }

    #[test]
    fn derivative_of_other_family_direct_name_excluded() {
        let kb = reference(
            r#"{"families": [
                {"name": "dairy", "direct": ["milk"], "derivatives": ["peanut", "whey"]},
                {"name": "peanut", "direct": []}
            ]}"#,
        )
        .unwrap();
        assert!(kb.lookup_derivative("peanut").is_none());
        assert_eq!(kb.lookup_direct("peanut").unwrap().name, "peanut");
        assert!(!kb.lookup_family("dairy").unwrap().derivatives.contains("peanut"));
        assert_eq!(kb.lookup_derivative("whey").unwrap().name, "dairy");
    }

    #[test]
    fn derivative_that_is_own_direct_name_ignored() {
        let kb = reference(
            r#"{"families": [{"name": "dairy", "direct": ["milk"], "derivatives": ["milk"]}]}"#,
        )
        .unwrap();
        assert_eq!(kb.lookup_direct("milk").unwrap().name, "dairy");
        assert!(kb.lookup_derivative("milk").is_none());
    }

    #[test]
    fn derivative_in_two_families_rejected() {
        let err = reference(
            r#"{"families": [
                {"name": "soy", "derivatives": ["lecithin"]},
                {"name": "egg", "derivatives": ["lecithin"]}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AssessmentError::ReferenceDataInvalid(_)));
    }

    #[test]
    fn neutral_overlapping_allergen_rejected() {
        let err = reference(
            r#"{"families": [{"name": "dairy", "direct": ["butter"]}], "neutral": ["butter"]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AssessmentError::ReferenceDataInvalid(_)));
    }

    // --- Loading ---

    #[test]
    fn bundled_table_loads() {
        let kb = AllergenKnowledgeBase::bundled().expect("bundled reference data must load");
        for family in ["dairy", "egg", "peanut", "tree nut", "soy", "wheat", "fish", "shellfish", "sesame"] {
            assert!(kb.lookup_family(family).is_some(), "missing family {family}");
        }
        assert_eq!(kb.lookup_derivative("whey").unwrap().name, "dairy");
        assert_eq!(kb.lookup_derivative("casein").unwrap().name, "dairy");
        assert_eq!(kb.lookup_direct("sulphite").map(|f| f.name.as_str()), None);
        assert_eq!(kb.lookup_direct("sulfite").unwrap().name, "sulfite");
    }

    #[test]
    fn bundled_table_is_shared() {
        let a = AllergenKnowledgeBase::bundled().unwrap();
        let b = AllergenKnowledgeBase::bundled().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn bundled_derivatives_never_contain_own_direct_words() {
        // Longest-phrase matching would otherwise downgrade "x salt" below "x".
        let kb = AllergenKnowledgeBase::bundled().unwrap();
        for family in kb.families() {
            for derivative in &family.derivatives {
                for word in words(derivative) {
                    assert!(
                        !family.direct.contains(word),
                        "derivative '{derivative}' of '{}' contains direct name '{word}'",
                        family.name
                    );
                }
            }
        }
    }

    #[test]
    fn load_from_resources_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(REFERENCE_FILE),
            r#"{"families": [{"name": "sesame", "direct": ["tahini"]}]}"#,
        )
        .unwrap();
        let kb = AllergenKnowledgeBase::load(dir.path()).unwrap();
        assert_eq!(kb.lookup_direct("tahini").unwrap().name, "sesame");
    }

    #[test]
    fn load_missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AllergenKnowledgeBase::load(dir.path()).unwrap_err();
        assert!(matches!(err, AssessmentError::ReferenceDataLoad(..)));
    }
}
