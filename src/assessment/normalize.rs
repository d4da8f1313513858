use std::sync::LazyLock;

use regex::Regex;

/// Apostrophes are dropped outright so "za'atar" stays one word.
static RE_APOSTROPHE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"['’`]").unwrap());
/// Any run of non-alphanumeric characters becomes a single word boundary.
static RE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

/// Words ending in "s" that are already singular.
const INVARIANT_WORDS: &[&str] = &[
    "molasses", "series", "species", "swiss", "lees", "gras", "anis", "hummus", "couscous",
    "asparagus", "citrus", "arachis", "bonus", "news", "chassis",
];

/// Plurals the suffix rules would get wrong.
const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("cookies", "cookie"),
    ("brownies", "brownie"),
    ("calories", "calorie"),
    ("pies", "pie"),
    ("leaves", "leaf"),
    ("loaves", "loaf"),
    ("halves", "half"),
    ("knives", "knife"),
    ("geese", "goose"),
    ("teeth", "tooth"),
];

/// Spelling variants mapped to one canonical form (applied after singularization).
const SPELLING_ALIASES: &[(&str, &str)] = &[
    ("colour", "color"),
    ("flavour", "flavor"),
    ("flavouring", "flavoring"),
    ("yoghurt", "yogurt"),
    ("yogourt", "yogurt"),
    ("sulphite", "sulfite"),
    ("sulphur", "sulfur"),
    ("metabisulphite", "metabisulfite"),
    ("bisulphite", "bisulfite"),
    ("mollusc", "mollusk"),
    ("chilli", "chili"),
    ("fibre", "fiber"),
    ("savoury", "savory"),
    ("hydrolysed", "hydrolyzed"),
    ("caramelised", "caramelized"),
    ("aluminium", "aluminum"),
];

/// Normalize free text into a canonical token: lower-cased, punctuation and
/// whitespace runs collapsed to single spaces, each word singularized and
/// mapped through the spelling alias table.
///
/// Total over all input; text with nothing to canonicalize comes back
/// lower-cased and trimmed.
pub fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let joined = RE_APOSTROPHE.replace_all(&lower, "");
    let spaced = RE_SEPARATORS.replace_all(&joined, " ");

    spaced
        .split_whitespace()
        .map(|word| canonical_spelling(&singularize(word)).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduce a single lower-case word to its singular form.
pub fn singularize(word: &str) -> String {
    if let Some((_, singular)) = IRREGULAR_PLURALS.iter().find(|(p, _)| *p == word) {
        return singular.to_string();
    }
    if word.chars().count() <= 3 || INVARIANT_WORDS.contains(&word) || !word.ends_with('s') {
        return word.to_string();
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }

    let stem = &word[..word.len() - 1];
    if word.len() > 4 && word.ends_with("ies") {
        return format!("{}y", &word[..word.len() - 3]);
    }
    if ["sses", "ches", "shes", "xes", "zes", "oes"]
        .iter()
        .any(|suffix| word.ends_with(suffix))
    {
        return word[..word.len() - 2].to_string();
    }
    stem.to_string()
}

fn canonical_spelling(word: &str) -> &str {
    SPELLING_ALIASES
        .iter()
        .find(|(variant, _)| *variant == word)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(word)
}

/// Split a normalized token into its words.
pub fn words(token: &str) -> Vec<&str> {
    token.split(' ').filter(|w| !w.is_empty()).collect()
}
