//! Rule tables for the triage engine
//!
//! Compiled once on first use. Urgency rules are ordered: for a given
//! label, the first matching pattern wins. Boosts are priority-level
//! escalations in {1, 2, 3}.

use regex::Regex;
use std::sync::LazyLock;

/// (pattern, canonical label, severity boost)
pub struct UrgencyRule {
    pub pattern: Regex,
    pub label: &'static str,
    pub boost: u8,
}

/// (pattern, resource type, confidence)
pub struct PhraseRule {
    pub pattern: Regex,
    pub resource_type: &'static str,
    pub confidence: f64,
}

/// Resource-type keyword bag. Keywords are matched as word prefixes
/// (`\bkw\w*\b`), so "injur" also hits "injured" and "injuries".
pub struct KeywordBag {
    pub resource_type: &'static str,
    pub keywords: Vec<Regex>,
    /// Per-keyword weight: 1.0 for keywords longer than 4 chars, 0.6 otherwise.
    pub weights: Vec<f64>,
}

fn rx(pattern: &str) -> Regex {
    #[allow(clippy::expect_used)]
    Regex::new(pattern).expect("static rule pattern must compile")
}

pub static URGENCY_RULES: LazyLock<Vec<UrgencyRule>> = LazyLock::new(|| {
    let rule = |pattern: &str, label: &'static str, boost: u8| UrgencyRule {
        pattern: rx(pattern),
        label,
        boost,
    };
    vec![
        // Life-threatening — auto-elevate to critical
        rule(r"\b(unconscious|unresponsive|not breathing|cardiac arrest)\b", "unconscious", 3),
        rule(r"\b(trapped|pinned|buried|stuck under)\b", "trapped", 3),
        rule(r"\b(heavy bleeding|hemorrhag|severe bleed|blood loss)\b", "severe_bleeding", 3),
        rule(r"\b(drowning|submerged)\b", "drowning", 3),
        rule(r"\b(crush(ed|ing)?)\b", "crush_injury", 3),
        rule(r"\b(not moving|paralyz)\b", "immobile", 2),
        // Vulnerable populations
        rule(r"\b(infant|newborn|baby|toddler)\b", "infant", 2),
        rule(r"\b(elderly|senior|aged|old (man|woman|person))\b", "elderly", 2),
        rule(r"\b(pregnant|expecting)\b", "pregnant", 2),
        rule(r"\b(disabled|wheelchair|disability)\b", "disabled", 2),
        // Deprivation signals
        rule(r"\bno (water|food|medicine) for \d+ day", "prolonged_deprivation", 2),
        rule(r"\b(dehydrat|starv)\w*\b", "dehydration_starvation", 2),
        rule(r"\b(no (clean )?water)\b", "no_water", 1),
        rule(r"\b(no food|hungry|starving)\b", "no_food", 1),
        rule(r"\b(no shelter|homeless|exposed)\b", "no_shelter", 1),
        rule(r"\b(no medic(ine|ation)|out of med)\b", "no_medicine", 1),
        // Medical urgency
        rule(r"\b(bleeding|wound|injur|fracture|broken bone)\b", "injury", 1),
        rule(r"\b(infection|fever|sepsis)\b", "infection", 1),
        rule(r"\b(diabete?s|insulin)\b", "chronic_medical", 1),
        rule(r"\b(asthma|inhaler|breathing difficult)\b", "respiratory", 1),
        rule(r"\b(chest pain|heart)\b", "cardiac_symptom", 2),
        rule(r"\b(seizure|convuls)\b", "seizure", 2),
        // Scale indicators
        rule(r"\b(\d{2,}) (people|persons|family members|families)\b", "large_group", 1),
        rule(r"\b(children|kids)\b", "children_present", 1),
    ]
});

/// Canonical labels the engine can emit, for validation and UI filters.
pub fn known_labels() -> Vec<&'static str> {
    URGENCY_RULES.iter().map(|r| r.label).collect()
}

pub static PHRASE_RULES: LazyLock<Vec<PhraseRule>> = LazyLock::new(|| {
    let rule = |pattern: &str, resource_type: &'static str, confidence: f64| PhraseRule {
        pattern: rx(pattern),
        resource_type,
        confidence,
    };
    vec![
        rule(r"need(s)?\s+(clean\s+)?water", "Water", 0.9),
        rule(r"need(s)?\s+food", "Food", 0.9),
        rule(r"(medical|first.?aid)\s+(help|attention|care|supplies)", "Medical", 0.9),
        rule(r"need(s)?\s+(a\s+)?shelter", "Shelter", 0.9),
        rule(r"need(s)?\s+(to\s+be\s+)?evacuat", "Evacuation", 0.9),
        rule(r"need(s)?\s+cloth", "Clothing", 0.85),
        rule(r"(house|home|building)\s+(collapse|destroy|damage)", "Shelter", 0.85),
        rule(r"run(ning)?\s+out\s+of\s+(food|water|medicine)", "Food", 0.85),
        rule(r"(no|without)\s+(access\s+to\s+)?(food|water|medicine)", "Food", 0.85),
        rule(r"(financial|monetary)\s+(help|aid|assistance|support)", "Financial Aid", 0.9),
    ]
});

const RESOURCE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Food",
        &[
            "food", "meal", "rice", "bread", "ration", "nutrition", "hungry", "starving", "eat",
            "cook", "canned", "supplies", "grocery",
        ],
    ),
    (
        "Water",
        &[
            "water", "drink", "thirst", "dehydrat", "purif", "clean water", "bottled water",
            "gallons",
        ],
    ),
    (
        "Medical",
        &[
            "medic", "doctor", "nurse", "ambulance", "hospital", "first aid", "bandage", "insulin",
            "inhaler", "medicine", "drug", "pharma", "wound", "bleeding", "injury", "fracture",
            "pain", "fever", "infection", "antibiot",
        ],
    ),
    (
        "Shelter",
        &[
            "shelter", "tent", "tarp", "blanket", "roof", "housing", "sleep", "camp", "refuge",
            "cover", "mattress",
        ],
    ),
    (
        "Clothing",
        &[
            "cloth", "shirt", "pants", "jacket", "coat", "shoe", "warm", "winter gear", "diaper",
        ],
    ),
    (
        "Evacuation",
        &[
            "evacuat", "transport", "rescue", "helicopter", "boat", "vehicle", "trapped",
            "stranded", "airlift",
        ],
    ),
    (
        "Volunteers",
        &[
            "volunteer", "helper", "manpower", "people to help", "assistance", "hands",
        ],
    ),
    (
        "Financial Aid",
        &["money", "cash", "fund", "financial", "donation", "payment"],
    ),
];

pub static KEYWORD_BAGS: LazyLock<Vec<KeywordBag>> = LazyLock::new(|| {
    RESOURCE_KEYWORDS
        .iter()
        .map(|(resource_type, keywords)| KeywordBag {
            resource_type,
            keywords: keywords
                .iter()
                .map(|kw| rx(&format!(r"\b{}\w*\b", regex::escape(kw))))
                .collect(),
            weights: keywords
                .iter()
                .map(|kw| if kw.len() > 4 { 1.0 } else { 0.6 })
                .collect(),
        })
        .collect()
});

/// Contextual quantity patterns; the first capture group is the number.
pub static QUANTITY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(\d+)\s*(people|persons|family members?|families|adults|children|kids)",
        r"(\d+)\s*(bottles?|gallons?|liters?|litres?|packs?|boxes?|kits?|units?|bags?|cans?)",
        r"need\s+(\d+)",
        r"(\d+)\s*(of us|of them|mouths?)",
        r"family of (\d+)",
    ]
    .iter()
    .map(|p| rx(p))
    .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_compile() {
        assert!(!URGENCY_RULES.is_empty());
        assert!(!PHRASE_RULES.is_empty());
        assert_eq!(KEYWORD_BAGS.len(), 8);
        assert_eq!(QUANTITY_PATTERNS.len(), 5);
    }

    #[test]
    fn test_labels_distinct() {
        let labels = known_labels();
        let mut dedup = labels.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(labels.len(), dedup.len());
    }

    #[test]
    fn test_boost_range() {
        for rule in URGENCY_RULES.iter() {
            assert!((1..=3).contains(&rule.boost), "label {}", rule.label);
        }
    }

    #[test]
    fn test_keyword_weights() {
        let water = KEYWORD_BAGS
            .iter()
            .find(|b| b.resource_type == "Water")
            .unwrap();
        // "water" (5 chars) weighs 1.0
        let idx = 0;
        assert_eq!(water.weights[idx], 1.0);
    }
}
