//! Rule-driven triage over victim request text
//!
//! Classification of free text into resource categories, urgency-signal
//! extraction, quantity estimation, and priority escalation. Fully
//! offline — no external services.

use serde::{Deserialize, Serialize};

use crate::types::Severity;

use super::rules::{KEYWORD_BAGS, PHRASE_RULES, QUANTITY_PATTERNS, URGENCY_RULES};

/// Cap on heuristic quantity extraction.
const MAX_QUANTITY: u32 = 9_999;

/// A single detected urgency signal in the text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UrgencySignal {
    /// Matched text span.
    pub keyword: String,
    /// Canonical label, e.g. "trapped".
    pub label: String,
    /// Priority levels to escalate by.
    pub severity_boost: u8,
    /// Char offset in the original (lowercased) text.
    pub offset: usize,
}

/// Full NLP triage result for a victim request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Detected resource types, score-descending, score ≥ 0.3.
    pub resource_types: Vec<String>,
    /// All scored types, descending.
    pub resource_type_scores: Vec<(String, f64)>,
    pub recommended_priority: Severity,
    pub priority_confidence: f64,
    /// What the user submitted, if anything.
    pub original_priority: Option<Severity>,
    pub priority_was_escalated: bool,
    pub estimated_quantity: u32,
    pub urgency_signals: Vec<UrgencySignal>,
    /// Overall confidence in [0, 1].
    pub confidence: f64,
}

/// Scan text for urgency keywords.
///
/// The first match per label wins; the returned list is sorted by
/// severity boost, highest first.
pub fn extract_urgency_signals(text: &str) -> Vec<UrgencySignal> {
    if text.is_empty() {
        return Vec::new();
    }
    let text_lower = text.to_lowercase();
    let mut signals: Vec<UrgencySignal> = Vec::new();

    for rule in URGENCY_RULES.iter() {
        if signals.iter().any(|s| s.label == rule.label) {
            continue;
        }
        if let Some(m) = rule.pattern.find(&text_lower) {
            signals.push(UrgencySignal {
                keyword: m.as_str().to_string(),
                label: rule.label.to_string(),
                severity_boost: rule.boost,
                offset: m.start(),
            });
        }
    }

    signals.sort_by(|a, b| b.severity_boost.cmp(&a.severity_boost));
    signals
}

/// Classify free text into resource type(s) with confidence scores.
///
/// Two-pass strategy:
/// 1. Phrase rules — high-confidence patterns like "need clean water"
/// 2. Keyword bag-of-words — broader coverage with lower base confidence
///
/// Returns `(["Custom"], [("Custom", 0.3)])` when nothing scores.
pub fn classify_resource_type(text: &str) -> (Vec<String>, Vec<(String, f64)>) {
    if text.is_empty() {
        return (vec!["Custom".into()], vec![("Custom".into(), 0.3)]);
    }

    let text_lower = text.to_lowercase();
    let mut scores: Vec<(String, f64)> = Vec::new();

    let mut bump = |rtype: &str, score: f64, scores: &mut Vec<(String, f64)>| {
        match scores.iter_mut().find(|(t, _)| t.as_str() == rtype) {
            Some((_, existing)) => *existing = existing.max(score),
            None => scores.push((rtype.to_string(), score)),
        }
    };

    // Pass 1: phrase rules (high confidence)
    for rule in PHRASE_RULES.iter() {
        if rule.pattern.is_match(&text_lower) {
            bump(rule.resource_type, rule.confidence, &mut scores);
        }
    }

    // Pass 2: keyword bag-of-words
    for bag in KEYWORD_BAGS.iter() {
        let mut kw_score = 0.0;
        for (pattern, weight) in bag.keywords.iter().zip(&bag.weights) {
            let matches = pattern.find_iter(&text_lower).count();
            kw_score += matches as f64 * weight;
        }
        if kw_score > 0.0 {
            let normalized = (kw_score / 3.0).min(1.0);
            bump(bag.resource_type, normalized, &mut scores);
        }
    }

    if scores.is_empty() {
        return (vec!["Custom".into()], vec![("Custom".into(), 0.3)]);
    }

    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut primary: Vec<String> = scores
        .iter()
        .filter(|(_, s)| *s >= 0.3)
        .map(|(t, _)| t.clone())
        .collect();
    if primary.is_empty() {
        primary.push(scores[0].0.clone());
    }

    (primary, scores)
}

/// Extract a quantity hint from free text.
///
/// Scans the contextual patterns and returns the maximum number found,
/// capped at 9999; defaults to 1.
pub fn estimate_quantity(text: &str) -> u32 {
    if text.is_empty() {
        return 1;
    }
    let text_lower = text.to_lowercase();
    let mut max_qty: u32 = 1;

    for pattern in QUANTITY_PATTERNS.iter() {
        for caps in pattern.captures_iter(&text_lower) {
            if let Some(qty) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
                max_qty = max_qty.max(qty);
            }
        }
    }

    max_qty.min(MAX_QUANTITY)
}

/// Compute escalated priority from urgency signals.
///
/// New level is `base + max(boost)`, clamped at critical. Monotone: more
/// signals never lower the result, and critical stays critical.
pub fn escalate_priority(base: Severity, signals: &[UrgencySignal]) -> (Severity, bool) {
    let Some(max_boost) = signals.iter().map(|s| s.severity_boost).max() else {
        return (base, false);
    };
    let new_idx = (base.index() + max_boost as usize).min(3);
    let escalated = new_idx > base.index();
    (Severity::from_index(new_idx), escalated)
}

/// Run the full triage pipeline on a request description.
pub fn classify_request(description: &str, user_priority: Severity) -> ClassificationResult {
    // 1. Urgency signals
    let signals = extract_urgency_signals(description);

    // 2. Resource types
    let (types, scores) = classify_resource_type(description);

    // 3. Quantity
    let estimated_quantity = estimate_quantity(description);

    // 4. Priority escalation
    let (recommended, escalated) = escalate_priority(user_priority, &signals);

    // 5. Overall confidence
    let type_conf = scores.first().map(|(_, s)| *s).unwrap_or(0.3);
    let signal_conf = if signals.is_empty() {
        0.4
    } else {
        (signals.len() as f64 * 0.15 + 0.4).min(0.95)
    };
    let confidence = round3((type_conf + signal_conf) / 2.0);

    ClassificationResult {
        resource_types: types,
        resource_type_scores: scores,
        recommended_priority: recommended,
        priority_confidence: signal_conf,
        original_priority: Some(user_priority),
        priority_was_escalated: escalated,
        estimated_quantity,
        urgency_signals: signals,
        confidence,
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::rules::known_labels;

    #[test]
    fn test_extract_signals_dedup_by_label() {
        // "trapped" appears twice; only one signal with that label
        let signals = extract_urgency_signals("trapped under rubble, still trapped");
        let trapped: Vec<_> = signals.iter().filter(|s| s.label == "trapped").collect();
        assert_eq!(trapped.len(), 1);
    }

    #[test]
    fn test_signals_sorted_by_boost() {
        let signals = extract_urgency_signals("children present, someone is trapped");
        assert!(signals.len() >= 2);
        for pair in signals.windows(2) {
            assert!(pair[0].severity_boost >= pair[1].severity_boost);
        }
    }

    #[test]
    fn test_signal_labels_are_known() {
        let labels = known_labels();
        let signals = extract_urgency_signals(
            "elderly woman trapped, heavy bleeding, infant present, no water for 3 days",
        );
        for s in &signals {
            assert!(labels.contains(&s.label.as_str()), "unknown label {}", s.label);
        }
    }

    #[test]
    fn test_classify_water_request() {
        let (types, scores) = classify_resource_type("we need clean water urgently");
        assert_eq!(types[0], "Water");
        assert!(scores[0].1 >= 0.9);
    }

    #[test]
    fn test_classify_empty_is_custom() {
        let (types, scores) = classify_resource_type("");
        assert_eq!(types, vec!["Custom".to_string()]);
        assert_eq!(scores[0].1, 0.3);
    }

    #[test]
    fn test_classify_nonsense_is_custom() {
        let (types, _) = classify_resource_type("zzz qqq xyzzy");
        assert_eq!(types, vec!["Custom".to_string()]);
    }

    #[test]
    fn test_estimate_quantity_patterns() {
        assert_eq!(estimate_quantity("5 water bottles for 3 people"), 5);
        assert_eq!(estimate_quantity("family of 6"), 6);
        assert_eq!(estimate_quantity("need 20"), 20);
        assert_eq!(estimate_quantity("no numbers here"), 1);
        // Max across matches wins when both forms are present
        assert_eq!(estimate_quantity("family of 4, 12 bottles"), 12);
    }

    #[test]
    fn test_estimate_quantity_cap() {
        assert_eq!(estimate_quantity("need 123456 units"), 9_999);
    }

    #[test]
    fn test_escalation_monotone() {
        let s1 = extract_urgency_signals("children present");
        let s2 = extract_urgency_signals("children present, trapped under rubble");
        let (p1, _) = escalate_priority(Severity::Low, &s1);
        let (p2, _) = escalate_priority(Severity::Low, &s2);
        assert!(p2 >= p1);
    }

    #[test]
    fn test_escalation_critical_fixed_point() {
        let signals = extract_urgency_signals("trapped, heavy bleeding, drowning");
        let (p, escalated) = escalate_priority(Severity::Critical, &signals);
        assert_eq!(p, Severity::Critical);
        assert!(!escalated);
    }

    #[test]
    fn test_no_signals_no_escalation() {
        let (p, escalated) = escalate_priority(Severity::Medium, &[]);
        assert_eq!(p, Severity::Medium);
        assert!(!escalated);
    }

    #[test]
    fn test_full_pipeline_s5_scenario() {
        let result = classify_request(
            "elderly woman trapped in collapsed building, heavy bleeding, infant present, \
             no water for 3 days",
            Severity::Medium,
        );

        assert_eq!(result.recommended_priority, Severity::Critical);
        assert!(result.priority_was_escalated);

        let labels: Vec<&str> = result
            .urgency_signals
            .iter()
            .map(|s| s.label.as_str())
            .collect();
        for expected in ["trapped", "severe_bleeding", "elderly", "infant", "prolonged_deprivation"]
        {
            assert!(labels.contains(&expected), "missing label {expected}");
        }

        assert!(result.resource_types.iter().any(|t| t == "Water"));
        assert!(result.confidence >= 0.7, "confidence {}", result.confidence);
    }

    #[test]
    fn test_confidence_formula() {
        // No signals, no resource match: (0.3 + 0.4) / 2
        let result = classify_request("xyzzy", Severity::Medium);
        assert_eq!(result.confidence, 0.35);
    }
}
