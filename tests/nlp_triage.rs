//! NLP Triage Regression Tests
//!
//! The compound-emergency escalation scenario, label-set containment,
//! escalation monotonicity, and chatbot termination behavior.

use reliefnet::nlp::rules::known_labels;
use reliefnet::nlp::{
    classify_request, escalate_priority, extract_urgency_signals, Chatbot, ConvState,
};
use reliefnet::types::Severity;

/// S5: compound emergency escalates medium → critical with the expected
/// signal labels and resource types.
#[test]
fn compound_emergency_escalates_to_critical() {
    let text = "elderly woman trapped in collapsed building, heavy bleeding, infant present, \
                no water for 3 days";
    let result = classify_request(text, Severity::Medium);

    assert_eq!(result.recommended_priority, Severity::Critical);
    assert!(result.priority_was_escalated);
    assert_eq!(result.original_priority, Some(Severity::Medium));

    let labels: Vec<&str> = result
        .urgency_signals
        .iter()
        .map(|s| s.label.as_str())
        .collect();
    for expected in [
        "trapped",
        "severe_bleeding",
        "elderly",
        "infant",
        "prolonged_deprivation",
    ] {
        assert!(labels.contains(&expected), "missing signal {expected}");
    }

    assert!(result.resource_types.iter().any(|t| t == "Water"));
    assert!(
        result
            .resource_types
            .iter()
            .any(|t| t == "Medical" || t == "Shelter"),
        "expected Medical or Shelter in {:?}",
        result.resource_types
    );
    assert!(result.confidence >= 0.7, "confidence {}", result.confidence);
}

/// Signal labels always come from the configured rule set, deduplicated.
#[test]
fn signal_labels_subset_of_rule_labels() {
    let corpus = [
        "family of 6 trapped, baby not breathing, no food for 2 days",
        "diabetic grandmother needs insulin, wheelchair user stranded",
        "50 people stranded, children present, water running out",
        "nothing urgent here at all",
        "",
    ];
    let labels = known_labels();
    for text in corpus {
        let result = classify_request(text, Severity::Low);
        let mut seen = Vec::new();
        for signal in &result.urgency_signals {
            assert!(
                labels.contains(&signal.label.as_str()),
                "unknown label {} for {text:?}",
                signal.label
            );
            assert!(
                !seen.contains(&signal.label),
                "duplicate label {} for {text:?}",
                signal.label
            );
            seen.push(signal.label.clone());
        }
    }
}

/// Escalation is monotone in the signal set, and critical is a fixed
/// point.
#[test]
fn escalation_monotonicity() {
    let weak = extract_urgency_signals("children present nearby");
    let strong = extract_urgency_signals("children present nearby, one person trapped");

    for base in [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ] {
        let (p_weak, _) = escalate_priority(base, &weak);
        let (p_strong, _) = escalate_priority(base, &strong);
        assert!(p_strong >= p_weak, "not monotone from {base}");

        let (p_critical, escalated) = escalate_priority(Severity::Critical, &strong);
        assert_eq!(p_critical, Severity::Critical);
        assert!(!escalated);
    }
}

/// Happy-path conversation reaches submitted within the state budget;
/// confirm-negative resets to the situation question.
#[test]
fn chatbot_terminates_or_resets() {
    let bot = Chatbot::default();

    // Greeting turn opens the conversation
    let turn = bot.process_message(None, "hello");
    let id = turn.session_id.clone();
    assert_eq!(turn.state, ConvState::AskSituation);

    // Drive with arbitrary answers; the machine must reach confirm in at
    // most 6 further turns (situation, resource, quantity, location,
    // people, medical)
    let mut state = turn.state;
    for i in 0..6 {
        if state == ConvState::Confirm {
            break;
        }
        let turn = bot.process_message(Some(&id), &format!("water for {} people", i + 2));
        state = turn.state;
    }
    assert_eq!(state, ConvState::Confirm);

    // Negative confirm resets with cleared data
    let turn = bot.process_message(Some(&id), "no");
    assert_eq!(turn.state, ConvState::AskSituation);
    assert!(turn.extracted_data.situation_description.is_empty());

    // Walk again and submit
    bot.process_message(Some(&id), "flood, we need clean water");
    bot.process_message(Some(&id), "yes");
    bot.process_message(Some(&id), "10 bottles for 4 people");
    bot.process_message(Some(&id), "river road 5");
    bot.process_message(Some(&id), "4 of us");
    let turn = bot.process_message(Some(&id), "no medical needs");
    // Free-text medical answer counts as details, still reaches confirm
    assert_eq!(turn.state, ConvState::Confirm);

    let turn = bot.process_message(Some(&id), "yes");
    assert_eq!(turn.state, ConvState::Submitted);
    assert!(turn.submitted);

    // Terminal state stays terminal
    let turn = bot.process_message(Some(&id), "anything else");
    assert_eq!(turn.state, ConvState::Submitted);
    assert!(!turn.submitted);
}

/// Quantity heuristics: contextual patterns, max-wins, cap.
#[test]
fn quantity_estimation_rules() {
    use reliefnet::nlp::estimate_quantity;

    assert_eq!(estimate_quantity("5 bottles for family of 3"), 5);
    assert_eq!(estimate_quantity("family of 8, need 2 tents"), 8);
    assert_eq!(estimate_quantity("we need 99999 liters"), 9_999);
    assert_eq!(estimate_quantity("some water please"), 1);
}
