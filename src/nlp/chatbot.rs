//! Guided victim-intake conversation engine
//!
//! Multi-turn state machine over the triage engine that walks a victim
//! through structured request creation. Sessions live behind a
//! [`SessionStore`] trait with an in-memory default so a shared store can
//! be swapped in for multi-process deployments.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{new_id, Severity};

use super::engine::{
    classify_request, classify_resource_type, escalate_priority, estimate_quantity,
    extract_urgency_signals, UrgencySignal,
};

// ============================================================================
// Conversation states
// ============================================================================

/// Conversation position. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConvState {
    Greeting,
    AskSituation,
    AskResource,
    AskQuantity,
    AskLocation,
    AskPeople,
    AskMedical,
    Confirm,
    Submitted,
}

// ============================================================================
// Session data
// ============================================================================

/// One message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "user" | "assistant"
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Progressively built request data from the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtractedData {
    pub situation_description: String,
    pub resource_types: Vec<String>,
    pub resource_type_scores: Vec<(String, f64)>,
    pub quantity: u32,
    pub location: String,
    pub people_count: u32,
    pub has_medical_needs: bool,
    pub medical_details: String,
    pub urgency_signals: Vec<UrgencySignal>,
    pub recommended_priority: Option<Severity>,
    pub priority_escalated: bool,
    pub confidence: f64,
    pub raw_messages: Vec<String>,
}

/// A live conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub state: ConvState,
    pub messages: Vec<ChatMessage>,
    pub extracted: ExtractedData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    fn new(session_id: String) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            state: ConvState::Greeting,
            messages: Vec::new(),
            extracted: ExtractedData {
                quantity: 1,
                people_count: 1,
                ..ExtractedData::default()
            },
            created_at: now,
            updated_at: now,
        }
    }
}

/// One turn's output: assistant reply plus metadata about what changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub session_id: String,
    pub message: String,
    pub state: ConvState,
    pub extracted_data: ExtractedData,
    /// True exactly once, on the turn that submits the request.
    pub submitted: bool,
}

// ============================================================================
// Session store
// ============================================================================

/// Where live sessions are kept. The default is process-local; replace
/// with a shared implementation when running multiple instances.
pub trait SessionStore: Send + Sync {
    fn load(&self, session_id: &str) -> Option<ChatSession>;
    fn save(&self, session: ChatSession);
    fn delete(&self, session_id: &str) -> bool;
}

/// In-memory session store keyed by session id.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, ChatSession>>,
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, session_id: &str) -> Option<ChatSession> {
        self.sessions
            .read()
            .ok()
            .and_then(|map| map.get(session_id).cloned())
    }

    fn save(&self, session: ChatSession) {
        if let Ok(mut map) = self.sessions.write() {
            map.insert(session.session_id.clone(), session);
        }
    }

    fn delete(&self, session_id: &str) -> bool {
        self.sessions
            .write()
            .map(|mut map| map.remove(session_id).is_some())
            .unwrap_or(false)
    }
}

// ============================================================================
// Response templates
// ============================================================================

const GREETING_MSG: &str = "Hello! I'm here to help you request emergency resources. \
    I'll guide you through a few quick questions so we can get help to you as fast as possible.\n\n\
    Can you describe your current situation? For example: what happened, what do you need most urgently?";

const RESOURCE_ASK: &str = "I wasn't able to determine the type of resource you need. \
    Could you tell me what you need most? For example:\n\
    - Food\n- Water\n- Medical supplies\n- Shelter\n- Clothing\n- Evacuation\n- Volunteers\n- Financial aid";

const LOCATION_ASK: &str = "Where are you located? Please provide as much detail as possible — \
    address, neighborhood, landmark, or GPS coordinates if you have them.";

const PEOPLE_ASK: &str = "How many people are with you who need help? \
    Are there any children, elderly, or people with disabilities in your group?";

const MEDICAL_ASK: &str = "Does anyone in your group have medical needs or injuries that require \
    attention? If yes, please describe briefly.";

const SUBMITTED_MSG: &str = "Your request has been submitted successfully! \
    A coordinator will review it shortly. Your reference information has been saved.\n\n\
    If your situation changes, you can start a new conversation. Stay safe!";

// ============================================================================
// Yes/no/number detection
// ============================================================================

static YES_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^(yes|yeah|yep|yup|correct|sure|ok|okay|y|confirm|right|that'?s? (right|correct))[.!\s]*$")
        .expect("static pattern must compile")
});

static NO_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^(no|nah|nope|wrong|incorrect|n|not really|start over|reset)[.!\s]*$")
        .expect("static pattern must compile")
});

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\b(\d+)\b").expect("static pattern must compile")
});

static PEOPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"(\d+)\s*(people|persons?|family members?|of us)").expect("static pattern must compile")
});

static MEDICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\b(injur|wound|bleed|fracture|medic|sick|fever|pain|diabet|asthma|chronic|surgery|pregnant|disability)\b")
        .expect("static pattern must compile")
});

fn detect_yes(text: &str) -> bool {
    YES_RE.is_match(text.trim().to_lowercase().as_str())
}

fn detect_no(text: &str) -> bool {
    NO_RE.is_match(text.trim().to_lowercase().as_str())
}

fn extract_number(text: &str) -> Option<u32> {
    NUMBER_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn detect_medical(text: &str) -> bool {
    MEDICAL_RE.is_match(text.to_lowercase().as_str())
}

/// Free-text resource names accepted at the resource step.
const DIRECT_RESOURCE_MAP: &[(&str, &str)] = &[
    ("food", "Food"),
    ("water", "Water"),
    ("medical", "Medical"),
    ("shelter", "Shelter"),
    ("clothing", "Clothing"),
    ("clothes", "Clothing"),
    ("evacuation", "Evacuation"),
    ("volunteers", "Volunteers"),
    ("financial", "Financial Aid"),
    ("money", "Financial Aid"),
];

// ============================================================================
// Conversation engine
// ============================================================================

/// The chatbot over a session store.
pub struct Chatbot<S: SessionStore> {
    store: S,
}

impl Default for Chatbot<InMemorySessionStore> {
    fn default() -> Self {
        Self::new(InMemorySessionStore::default())
    }
}

impl<S: SessionStore> Chatbot<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Drop a session; used by external handlers on abandonment.
    pub fn delete_session(&self, session_id: &str) -> bool {
        self.store.delete(session_id)
    }

    /// Return the extracted data for a session, if it exists.
    pub fn session_data(&self, session_id: &str) -> Option<ExtractedData> {
        self.store.load(session_id).map(|s| s.extracted)
    }

    /// Process one user message; creates the session on first contact.
    pub fn process_message(&self, session_id: Option<&str>, user_message: &str) -> ChatTurn {
        let mut session = session_id
            .and_then(|id| self.store.load(id))
            .unwrap_or_else(|| ChatSession::new(session_id.map(String::from).unwrap_or_else(new_id)));

        session.updated_at = Utc::now();
        session.messages.push(ChatMessage {
            role: "user".into(),
            content: user_message.to_string(),
            timestamp: Utc::now(),
        });
        session.extracted.raw_messages.push(user_message.to_string());

        let (reply, submitted) = handle_state(&mut session, user_message);

        session.messages.push(ChatMessage {
            role: "assistant".into(),
            content: reply.clone(),
            timestamp: Utc::now(),
        });

        let turn = ChatTurn {
            session_id: session.session_id.clone(),
            message: reply,
            state: session.state,
            extracted_data: session.extracted.clone(),
            submitted,
        };
        self.store.save(session);
        turn
    }
}

/// Route user input through the state machine. Returns (reply, submitted).
fn handle_state(session: &mut ChatSession, input: &str) -> (String, bool) {
    match session.state {
        ConvState::Greeting => {
            session.state = ConvState::AskSituation;
            (GREETING_MSG.to_string(), false)
        }
        ConvState::AskSituation => (handle_situation(session, input), false),
        ConvState::AskResource => (handle_resource(session, input), false),
        ConvState::AskQuantity => (handle_quantity(session, input), false),
        ConvState::AskLocation => (handle_location(session, input), false),
        ConvState::AskPeople => (handle_people(session, input), false),
        ConvState::AskMedical => (handle_medical(session, input), false),
        ConvState::Confirm => handle_confirm(session, input),
        ConvState::Submitted => (
            "Your request has already been submitted. Start a new conversation if you need \
             additional help."
                .to_string(),
            false,
        ),
    }
}

fn handle_situation(session: &mut ChatSession, text: &str) -> String {
    session.extracted.situation_description = text.to_string();

    // Run the full pipeline over everything said so far
    let full_text = session.extracted.raw_messages.join(" ");
    let classification = classify_request(&full_text, Severity::Medium);

    session.extracted.urgency_signals = classification.urgency_signals.clone();
    session.extracted.recommended_priority = Some(classification.recommended_priority);
    session.extracted.priority_escalated = classification.priority_was_escalated;
    session.extracted.confidence = classification.confidence;
    session.extracted.resource_types = classification.resource_types.clone();
    session.extracted.resource_type_scores = classification.resource_type_scores;

    let qty = estimate_quantity(text);
    if qty > 1 {
        session.extracted.quantity = qty;
    }

    session.state = ConvState::AskResource;
    if classification.resource_types.is_empty()
        || classification.resource_types == ["Custom".to_string()]
    {
        RESOURCE_ASK.to_string()
    } else {
        let types: Vec<&str> = classification
            .resource_types
            .iter()
            .take(3)
            .map(String::as_str)
            .collect();
        format!(
            "Based on what you've told me, it sounds like you need: {}.\n\n\
             Is that correct? If you need something different or additional, just let me know. \
             Otherwise, say yes to continue.",
            types.join(", ")
        )
    }
}

fn quantity_ask(resource: &str) -> String {
    format!(
        "How many {resource} units/items do you need? And for how many people? \
         (e.g., '5 water bottles for 3 people')"
    )
}

fn handle_resource(session: &mut ChatSession, text: &str) -> String {
    if detect_yes(text) && !session.extracted.resource_types.is_empty() {
        let primary = session.extracted.resource_types[0].clone();
        session.state = ConvState::AskQuantity;
        return quantity_ask(&primary);
    }

    // A correction or an entirely new resource description
    let (types, scores) = classify_resource_type(text);
    if types != ["Custom".to_string()] {
        let shown: Vec<&str> = types.iter().take(3).map(String::as_str).collect();
        let primary = types[0].clone();
        session.extracted.resource_types = types.clone();
        session.extracted.resource_type_scores = scores;
        session.state = ConvState::AskQuantity;
        return format!(
            "Got it — I've updated your request to {}.\n\n{}",
            shown.join(", "),
            quantity_ask(&primary)
        );
    }

    // Map canonical free-text names directly
    let text_lower = text.trim().to_lowercase();
    for (key, rtype) in DIRECT_RESOURCE_MAP {
        if text_lower.contains(key) {
            session.extracted.resource_types = vec![(*rtype).to_string()];
            session.extracted.resource_type_scores = vec![((*rtype).to_string(), 0.8)];
            session.state = ConvState::AskQuantity;
            return format!("Got it — {rtype}.\n\n{}", quantity_ask(rtype));
        }
    }

    "I'm not sure what resource type that is. Could you pick one from this list?\n\n\
     - Food\n- Water\n- Medical\n- Shelter\n- Clothing\n- Evacuation\n- Volunteers\n- Financial Aid"
        .to_string()
}

fn handle_quantity(session: &mut ChatSession, text: &str) -> String {
    if let Some(qty) = extract_number(text) {
        session.extracted.quantity = qty.min(9_999);
    }

    // The quantity answer often carries the people count too
    if let Some(caps) = PEOPLE_RE.captures(text.to_lowercase().as_str()) {
        if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
            session.extracted.people_count = n;
        }
    }

    session.state = ConvState::AskLocation;
    LOCATION_ASK.to_string()
}

fn handle_location(session: &mut ChatSession, text: &str) -> String {
    session.extracted.location = text.trim().to_string();
    session.state = ConvState::AskPeople;
    PEOPLE_ASK.to_string()
}

fn handle_people(session: &mut ChatSession, text: &str) -> String {
    if let Some(n) = extract_number(text) {
        session.extracted.people_count = n;
    }

    // Vulnerabilities mentioned here may escalate priority further
    let signals = extract_urgency_signals(text);
    if !signals.is_empty() {
        session.extracted.urgency_signals.extend(signals);
        reescalate(session);
    }

    // Skip the medical question if this answer already covered it
    if detect_medical(text) {
        session.extracted.has_medical_needs = true;
        session.extracted.medical_details = text.to_string();
        session.state = ConvState::Confirm;
        return build_confirmation(session);
    }

    session.state = ConvState::AskMedical;
    MEDICAL_ASK.to_string()
}

fn handle_medical(session: &mut ChatSession, text: &str) -> String {
    if detect_no(text) {
        session.extracted.has_medical_needs = false;
    } else {
        session.extracted.has_medical_needs = true;
        session.extracted.medical_details = text.to_string();

        let signals = extract_urgency_signals(text);
        if !signals.is_empty() {
            session.extracted.urgency_signals.extend(signals);
            reescalate(session);
        }
    }

    session.state = ConvState::Confirm;
    build_confirmation(session)
}

/// Re-run escalation over the accumulated signal set.
fn reescalate(session: &mut ChatSession) {
    let (priority, escalated) =
        escalate_priority(Severity::Medium, &session.extracted.urgency_signals);
    session.extracted.recommended_priority = Some(priority);
    session.extracted.priority_escalated = escalated;
}

fn build_confirmation(session: &ChatSession) -> String {
    let d = &session.extracted;
    let resource = if d.resource_types.is_empty() {
        "Not determined".to_string()
    } else {
        d.resource_types.join(", ")
    };
    let medical = if d.has_medical_needs {
        d.medical_details.as_str()
    } else {
        "None reported"
    };
    let mut priority = d
        .recommended_priority
        .unwrap_or(Severity::Medium)
        .to_string()
        .to_uppercase();
    if d.priority_escalated {
        priority.push_str(" (auto-escalated due to urgency signals)");
    }
    let situation: String = d.situation_description.chars().take(200).collect();

    format!(
        "Here's a summary of your request:\n\n\
         Situation: {}\n\
         Resource needed: {}\n\
         Quantity: {}\n\
         People: {}\n\
         Location: {}\n\
         Medical needs: {}\n\
         Priority: {}\n\n\
         Does this look correct? Say yes to submit or no to start over.",
        if situation.is_empty() { "Not provided" } else { situation.as_str() },
        resource,
        d.quantity,
        d.people_count,
        if d.location.is_empty() { "Not provided" } else { d.location.as_str() },
        medical,
        priority,
    )
}

fn handle_confirm(session: &mut ChatSession, text: &str) -> (String, bool) {
    if detect_yes(text) {
        session.state = ConvState::Submitted;
        (SUBMITTED_MSG.to_string(), true)
    } else if detect_no(text) {
        session.state = ConvState::AskSituation;
        session.extracted = ExtractedData {
            quantity: 1,
            people_count: 1,
            ..ExtractedData::default()
        };
        (
            "No problem! Let's start over.\n\nCan you describe your current situation? \
             What happened and what do you need?"
                .to_string(),
            false,
        )
    } else {
        (
            "Please confirm by saying yes to submit your request, or no to start over."
                .to_string(),
            false,
        )
    }
}
