//! NLP triage engine and victim-intake chatbot
//!
//! Rule-based classification of victim request text into resource
//! categories, urgency-signal extraction with priority escalation, and a
//! guided multi-turn conversation that yields a structured request.
//! Fully offline by design — a victim-facing intake path cannot depend on
//! an external inference service being reachable mid-disaster.

pub mod chatbot;
pub mod engine;
pub mod rules;

pub use chatbot::{Chatbot, ChatSession, ChatTurn, ConvState, InMemorySessionStore, SessionStore};
pub use engine::{
    classify_request, classify_resource_type, escalate_priority, estimate_quantity,
    extract_urgency_signals, ClassificationResult, UrgencySignal,
};
