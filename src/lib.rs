//! ReliefNet: Disaster-Event Ingestion & Triage Intelligence
//!
//! Multi-source pipeline for emergency-response coordination.
//!
//! ## Architecture
//!
//! - **Ingestion**: five feed adapters (geophysical, humanitarian RSS,
//!   satellite hotspot, weather, social SOS) polled on independent
//!   schedules, with deterministic dedup and mock fallback
//! - **Cascade**: qualifying events auto-create disasters, drive the three
//!   serving models, and dispatch severity-gated alerts
//! - **Allocation**: constraint-based matching of depot resources to
//!   disaster-zone needs
//! - **NLP Triage**: rule-driven classification and priority escalation of
//!   victim requests, plus a guided intake chatbot
//! - **Anomaly Detection**: periodic isolation-forest detection over
//!   rolling operational metrics

pub mod allocation;
pub mod anomaly;
pub mod background;
pub mod config;
pub mod geo;
pub mod ingestion;
pub mod nlp;
pub mod predict;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use types::{
    AlertNotification, AnomalyAlert, AnomalyType, Disaster, DisasterStatus, DisasterType,
    EventType, IngestedEvent, Location, Prediction, PredictionType, Resource, ResourceRequest,
    SatelliteObservation, Severity, SourceName, SourceRegistry, WeatherObservation,
};

// Re-export the main service entry points
pub use allocation::AllocationEngine;
pub use anomaly::AnomalyDetector;
pub use ingestion::{AlertDispatcher, IngestionOrchestrator};
pub use nlp::{Chatbot, ClassificationResult};
pub use predict::PredictionClient;
pub use store::StoreGateway;
