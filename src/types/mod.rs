//! Shared data structures for the disaster ingestion and triage pipeline
//!
//! This module defines the core types flowing through the system:
//! - Ingestion: IngestedEvent, SourceRegistry, SatelliteObservation, WeatherObservation
//! - Canonical records: Disaster, Location
//! - Downstream: Prediction, AlertNotification, AnomalyAlert
//! - Resources: Resource, Allocation, ResourceRequest

mod event;
mod disaster;
mod observation;
mod prediction;
mod alert;
mod resource;

pub use event::*;
pub use disaster::*;
pub use observation::*;
pub use prediction::*;
pub use alert::*;
pub use resource::*;

/// Generate a fresh 32-hex-char row id.
///
/// Ids only need to be unique within one store; collision probability is
/// negligible at the row volumes this system handles.
pub fn new_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_shape() {
        let id = new_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_new_id_unique() {
        assert_ne!(new_id(), new_id());
    }
}
