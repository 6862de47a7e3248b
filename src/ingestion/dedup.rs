//! Batch deduplication against existing external ids
//!
//! The sole write path for ingested events and satellite observations.
//! Candidate external ids are checked against the store in chunks, and
//! only unseen rows are bulk-inserted, which makes every poll idempotent:
//! re-running the same batch persists nothing new.

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::store::{Filter, Query, StoreGateway, StoreError};
use crate::types::{new_id, IngestedEvent, SatelliteObservation};

use super::NormalizedEvent;

/// Lookup chunk size for existing-id queries.
const LOOKUP_CHUNK: usize = 100;

/// Insert batch size for satellite hotspots.
const HOTSPOT_INSERT_CHUNK: usize = 500;

/// Filters candidate batches against existing `external_id`s and inserts
/// the remainder.
#[derive(Clone)]
pub struct Deduplicator {
    store: StoreGateway,
}

impl Deduplicator {
    pub fn new(store: StoreGateway) -> Self {
        Self { store }
    }

    /// Persist the unseen events of a candidate batch.
    ///
    /// Returns the newly inserted rows in batch order.
    pub fn store_events(
        &self,
        source_id: &str,
        candidates: Vec<NormalizedEvent>,
    ) -> Result<Vec<IngestedEvent>, StoreError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let events = self.store.collection::<IngestedEvent>()?;
        let external_ids: Vec<String> =
            candidates.iter().map(|c| c.external_id.clone()).collect();
        let existing = self.existing_ids::<IngestedEvent>(&external_ids)?;

        let now = Utc::now();
        let new_rows: Vec<IngestedEvent> = candidates
            .into_iter()
            .filter(|c| !existing.contains(&c.external_id))
            .map(|c| IngestedEvent {
                id: new_id(),
                source_id: source_id.to_string(),
                external_id: c.external_id,
                event_type: c.event_type,
                title: c.title,
                description: c.description,
                severity: c.severity,
                latitude: c.latitude,
                longitude: c.longitude,
                location_name: c.location_name,
                raw_payload: c.raw_payload,
                ingested_at: now,
                processed: false,
                processed_at: None,
                disaster_id: None,
                prediction_ids: Vec::new(),
            })
            .collect();

        events.insert_batch(&new_rows)?;
        debug!(
            candidates = external_ids.len(),
            inserted = new_rows.len(),
            "Event batch deduplicated"
        );
        Ok(new_rows)
    }

    /// Persist the unseen hotspots of a candidate batch, inserting in
    /// chunks of 500.
    pub fn store_hotspots(
        &self,
        candidates: Vec<SatelliteObservation>,
    ) -> Result<Vec<SatelliteObservation>, StoreError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let observations = self.store.collection::<SatelliteObservation>()?;
        let external_ids: Vec<String> =
            candidates.iter().map(|c| c.external_id.clone()).collect();
        let existing = self.existing_ids::<SatelliteObservation>(&external_ids)?;

        let new_rows: Vec<SatelliteObservation> = candidates
            .into_iter()
            .filter(|c| !existing.contains(&c.external_id))
            .collect();

        for chunk in new_rows.chunks(HOTSPOT_INSERT_CHUNK) {
            observations.insert_batch(chunk)?;
        }
        debug!(
            candidates = external_ids.len(),
            inserted = new_rows.len(),
            "Hotspot batch deduplicated"
        );
        Ok(new_rows)
    }

    /// Which of the given external ids already exist, queried in chunks
    /// of at most 100.
    fn existing_ids<T: crate::store::Document>(
        &self,
        external_ids: &[String],
    ) -> Result<std::collections::HashSet<String>, StoreError> {
        let collection = self.store.collection::<T>()?;
        let mut existing = std::collections::HashSet::new();

        for chunk in external_ids.chunks(LOOKUP_CHUNK) {
            let values: Vec<Value> = chunk.iter().map(|id| Value::from(id.as_str())).collect();
            let query = Query::new().filter(Filter::is_in("external_id", values));
            // Only the external_id field is needed; rows are small enough
            // that a typed read keeps the gateway surface minimal.
            for row in collection.find(&query)? {
                let value = serde_json::to_value(&row)?;
                if let Some(ext) = value.get("external_id").and_then(Value::as_str) {
                    existing.insert(ext.to_string());
                }
            }
        }
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventType, Severity};
    use serde_json::json;

    fn candidate(external_id: &str) -> NormalizedEvent {
        NormalizedEvent {
            external_id: external_id.into(),
            event_type: EventType::Earthquake,
            title: "M5.0 - test".into(),
            description: String::new(),
            severity: Severity::Medium,
            latitude: Some(1.0),
            longitude: Some(2.0),
            location_name: None,
            raw_payload: json!({}),
        }
    }

    #[test]
    fn test_idempotent_event_storage() {
        let store = StoreGateway::open_temporary().unwrap();
        let dedup = Deduplicator::new(store.clone());

        let first = dedup
            .store_events("src", vec![candidate("usgs-a"), candidate("usgs-b")])
            .unwrap();
        assert_eq!(first.len(), 2);

        // Same batch again: nothing inserted
        let second = dedup
            .store_events("src", vec![candidate("usgs-a"), candidate("usgs-b")])
            .unwrap();
        assert!(second.is_empty());

        let total = store
            .collection::<IngestedEvent>()
            .unwrap()
            .count(&Filter::All)
            .unwrap();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_partial_overlap() {
        let store = StoreGateway::open_temporary().unwrap();
        let dedup = Deduplicator::new(store.clone());

        dedup.store_events("src", vec![candidate("usgs-a")]).unwrap();
        let second = dedup
            .store_events("src", vec![candidate("usgs-a"), candidate("usgs-c")])
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].external_id, "usgs-c");
    }

    #[test]
    fn test_large_batch_chunked_lookup() {
        let store = StoreGateway::open_temporary().unwrap();
        let dedup = Deduplicator::new(store.clone());

        // 250 candidates forces three lookup chunks
        let batch: Vec<_> = (0..250).map(|i| candidate(&format!("usgs-{i}"))).collect();
        let inserted = dedup.store_events("src", batch.clone()).unwrap();
        assert_eq!(inserted.len(), 250);

        let again = dedup.store_events("src", batch).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_hotspot_dedup() {
        let store = StoreGateway::open_temporary().unwrap();
        let dedup = Deduplicator::new(store.clone());
        let generator = super::super::mock::MockGenerator::new(9);

        let hotspots = generator.fire_hotspots(Some(10));
        let inserted = dedup.store_hotspots(hotspots.clone()).unwrap();
        assert_eq!(inserted.len(), 10);

        let again = dedup.store_hotspots(hotspots).unwrap();
        assert!(again.is_empty());
    }
}
