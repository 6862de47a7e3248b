//! Store Gateway — typed, filtered reads/writes against the embedded store
//!
//! Wraps one sled database; each record family lives in its own tree as
//! JSON rows. Collections enforce their primary key; idempotency across
//! polls is the deduplicator's responsibility via `external_id`.

mod collection;
mod filter;

pub use collection::{Collection, Document};
pub use filter::{Direction, Filter, Query};

use std::path::Path;
use std::sync::Arc;

use crate::types::{
    AlertNotification, Allocation, AnomalyAlert, Contact, Disaster, IngestedEvent, Location,
    Prediction, Resource, ResourceRequest, SatelliteObservation, SituationReport, SourceRegistry,
    WeatherObservation,
};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Shared handle to the document store.
///
/// Cheap to clone; all mutation in the system goes through this gateway.
#[derive(Clone)]
pub struct StoreGateway {
    db: Arc<sled::Db>,
}

impl StoreGateway {
    /// Open or create the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Open an in-memory store (tests).
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Typed handle for a document collection.
    pub fn collection<T: Document>(&self) -> Result<Collection<T>, StoreError> {
        let tree = self.db.open_tree(T::COLLECTION)?;
        Ok(Collection::new(tree))
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Store size on disk in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.db.size_on_disk().unwrap_or(0)
    }
}

// ============================================================================
// Collection bindings
// ============================================================================

macro_rules! document {
    ($ty:ty, $name:literal) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $name;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

document!(IngestedEvent, "ingested_events");
document!(SourceRegistry, "external_data_sources");
document!(Disaster, "disasters");
document!(Location, "locations");
document!(SatelliteObservation, "satellite_observations");
document!(WeatherObservation, "weather_observations");
document!(Prediction, "predictions");
document!(AlertNotification, "alert_notifications");
document!(Contact, "users");
document!(Resource, "resources");
document!(Allocation, "allocations");
document!(ResourceRequest, "resource_requests");
document!(AnomalyAlert, "anomaly_alerts");
document!(SituationReport, "situation_reports");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{new_id, EventType, Severity};
    use chrono::Utc;

    fn make_event(external_id: &str, severity: Severity) -> IngestedEvent {
        IngestedEvent {
            id: new_id(),
            source_id: "src-1".into(),
            external_id: external_id.into(),
            event_type: EventType::Earthquake,
            title: format!("M6.4 - {external_id}"),
            description: String::new(),
            severity,
            latitude: Some(35.1),
            longitude: Some(139.7),
            location_name: Some("Offshore X".into()),
            raw_payload: serde_json::json!({}),
            ingested_at: Utc::now(),
            processed: false,
            processed_at: None,
            disaster_id: None,
            prediction_ids: Vec::new(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = StoreGateway::open_temporary().unwrap();
        let events = store.collection::<IngestedEvent>().unwrap();
        let ev = make_event("usgs-a", Severity::High);
        events.insert(&ev).unwrap();
        let got = events.get(&ev.id).unwrap().unwrap();
        assert_eq!(got.external_id, "usgs-a");
    }

    #[test]
    fn test_filtered_find_with_order_and_limit() {
        let store = StoreGateway::open_temporary().unwrap();
        let events = store.collection::<IngestedEvent>().unwrap();
        for (i, sev) in [Severity::Low, Severity::High, Severity::High].iter().enumerate() {
            events.insert(&make_event(&format!("usgs-{i}"), *sev)).unwrap();
        }
        let query = Query::new()
            .filter(Filter::eq("severity", "high"))
            .order_asc("external_id")
            .limit(10);
        let found = events.find(&query).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].external_id, "usgs-1");
    }

    #[test]
    fn test_maybe_single() {
        let store = StoreGateway::open_temporary().unwrap();
        let events = store.collection::<IngestedEvent>().unwrap();
        assert!(events
            .maybe_single(&Query::new().filter(Filter::eq("external_id", "usgs-x")))
            .unwrap()
            .is_none());
        events.insert(&make_event("usgs-x", Severity::Low)).unwrap();
        let got = events
            .maybe_single(&Query::new().filter(Filter::eq("external_id", "usgs-x")))
            .unwrap();
        assert!(got.is_some());
    }

    #[test]
    fn test_update_where() {
        let store = StoreGateway::open_temporary().unwrap();
        let events = store.collection::<IngestedEvent>().unwrap();
        let ev = make_event("usgs-u", Severity::Medium);
        events.insert(&ev).unwrap();

        let updated = events
            .update_where(&Filter::eq("external_id", "usgs-u"), |row| {
                row.processed = true;
                row.disaster_id = Some("d-1".into());
            })
            .unwrap();
        assert_eq!(updated, 1);

        let got = events.get(&ev.id).unwrap().unwrap();
        assert!(got.processed);
        assert_eq!(got.disaster_id.as_deref(), Some("d-1"));
    }

    #[test]
    fn test_count() {
        let store = StoreGateway::open_temporary().unwrap();
        let events = store.collection::<IngestedEvent>().unwrap();
        for i in 0..5 {
            events.insert(&make_event(&format!("usgs-{i}"), Severity::Low)).unwrap();
        }
        assert_eq!(events.count(&Filter::All).unwrap(), 5);
        assert_eq!(events.count(&Filter::eq("severity", "low")).unwrap(), 5);
        assert_eq!(events.count(&Filter::eq("severity", "high")).unwrap(), 0);
    }

    #[test]
    fn test_batch_insert() {
        let store = StoreGateway::open_temporary().unwrap();
        let events = store.collection::<IngestedEvent>().unwrap();
        let batch: Vec<_> = (0..100)
            .map(|i| make_event(&format!("usgs-{i}"), Severity::Medium))
            .collect();
        events.insert_batch(&batch).unwrap();
        assert_eq!(events.count(&Filter::All).unwrap(), 100);
    }

    #[test]
    fn test_rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let ev = make_event("usgs-persisted", Severity::Critical);
        {
            let store = StoreGateway::open(dir.path()).unwrap();
            store.collection::<IngestedEvent>().unwrap().insert(&ev).unwrap();
            store.flush().unwrap();
        }
        let store = StoreGateway::open(dir.path()).unwrap();
        let got = store
            .collection::<IngestedEvent>()
            .unwrap()
            .get(&ev.id)
            .unwrap()
            .unwrap();
        assert_eq!(got.external_id, "usgs-persisted");
        assert_eq!(got.severity, Severity::Critical);
    }

    #[test]
    fn test_coordinate_window_query() {
        let store = StoreGateway::open_temporary().unwrap();
        let locations = store.collection::<Location>().unwrap();
        locations
            .insert(&Location {
                id: new_id(),
                name: "Tokyo".into(),
                latitude: 35.67,
                longitude: 139.65,
                city: "Tokyo".into(),
                state: "Tokyo".into(),
                country: "Japan".into(),
                created_at: Utc::now(),
            })
            .unwrap();

        // Within ±0.5° of (35.1, 139.7) — one hit
        let query = Query::new().filter(Filter::and(vec![
            Filter::gte("latitude", 35.1 - 0.5),
            Filter::lte("latitude", 35.1 + 0.5),
            Filter::gte("longitude", 139.7 - 0.5),
            Filter::lte("longitude", 139.7 + 0.5),
        ]));
        assert_eq!(locations.find(&query).unwrap().len(), 1);

        // Far away — no hit
        let query = Query::new().filter(Filter::and(vec![
            Filter::gte("latitude", -10.5),
            Filter::lte("latitude", -9.5),
        ]));
        assert!(locations.find(&query).unwrap().is_empty());
    }
}
