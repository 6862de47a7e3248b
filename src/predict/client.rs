//! Prediction client — fixed-order model invocation and persistence
//!
//! For each qualifying event the client assembles features, invokes the
//! severity, spread, and impact models in that order, and writes one
//! Prediction row per model. A failure in one step never aborts the
//! others; the cascade continues with whatever ids were produced.

use chrono::Utc;
use tracing::{error, info};

use crate::store::StoreGateway;
use crate::types::{
    new_id, Disaster, IngestedEvent, Prediction, PredictionType, WeatherFeatures,
};

use super::features::{impact_features, severity_features, spread_features};
use super::models::ModelRegistry;

/// Client over the model registry and store.
pub struct PredictionClient {
    store: StoreGateway,
    registry: ModelRegistry,
}

impl PredictionClient {
    pub fn new(store: StoreGateway) -> Self {
        Self {
            store,
            registry: ModelRegistry::default(),
        }
    }

    pub fn with_registry(store: StoreGateway, registry: ModelRegistry) -> Self {
        Self { store, registry }
    }

    /// Run severity → spread → impact for one event and persist each
    /// prediction. Returns the ids of the rows actually written.
    pub fn run_batch(
        &self,
        event: &IngestedEvent,
        disaster: &Disaster,
        weather: &WeatherFeatures,
    ) -> Vec<String> {
        let mut prediction_ids = Vec::with_capacity(3);
        let magnitude = event
            .raw_payload
            .get("magnitude")
            .and_then(serde_json::Value::as_f64);

        // 1. Severity
        let features = severity_features(weather, disaster.disaster_type);
        let output = self.registry.severity.predict(&features);
        let row = Prediction {
            id: new_id(),
            disaster_id: disaster.id.clone(),
            location_id: disaster.location_id.clone(),
            prediction_type: PredictionType::Severity,
            features: features.to_value(),
            confidence_score: clamp_unit(output.confidence),
            predicted_severity: Some(output.predicted_severity),
            predicted_area_km2: None,
            ci_lower_km2: None,
            ci_upper_km2: None,
            predicted_casualties: None,
            predicted_damage_usd: None,
            model_version: self.registry.severity.version().to_string(),
            created_at: Utc::now(),
        };
        self.persist(row, event, &mut prediction_ids);

        // 2. Spread
        let features = spread_features(magnitude, weather, disaster.disaster_type);
        let output = self.registry.spread.predict(&features);
        let row = Prediction {
            id: new_id(),
            disaster_id: disaster.id.clone(),
            location_id: disaster.location_id.clone(),
            prediction_type: PredictionType::Spread,
            features: features.to_value(),
            confidence_score: clamp_unit(output.confidence),
            predicted_severity: None,
            predicted_area_km2: Some(output.predicted_area_km2),
            ci_lower_km2: output.ci_lower_km2,
            ci_upper_km2: output.ci_upper_km2,
            predicted_casualties: None,
            predicted_damage_usd: None,
            model_version: self.registry.spread.version().to_string(),
            created_at: Utc::now(),
        };
        self.persist(row, event, &mut prediction_ids);

        // 3. Impact
        let features = impact_features(
            event.severity,
            gdacs_population(event),
            disaster.disaster_type,
        );
        let output = self.registry.impact.predict(&features);
        let row = Prediction {
            id: new_id(),
            disaster_id: disaster.id.clone(),
            location_id: disaster.location_id.clone(),
            prediction_type: PredictionType::Impact,
            features: features.to_value(),
            confidence_score: clamp_unit(output.confidence),
            predicted_severity: None,
            predicted_area_km2: None,
            ci_lower_km2: None,
            ci_upper_km2: None,
            predicted_casualties: Some(output.predicted_casualties),
            predicted_damage_usd: Some(output.predicted_damage_usd),
            model_version: self.registry.impact.version().to_string(),
            created_at: Utc::now(),
        };
        self.persist(row, event, &mut prediction_ids);

        info!(
            event_id = %event.id,
            predictions = prediction_ids.len(),
            "Batch predictions complete"
        );
        prediction_ids
    }

    fn persist(&self, row: Prediction, event: &IngestedEvent, ids: &mut Vec<String>) {
        let prediction_type = row.prediction_type;
        let id = row.id.clone();
        match self
            .store
            .collection::<Prediction>()
            .and_then(|c| c.insert(&row))
        {
            Ok(()) => ids.push(id),
            Err(e) => error!(
                event_id = %event.id,
                %prediction_type,
                error = %e,
                "Prediction failed — continuing with remaining types"
            ),
        }
    }
}

fn clamp_unit(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Population exposure carried by humanitarian alerts, when present.
fn gdacs_population(event: &IngestedEvent) -> Option<u64> {
    let raw = event.raw_payload.get("gdacs_population")?;
    match raw {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Filter, Query};
    use crate::types::{DisasterStatus, DisasterType, EventType, Severity};
    use serde_json::json;

    fn make_event() -> IngestedEvent {
        IngestedEvent {
            id: new_id(),
            source_id: "src".into(),
            external_id: "usgs-us7000abcd".into(),
            event_type: EventType::Earthquake,
            title: "M6.4 - Offshore X".into(),
            description: String::new(),
            severity: Severity::High,
            latitude: Some(35.1),
            longitude: Some(139.7),
            location_name: Some("Offshore X".into()),
            raw_payload: json!({"magnitude": 6.4, "usgs_id": "us7000abcd"}),
            ingested_at: Utc::now(),
            processed: false,
            processed_at: None,
            disaster_id: None,
            prediction_ids: Vec::new(),
        }
    }

    fn make_disaster() -> Disaster {
        let now = Utc::now();
        Disaster {
            id: "d-1".into(),
            disaster_type: DisasterType::Earthquake,
            severity: Severity::High,
            status: DisasterStatus::Active,
            title: "M6.4 - Offshore X".into(),
            description: String::new(),
            location_id: "l-1".into(),
            start_date: now,
            end_date: None,
            affected_population: None,
            casualties: None,
            estimated_damage: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_three_predictions_in_order() {
        let store = StoreGateway::open_temporary().unwrap();
        let client = PredictionClient::new(store.clone());

        let ids = client.run_batch(&make_event(), &make_disaster(), &WeatherFeatures::default());
        assert_eq!(ids.len(), 3);

        let predictions = store.collection::<Prediction>().unwrap();
        let types: Vec<PredictionType> = ids
            .iter()
            .map(|id| predictions.get(id).unwrap().unwrap().prediction_type)
            .collect();
        assert_eq!(
            types,
            vec![
                PredictionType::Severity,
                PredictionType::Spread,
                PredictionType::Impact
            ]
        );
    }

    #[test]
    fn test_predictions_link_disaster_and_location() {
        let store = StoreGateway::open_temporary().unwrap();
        let client = PredictionClient::new(store.clone());
        client.run_batch(&make_event(), &make_disaster(), &WeatherFeatures::default());

        let rows = store
            .collection::<Prediction>()
            .unwrap()
            .find(&Query::new().filter(Filter::eq("disaster_id", "d-1")))
            .unwrap();
        assert_eq!(rows.len(), 3);
        for row in rows {
            assert_eq!(row.location_id, "l-1");
            assert!((0.0..=1.0).contains(&row.confidence_score));
        }
    }

    #[test]
    fn test_spread_uses_magnitude_proxy_area() {
        let store = StoreGateway::open_temporary().unwrap();
        let client = PredictionClient::new(store.clone());
        client.run_batch(&make_event(), &make_disaster(), &WeatherFeatures::default());

        let spread = store
            .collection::<Prediction>()
            .unwrap()
            .find(&Query::new().filter(Filter::eq("prediction_type", "spread")))
            .unwrap();
        assert_eq!(spread.len(), 1);
        assert_eq!(spread[0].features["current_area"], 32.0);
        assert!(spread[0].predicted_area_km2.unwrap() > 0.0);
    }

    #[test]
    fn test_quantile_registry_emits_ci() {
        let store = StoreGateway::open_temporary().unwrap();
        let client =
            PredictionClient::with_registry(store.clone(), ModelRegistry::with_quantile_bounds(0.2));
        client.run_batch(&make_event(), &make_disaster(), &WeatherFeatures::default());

        let spread = store
            .collection::<Prediction>()
            .unwrap()
            .find(&Query::new().filter(Filter::eq("prediction_type", "spread")))
            .unwrap();
        assert!(spread[0].ci_lower_km2.is_some());
        assert!(spread[0].ci_upper_km2.is_some());
    }

    #[test]
    fn test_string_population_is_parsed() {
        // GDACS carries population as a string field
        let mut event = make_event();
        event.raw_payload = json!({"gdacs_population": "250000"});
        let store = StoreGateway::open_temporary().unwrap();
        let client = PredictionClient::new(store.clone());
        client.run_batch(&event, &make_disaster(), &WeatherFeatures::default());

        let impact = store
            .collection::<Prediction>()
            .unwrap()
            .find(&Query::new().filter(Filter::eq("prediction_type", "impact")))
            .unwrap();
        assert_eq!(impact[0].features["affected_population"], 250_000.0);
    }
}
