//! Geophysical (earthquake) feed adapter
//!
//! Polls a GeoJSON summary feed, filters by minimum magnitude, bands
//! magnitude into severity, and persists the deduplicated batch. Falls
//! back to synthetic earthquakes when the feed is unreachable or empty.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::store::StoreGateway;
use crate::types::{EventType, IngestedEvent, Severity, SourceName};

use super::dedup::Deduplicator;
use super::mock::MockGenerator;
use super::{ensure_source, AdapterError, FeedAdapter, NormalizedEvent};

/// Magnitude bands, checked top-down.
const MAG_SEVERITY: [(f64, Severity); 4] = [
    (7.0, Severity::Critical),
    (6.0, Severity::High),
    (5.0, Severity::Medium),
    (0.0, Severity::Low),
];

/// Band a magnitude into our severity ladder. Monotone in magnitude.
pub(crate) fn magnitude_to_severity(magnitude: f64) -> Severity {
    for (threshold, severity) in MAG_SEVERITY {
        if magnitude >= threshold {
            return severity;
        }
    }
    Severity::Low
}

/// Polls the geophysical GeoJSON earthquake feed.
pub struct UsgsAdapter {
    store: StoreGateway,
    dedup: Deduplicator,
    mock: Arc<MockGenerator>,
    http: reqwest::Client,
    feed_url: String,
    min_magnitude: f64,
}

impl UsgsAdapter {
    pub fn new(store: StoreGateway, mock: Arc<MockGenerator>) -> Self {
        let cfg = &crate::config::get().ingestion;
        Self {
            dedup: Deduplicator::new(store.clone()),
            store,
            mock,
            http: http_client(20),
            feed_url: cfg.usgs_feed_url.clone(),
            min_magnitude: cfg.usgs_min_magnitude,
        }
    }

    async fn fetch_feed(&self) -> Result<Value, AdapterError> {
        let resp = self.http.get(&self.feed_url).send().await?;
        if !resp.status().is_success() {
            return Err(AdapterError::Upstream(resp.status()));
        }
        Ok(resp.json().await?)
    }

    fn parse_features(&self, data: &Value) -> Vec<NormalizedEvent> {
        let features = data
            .get("features")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut parsed = Vec::new();
        for feat in &features {
            let props = &feat["properties"];
            let Some(magnitude) = props.get("mag").and_then(Value::as_f64) else {
                continue;
            };
            if magnitude < self.min_magnitude {
                continue;
            }

            let coords = feat["geometry"]["coordinates"].as_array();
            let lon = coords.and_then(|c| c.first()).and_then(Value::as_f64);
            let lat = coords.and_then(|c| c.get(1)).and_then(Value::as_f64);
            let depth_km = coords.and_then(|c| c.get(2)).and_then(Value::as_f64);

            let usgs_id = feat.get("id").and_then(Value::as_str).unwrap_or_default();
            let place = props.get("place").and_then(Value::as_str).unwrap_or("unknown");
            let title = props
                .get("title")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| format!("M{magnitude} - {place}"));

            parsed.push(NormalizedEvent {
                external_id: format!("usgs-{usgs_id}"),
                event_type: EventType::Earthquake,
                title,
                description: format!(
                    "M{magnitude} earthquake at {place}. Depth: {} km.",
                    depth_km.map_or_else(|| "unknown".into(), |d| d.to_string())
                ),
                severity: magnitude_to_severity(magnitude),
                latitude: lat,
                longitude: lon,
                location_name: Some(place.to_string()),
                raw_payload: json!({
                    "usgs_id": usgs_id,
                    "magnitude": magnitude,
                    "mag_type": props.get("magType"),
                    "depth_km": depth_km,
                    "place": place,
                    "time": props.get("time"),
                    "url": props.get("url"),
                    "tsunami": props.get("tsunami"),
                    "felt": props.get("felt"),
                    "alert": props.get("alert"),
                    "status": props.get("status"),
                    "type": props.get("type"),
                }),
            });
        }
        parsed
    }

    fn source_id(&self) -> Result<String, AdapterError> {
        Ok(ensure_source(
            &self.store,
            SourceName::UsgsEarthquakes,
            "geojson_feed",
            "https://earthquake.usgs.gov/earthquakes/feed",
            crate::config::get().ingestion.usgs_poll_interval_s,
        )?)
    }
}

#[async_trait]
impl FeedAdapter for UsgsAdapter {
    fn source_name(&self) -> SourceName {
        SourceName::UsgsEarthquakes
    }

    async fn poll(&self) -> Result<Vec<IngestedEvent>, AdapterError> {
        let cap = crate::config::get().ingestion.max_events_per_poll;
        let mut events = match self.fetch_feed().await {
            Ok(data) => {
                let parsed = self.parse_features(&data);
                if parsed.is_empty() {
                    info!("Earthquake feed returned 0 events — generating mock earthquakes");
                    self.mock.earthquakes(None)
                } else {
                    parsed
                }
            }
            Err(e) => {
                warn!(error = %e, "Earthquake feed unreachable — using mock data");
                self.mock.earthquakes(None)
            }
        };
        events.truncate(cap);

        let source_id = self.source_id()?;
        let new_events = self.dedup.store_events(&source_id, events)?;
        info!(new = new_events.len(), "Earthquake poll complete");
        Ok(new_events)
    }
}

/// Shared client builder: rustls, fixed timeout in seconds.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitude_banding() {
        assert_eq!(magnitude_to_severity(8.1), Severity::Critical);
        assert_eq!(magnitude_to_severity(7.0), Severity::Critical);
        assert_eq!(magnitude_to_severity(6.4), Severity::High);
        assert_eq!(magnitude_to_severity(5.2), Severity::Medium);
        assert_eq!(magnitude_to_severity(4.0), Severity::Low);
        assert_eq!(magnitude_to_severity(1.5), Severity::Low);
    }

    #[test]
    fn test_banding_monotone() {
        let mut last = Severity::Low;
        for tenths in 0..=90 {
            let severity = magnitude_to_severity(tenths as f64 / 10.0);
            assert!(severity >= last);
            last = severity;
        }
    }

    #[test]
    fn test_parse_geojson_feature() {
        let store = StoreGateway::open_temporary().unwrap();
        let adapter = UsgsAdapter::new(store, Arc::new(MockGenerator::new(1)));

        let data = json!({
            "features": [{
                "id": "us7000abcd",
                "properties": {
                    "mag": 6.4,
                    "place": "Offshore X",
                    "title": "M 6.4 - Offshore X",
                    "time": 1_700_000_000_000i64,
                    "tsunami": 0,
                },
                "geometry": {"coordinates": [139.7, 35.1, 28.4]},
            }],
        });
        let events = adapter.parse_features(&data);
        assert_eq!(events.len(), 1);
        let ev = &events[0];
        assert_eq!(ev.external_id, "usgs-us7000abcd");
        assert_eq!(ev.severity, Severity::High);
        assert_eq!(ev.latitude, Some(35.1));
        assert_eq!(ev.longitude, Some(139.7));
        assert_eq!(ev.raw_payload["magnitude"], 6.4);
    }

    #[test]
    fn test_parse_filters_below_min_magnitude() {
        let store = StoreGateway::open_temporary().unwrap();
        let adapter = UsgsAdapter::new(store, Arc::new(MockGenerator::new(1)));

        let data = json!({
            "features": [
                {"id": "small", "properties": {"mag": 2.1, "place": "A"}, "geometry": {"coordinates": [0.0, 0.0, 1.0]}},
                {"id": "big", "properties": {"mag": 5.5, "place": "B"}, "geometry": {"coordinates": [0.0, 0.0, 1.0]}},
                {"id": "nomag", "properties": {"place": "C"}, "geometry": {"coordinates": [0.0, 0.0, 1.0]}},
            ],
        });
        let events = adapter.parse_features(&data);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].external_id, "usgs-big");
    }
}
