//! Weather feed adapter
//!
//! Fetches current conditions for every tracked location each cycle and
//! appends one observation per location. The most recent observation per
//! location feeds the prediction client as weather context.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::store::{Filter, Query, StoreGateway};
use crate::types::{new_id, Location, SourceName, WeatherFeatures, WeatherObservation};

use super::mock::MockGenerator;
use super::usgs::http_client;
use super::{ensure_source, AdapterError};

/// Polls current weather conditions per tracked location.
pub struct WeatherAdapter {
    store: StoreGateway,
    mock: Arc<MockGenerator>,
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl WeatherAdapter {
    pub fn new(store: StoreGateway, mock: Arc<MockGenerator>) -> Self {
        let cfg = &crate::config::get().ingestion;
        Self {
            store,
            mock,
            http: http_client(15),
            api_key: cfg.openweathermap_api_key.clone(),
            base_url: cfg.openweathermap_base_url.clone(),
        }
    }

    /// Fetch and store one observation per tracked location.
    ///
    /// Without an API key the mock generator stands in; its synthetic
    /// locations carry no `location_id` since no location row backs them.
    pub async fn poll(&self) -> Result<Vec<WeatherObservation>, AdapterError> {
        self.register()?;
        let observations_collection = self.store.collection::<WeatherObservation>()?;

        if self.api_key.is_empty() {
            info!("No weather API key — using mock weather data");
            let mut observations = self.mock.weather(&[]);
            for obs in &mut observations {
                obs.location_id = None;
            }
            observations_collection.insert_batch(&observations)?;
            info!(stored = observations.len(), "Mock weather poll complete");
            return Ok(observations);
        }

        let locations = self.tracked_locations()?;
        let mut observations = Vec::with_capacity(locations.len());
        for loc in &locations {
            match self.fetch_current(loc).await {
                Ok(obs) => observations.push(obs),
                Err(e) => {
                    warn!(location = %loc.name, error = %e, "Weather fetch failed");
                }
            }
        }

        observations_collection.insert_batch(&observations)?;
        info!(stored = observations.len(), "Weather poll complete");
        Ok(observations)
    }

    /// One-off fetch for a specific coordinate pair.
    pub async fn fetch_for_coordinates(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<Option<WeatherObservation>, AdapterError> {
        if self.api_key.is_empty() {
            let mut observations = self.mock.weather(&[(None, lat, lon)]);
            return Ok(observations.pop());
        }
        let loc = Location {
            id: String::new(),
            name: String::new(),
            latitude: lat,
            longitude: lon,
            city: String::new(),
            state: String::new(),
            country: String::new(),
            created_at: Utc::now(),
        };
        Ok(Some(self.fetch_current(&loc).await?))
    }

    fn tracked_locations(&self) -> Result<Vec<Location>, AdapterError> {
        Ok(self.store.collection::<Location>()?.find(&Query::new())?)
    }

    async fn fetch_current(&self, loc: &Location) -> Result<WeatherObservation, AdapterError> {
        let url = format!("{}/weather", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("lat", loc.latitude.to_string()),
                ("lon", loc.longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".into()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AdapterError::Upstream(resp.status()));
        }
        let data: Value = resp.json().await?;
        Ok(Self::observation_from_payload(loc, data))
    }

    fn observation_from_payload(loc: &Location, data: Value) -> WeatherObservation {
        let main = &data["main"];
        let wind = &data["wind"];
        let weather = data["weather"].get(0).cloned().unwrap_or(Value::Null);

        let precipitation = data["rain"]["1h"]
            .as_f64()
            .or_else(|| data["snow"]["1h"].as_f64())
            .unwrap_or(0.0);

        let observed_at = data["dt"]
            .as_i64()
            .and_then(|dt| DateTime::<Utc>::from_timestamp(dt, 0))
            .unwrap_or_else(Utc::now);

        WeatherObservation {
            id: new_id(),
            location_id: if loc.id.is_empty() {
                None
            } else {
                Some(loc.id.clone())
            },
            latitude: loc.latitude,
            longitude: loc.longitude,
            temperature_c: main["temp"].as_f64(),
            humidity_pct: main["humidity"].as_f64(),
            wind_speed_ms: wind["speed"].as_f64(),
            wind_deg: wind["deg"].as_f64(),
            pressure_hpa: main["pressure"].as_f64(),
            precipitation_mm: Some(precipitation),
            visibility_m: data["visibility"].as_f64(),
            weather_main: weather["main"].as_str().map(String::from),
            weather_desc: weather["description"].as_str().map(String::from),
            observed_at,
            source: "openweathermap".into(),
            raw_payload: data,
        }
    }

    fn register(&self) -> Result<String, AdapterError> {
        Ok(ensure_source(
            &self.store,
            SourceName::Openweathermap,
            "rest_api",
            "https://api.openweathermap.org/data/2.5",
            crate::config::get().ingestion.weather_poll_interval_s,
        )?)
    }
}

/// Latest observation for a location as prediction features, with
/// climatological defaults for anything missing.
pub fn latest_features_for_location(
    store: &StoreGateway,
    location_id: &str,
) -> Result<WeatherFeatures, crate::store::StoreError> {
    let row = store.collection::<WeatherObservation>()?.maybe_single(
        &Query::new()
            .filter(Filter::eq("location_id", location_id))
            .order_desc("observed_at"),
    )?;

    let defaults = WeatherFeatures::default();
    Ok(match row {
        None => defaults,
        Some(obs) => WeatherFeatures {
            temperature: obs.temperature_c.unwrap_or(defaults.temperature),
            humidity: obs.humidity_pct.unwrap_or(defaults.humidity),
            wind_speed: obs.wind_speed_ms.unwrap_or(defaults.wind_speed),
            pressure: obs.pressure_hpa.unwrap_or(defaults.pressure),
            precipitation: obs.precipitation_mm.unwrap_or(defaults.precipitation),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_observation_from_payload() {
        let loc = Location {
            id: "l-1".into(),
            name: "Tokyo".into(),
            latitude: 35.68,
            longitude: 139.65,
            city: "Tokyo".into(),
            state: "Tokyo".into(),
            country: "Japan".into(),
            created_at: Utc::now(),
        };
        let payload = json!({
            "main": {"temp": 18.4, "humidity": 62, "pressure": 1008},
            "wind": {"speed": 4.2, "deg": 220},
            "weather": [{"main": "Rain", "description": "moderate rain"}],
            "rain": {"1h": 2.5},
            "visibility": 8000,
            "dt": 1_700_000_000,
        });
        let obs = WeatherAdapter::observation_from_payload(&loc, payload);
        assert_eq!(obs.location_id.as_deref(), Some("l-1"));
        assert_eq!(obs.temperature_c, Some(18.4));
        assert_eq!(obs.humidity_pct, Some(62.0));
        assert_eq!(obs.precipitation_mm, Some(2.5));
        assert_eq!(obs.weather_main.as_deref(), Some("Rain"));
    }

    #[test]
    fn test_latest_features_defaults_when_empty() {
        let store = StoreGateway::open_temporary().unwrap();
        let features = latest_features_for_location(&store, "nowhere").unwrap();
        assert_eq!(features, WeatherFeatures::default());
    }

    #[test]
    fn test_latest_features_reads_most_recent() {
        let store = StoreGateway::open_temporary().unwrap();
        let observations = store.collection::<WeatherObservation>().unwrap();
        let base = Utc::now();

        for (hours_ago, temp) in [(5i64, 15.0), (1, 30.0), (3, 22.0)] {
            observations
                .insert(&WeatherObservation {
                    id: new_id(),
                    location_id: Some("l-1".into()),
                    latitude: 0.0,
                    longitude: 0.0,
                    temperature_c: Some(temp),
                    humidity_pct: Some(40.0),
                    wind_speed_ms: Some(3.0),
                    wind_deg: None,
                    pressure_hpa: Some(1000.0),
                    precipitation_mm: Some(0.0),
                    visibility_m: None,
                    weather_main: None,
                    weather_desc: None,
                    observed_at: base - chrono::Duration::hours(hours_ago),
                    source: "test".into(),
                    raw_payload: json!({}),
                })
                .unwrap();
        }

        let features = latest_features_for_location(&store, "l-1").unwrap();
        assert_eq!(features.temperature, 30.0);
    }

    #[tokio::test]
    async fn test_mock_poll_strips_location_id() {
        let store = StoreGateway::open_temporary().unwrap();
        let adapter = WeatherAdapter::new(store.clone(), Arc::new(MockGenerator::new(6)));
        let observations = adapter.poll().await.unwrap();
        assert!(!observations.is_empty());
        for obs in &observations {
            assert!(obs.location_id.is_none());
        }
    }
}
