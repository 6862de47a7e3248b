//! Satellite hotspot and weather observation rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Detection confidence reported with a satellite hotspot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HotspotConfidence {
    Low,
    Nominal,
    High,
}

impl HotspotConfidence {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(HotspotConfidence::Low),
            "nominal" => Some(HotspotConfidence::Nominal),
            "high" => Some(HotspotConfidence::High),
            _ => None,
        }
    }
}

/// One satellite fire-hotspot detection.
///
/// Hotspots never create disasters directly; they feed spread-prediction
/// features for nearby active disasters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatelliteObservation {
    pub id: String,
    pub source: String,
    /// `firms-<lat>-<lon>-<YYYY-MM-DD>-<HHMM>`
    pub external_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Brightness temperature (Kelvin).
    #[serde(default)]
    pub brightness: Option<f64>,
    /// Fire radiative power (MW).
    #[serde(default)]
    pub frp: Option<f64>,
    #[serde(default)]
    pub confidence: Option<HotspotConfidence>,
    pub satellite: String,
    pub instrument: String,
    pub acq_datetime: DateTime<Utc>,
    pub daynight: String,
    pub raw_payload: Value,
}

/// Time-stamped atmospheric snapshot for one location. Append-only; the
/// most recent row per location is read as prediction context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub id: String,
    /// Null for mock observations whose synthetic location has no row.
    #[serde(default)]
    pub location_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    #[serde(default)]
    pub humidity_pct: Option<f64>,
    #[serde(default)]
    pub wind_speed_ms: Option<f64>,
    #[serde(default)]
    pub wind_deg: Option<f64>,
    #[serde(default)]
    pub pressure_hpa: Option<f64>,
    #[serde(default)]
    pub precipitation_mm: Option<f64>,
    #[serde(default)]
    pub visibility_m: Option<f64>,
    #[serde(default)]
    pub weather_main: Option<String>,
    #[serde(default)]
    pub weather_desc: Option<String>,
    pub observed_at: DateTime<Utc>,
    pub source: String,
    pub raw_payload: Value,
}

/// Latest-weather feature bag consumed by the prediction client.
///
/// Values fall back to climatological defaults when no observation exists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WeatherFeatures {
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub pressure: f64,
    pub precipitation: f64,
}

impl Default for WeatherFeatures {
    fn default() -> Self {
        Self {
            temperature: 25.0,
            humidity: 50.0,
            wind_speed: 10.0,
            pressure: 1013.0,
            precipitation: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_parse() {
        assert_eq!(
            HotspotConfidence::parse("nominal"),
            Some(HotspotConfidence::Nominal)
        );
        assert_eq!(HotspotConfidence::parse("80"), None);
    }

    #[test]
    fn test_weather_defaults() {
        let f = WeatherFeatures::default();
        assert_eq!(f.temperature, 25.0);
        assert_eq!(f.humidity, 50.0);
        assert_eq!(f.wind_speed, 10.0);
        assert_eq!(f.pressure, 1013.0);
    }
}
