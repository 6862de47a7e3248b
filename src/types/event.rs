//! Ingested event and feed-source registry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Four-level severity shared by events, disasters, predictions, and
/// victim-request priorities.
///
/// Ordered: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Ordinal index into the low→critical ladder (0..=3).
    pub fn index(self) -> usize {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
        }
    }

    /// Inverse of [`index`](Self::index); clamps out-of-range values to `Critical`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Severity::Low,
            1 => Severity::Medium,
            2 => Severity::High,
            _ => Severity::Critical,
        }
    }

    /// Ordinal score used by the impact predictor and anomaly detector
    /// (low=1 … critical=4).
    pub fn score(self) -> f64 {
        (self.index() + 1) as f64
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of normalized event produced by a feed adapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Earthquake,
    GdacsAlert,
    SocialSos,
    FireHotspot,
    WeatherUpdate,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventType::Earthquake => "earthquake",
            EventType::GdacsAlert => "gdacs_alert",
            EventType::SocialSos => "social_sos",
            EventType::FireHotspot => "fire_hotspot",
            EventType::WeatherUpdate => "weather_update",
        };
        f.write_str(s)
    }
}

/// Registered external feeds, one per adapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceName {
    Openweathermap,
    Gdacs,
    UsgsEarthquakes,
    NasaFirms,
    SocialMedia,
}

impl SourceName {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceName::Openweathermap => "openweathermap",
            SourceName::Gdacs => "gdacs",
            SourceName::UsgsEarthquakes => "usgs_earthquakes",
            SourceName::NasaFirms => "nasa_firms",
            SourceName::SocialMedia => "social_media",
        }
    }

    /// Parse the registry spelling back into a source name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "openweathermap" => Some(SourceName::Openweathermap),
            "gdacs" => Some(SourceName::Gdacs),
            "usgs_earthquakes" => Some(SourceName::UsgsEarthquakes),
            "nasa_firms" => Some(SourceName::NasaFirms),
            "social_media" => Some(SourceName::SocialMedia),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the most recent poll cycle for a source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Success,
    Error,
}

/// A normalized event persisted from an external feed.
///
/// `(source_id, external_id)` is unique — the deduplicator is the sole
/// write path and filters on `external_id` before insert. Once `processed`
/// flips to true it is never reverted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedEvent {
    pub id: String,
    /// Reference to the [`SourceRegistry`] row for the producing feed.
    pub source_id: String,
    /// Deterministic upstream identity, e.g. `usgs-us7000abcd`.
    pub external_id: String,
    pub event_type: EventType,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
    /// Opaque upstream record, preserved as-is.
    pub raw_payload: Value,
    pub ingested_at: DateTime<Utc>,
    #[serde(default)]
    pub processed: bool,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disaster_id: Option<String>,
    #[serde(default)]
    pub prediction_ids: Vec<String>,
}

/// One row per external feed: polling bookkeeping and health.
///
/// Auto-created by the owning adapter on first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRegistry {
    pub id: String,
    pub source_name: SourceName,
    pub source_type: String,
    pub base_url: String,
    pub is_active: bool,
    pub poll_interval_s: u64,
    #[serde(default)]
    pub last_polled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_status: Option<SourceStatus>,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_index_roundtrip() {
        for sev in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            assert_eq!(Severity::from_index(sev.index()), sev);
        }
        // Out-of-range clamps to critical
        assert_eq!(Severity::from_index(7), Severity::Critical);
    }

    #[test]
    fn test_severity_wire_format() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }

    #[test]
    fn test_event_type_wire_format() {
        let json = serde_json::to_string(&EventType::GdacsAlert).unwrap();
        assert_eq!(json, "\"gdacs_alert\"");
    }

    #[test]
    fn test_source_name_parse() {
        assert_eq!(
            SourceName::parse("usgs_earthquakes"),
            Some(SourceName::UsgsEarthquakes)
        );
        assert_eq!(SourceName::parse("nope"), None);
    }
}
