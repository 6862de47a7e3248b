//! Canonical disaster and location records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical disaster classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DisasterType {
    Earthquake,
    Flood,
    Hurricane,
    Tornado,
    Wildfire,
    Tsunami,
    Drought,
    Landslide,
    Volcano,
    Other,
}

impl DisasterType {
    /// The nine concrete types used as the one-hot vocabulary for
    /// prediction features (`Other` is excluded).
    pub const VOCABULARY: [DisasterType; 9] = [
        DisasterType::Earthquake,
        DisasterType::Flood,
        DisasterType::Hurricane,
        DisasterType::Tornado,
        DisasterType::Wildfire,
        DisasterType::Tsunami,
        DisasterType::Drought,
        DisasterType::Landslide,
        DisasterType::Volcano,
    ];

    /// Map a GDACS event-type code (EQ/TC/FL/VO/DR/WF/TS) to our taxonomy.
    pub fn from_gdacs_code(code: &str) -> Self {
        match code {
            "EQ" => DisasterType::Earthquake,
            "TC" => DisasterType::Hurricane,
            "FL" => DisasterType::Flood,
            "VO" => DisasterType::Volcano,
            "DR" => DisasterType::Drought,
            "WF" => DisasterType::Wildfire,
            "TS" => DisasterType::Tsunami,
            _ => DisasterType::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DisasterType::Earthquake => "earthquake",
            DisasterType::Flood => "flood",
            DisasterType::Hurricane => "hurricane",
            DisasterType::Tornado => "tornado",
            DisasterType::Wildfire => "wildfire",
            DisasterType::Tsunami => "tsunami",
            DisasterType::Drought => "drought",
            DisasterType::Landslide => "landslide",
            DisasterType::Volcano => "volcano",
            DisasterType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "earthquake" => Some(DisasterType::Earthquake),
            "flood" => Some(DisasterType::Flood),
            "hurricane" => Some(DisasterType::Hurricane),
            "tornado" => Some(DisasterType::Tornado),
            "wildfire" => Some(DisasterType::Wildfire),
            "tsunami" => Some(DisasterType::Tsunami),
            "drought" => Some(DisasterType::Drought),
            "landslide" => Some(DisasterType::Landslide),
            "volcano" => Some(DisasterType::Volcano),
            "other" => Some(DisasterType::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for DisasterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a canonical disaster record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisasterStatus {
    Predicted,
    Active,
    Monitoring,
    Resolved,
}

/// Canonical disaster record, auto-created from qualifying ingested events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disaster {
    pub id: String,
    #[serde(rename = "type")]
    pub disaster_type: DisasterType,
    pub severity: super::Severity,
    pub status: DisasterStatus,
    pub title: String,
    pub description: String,
    pub location_id: String,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub affected_population: Option<u64>,
    #[serde(default)]
    pub casualties: Option<u64>,
    /// Estimated economic damage in million USD.
    #[serde(default)]
    pub estimated_damage: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Geocoded place. Events within ±0.5° of an existing location reuse it;
/// otherwise a stub row is minted with "Unknown" administrative fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
    pub state: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gdacs_code_mapping() {
        assert_eq!(DisasterType::from_gdacs_code("TC"), DisasterType::Hurricane);
        assert_eq!(DisasterType::from_gdacs_code("EQ"), DisasterType::Earthquake);
        assert_eq!(DisasterType::from_gdacs_code("WF"), DisasterType::Wildfire);
        assert_eq!(DisasterType::from_gdacs_code("XX"), DisasterType::Other);
    }

    #[test]
    fn test_type_field_rename() {
        let json = serde_json::json!({
            "id": "d1",
            "type": "hurricane",
            "severity": "critical",
            "status": "active",
            "title": "TC Maria",
            "description": "",
            "location_id": "l1",
            "start_date": "2026-01-01T00:00:00Z",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
        });
        let d: Disaster = serde_json::from_value(json).unwrap();
        assert_eq!(d.disaster_type, DisasterType::Hurricane);
    }

    #[test]
    fn test_vocabulary_excludes_other() {
        assert_eq!(DisasterType::VOCABULARY.len(), 9);
        assert!(!DisasterType::VOCABULARY.contains(&DisasterType::Other));
    }
}
