//! Deterministic feature assembly for the three serving models
//!
//! Each prediction type gets a flat, fully-defaulted feature vector:
//! missing weather context falls back to climatological defaults, and the
//! disaster type is one-hot encoded over the nine-type vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::{DisasterType, Severity, WeatherFeatures};

/// Reference sea-level pressure (hPa) for the pressure-drop feature.
const STANDARD_PRESSURE_HPA: f64 = 1013.25;

/// Reference temperature (°C) for the temperature-deviation feature.
const REFERENCE_TEMP_C: f64 = 25.0;

/// Ordered terrain vocabulary; the index is the model feature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TerrainType {
    #[default]
    Flat,
    Hilly,
    Mountainous,
    Forested,
    Urban,
    Coastal,
}

impl TerrainType {
    pub fn index(self) -> usize {
        match self {
            TerrainType::Flat => 0,
            TerrainType::Hilly => 1,
            TerrainType::Mountainous => 2,
            TerrainType::Forested => 3,
            TerrainType::Urban => 4,
            TerrainType::Coastal => 5,
        }
    }
}

/// One-hot encoding over [`DisasterType::VOCABULARY`]; `Other` encodes as
/// all zeros.
fn one_hot(disaster_type: DisasterType) -> Vec<(String, f64)> {
    DisasterType::VOCABULARY
        .iter()
        .map(|t| {
            (
                format!("type_{t}"),
                if *t == disaster_type { 1.0 } else { 0.0 },
            )
        })
        .collect()
}

// ============================================================================
// Severity
// ============================================================================

/// Inputs to the severity classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityFeatures {
    pub temperature: f64,
    pub wind_speed: f64,
    pub humidity: f64,
    pub pressure: f64,
    /// wind · humidity / 100
    pub wind_humidity_idx: f64,
    /// 1013.25 − pressure
    pub pressure_drop: f64,
    /// |temperature − 25|
    pub temp_deviation: f64,
    pub disaster_type: DisasterType,
}

/// Assemble severity features from weather context.
pub fn severity_features(weather: &WeatherFeatures, disaster_type: DisasterType) -> SeverityFeatures {
    SeverityFeatures {
        temperature: weather.temperature,
        wind_speed: weather.wind_speed,
        humidity: weather.humidity,
        pressure: weather.pressure,
        wind_humidity_idx: weather.wind_speed * weather.humidity / 100.0,
        pressure_drop: STANDARD_PRESSURE_HPA - weather.pressure,
        temp_deviation: (weather.temperature - REFERENCE_TEMP_C).abs(),
        disaster_type,
    }
}

impl SeverityFeatures {
    /// Flat feature map persisted with the prediction row.
    pub fn to_value(&self) -> Value {
        let mut map = json!({
            "temperature": self.temperature,
            "wind_speed": self.wind_speed,
            "humidity": self.humidity,
            "pressure": self.pressure,
            "wind_humidity_idx": self.wind_humidity_idx,
            "pressure_drop": self.pressure_drop,
            "temp_deviation": self.temp_deviation,
        });
        extend_one_hot(&mut map, self.disaster_type);
        map
    }
}

// ============================================================================
// Spread
// ============================================================================

/// Inputs to the spread regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadFeatures {
    /// Current affected area (km²).
    pub current_area: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub elevation_m: f64,
    pub vegetation_density: f64,
    pub days_active: f64,
    pub terrain: TerrainType,
    pub disaster_type: DisasterType,
}

/// Assemble spread features.
///
/// When no area is known, geophysical events derive a proxy from
/// magnitude (`magnitude * 5` km²); everything else starts at 50 km².
pub fn spread_features(
    magnitude: Option<f64>,
    weather: &WeatherFeatures,
    disaster_type: DisasterType,
) -> SpreadFeatures {
    let current_area = match magnitude {
        Some(mag) if mag > 0.0 => mag * 5.0,
        _ => 50.0,
    };
    SpreadFeatures {
        current_area,
        wind_speed: weather.wind_speed,
        wind_direction: 180.0,
        elevation_m: 500.0,
        vegetation_density: 0.5,
        days_active: 1.0,
        terrain: TerrainType::default(),
        disaster_type,
    }
}

impl SpreadFeatures {
    pub fn to_value(&self) -> Value {
        let mut map = json!({
            "current_area": self.current_area,
            "wind_speed": self.wind_speed,
            "wind_direction": self.wind_direction,
            "elevation_m": self.elevation_m,
            "vegetation_density": self.vegetation_density,
            "days_active": self.days_active,
            "terrain_idx": self.terrain.index(),
        });
        extend_one_hot(&mut map, self.disaster_type);
        map
    }
}

// ============================================================================
// Impact
// ============================================================================

/// Inputs to the impact regressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactFeatures {
    /// Ordinal severity (low=1 … critical=4).
    pub severity_score: f64,
    pub affected_population: f64,
    pub gdp_per_capita: f64,
    pub infrastructure_density: f64,
    pub disaster_type: DisasterType,
}

/// Assemble impact features. A missing or zero upstream population
/// defaults to 10 000; GDP and infrastructure density use neutral
/// defaults until enrichment data exists.
pub fn impact_features(
    severity: Severity,
    affected_population: Option<u64>,
    disaster_type: DisasterType,
) -> ImpactFeatures {
    let population = match affected_population {
        Some(p) if p > 0 => p as f64,
        _ => 10_000.0,
    };
    ImpactFeatures {
        severity_score: severity.score(),
        affected_population: population,
        gdp_per_capita: 10_000.0,
        infrastructure_density: 0.5,
        disaster_type,
    }
}

impl ImpactFeatures {
    pub fn to_value(&self) -> Value {
        let mut map = json!({
            "severity_score": self.severity_score,
            "affected_population": self.affected_population,
            "gdp_per_capita": self.gdp_per_capita,
            "infrastructure_density": self.infrastructure_density,
        });
        extend_one_hot(&mut map, self.disaster_type);
        map
    }
}

fn extend_one_hot(map: &mut Value, disaster_type: DisasterType) {
    if let Some(obj) = map.as_object_mut() {
        for (key, v) in one_hot(disaster_type) {
            obj.insert(key, json!(v));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_engineered_features() {
        let weather = WeatherFeatures {
            temperature: 30.0,
            humidity: 80.0,
            wind_speed: 20.0,
            pressure: 990.0,
            precipitation: 0.0,
        };
        let f = severity_features(&weather, DisasterType::Hurricane);
        assert_eq!(f.wind_humidity_idx, 16.0);
        assert!((f.pressure_drop - 23.25).abs() < 1e-9);
        assert_eq!(f.temp_deviation, 5.0);
    }

    #[test]
    fn test_one_hot_encoding() {
        let f = severity_features(&WeatherFeatures::default(), DisasterType::Flood);
        let value = f.to_value();
        assert_eq!(value["type_flood"], 1.0);
        assert_eq!(value["type_earthquake"], 0.0);
        // All nine vocabulary keys present
        let count = value
            .as_object()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with("type_"))
            .count();
        assert_eq!(count, 9);
    }

    #[test]
    fn test_one_hot_other_is_all_zero() {
        let f = impact_features(Severity::High, None, DisasterType::Other);
        let value = f.to_value();
        let sum: f64 = value
            .as_object()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with("type_"))
            .map(|(_, v)| v.as_f64().unwrap())
            .sum();
        assert_eq!(sum, 0.0);
    }

    #[test]
    fn test_spread_area_from_magnitude() {
        let f = spread_features(Some(6.4), &WeatherFeatures::default(), DisasterType::Earthquake);
        assert!((f.current_area - 32.0).abs() < 1e-9);

        let f = spread_features(None, &WeatherFeatures::default(), DisasterType::Wildfire);
        assert_eq!(f.current_area, 50.0);
    }

    #[test]
    fn test_spread_defaults() {
        let f = spread_features(None, &WeatherFeatures::default(), DisasterType::Flood);
        assert_eq!(f.wind_direction, 180.0);
        assert_eq!(f.elevation_m, 500.0);
        assert_eq!(f.vegetation_density, 0.5);
        assert_eq!(f.days_active, 1.0);
        assert_eq!(f.terrain, TerrainType::Flat);
    }

    #[test]
    fn test_impact_population_default() {
        assert_eq!(
            impact_features(Severity::Low, None, DisasterType::Flood).affected_population,
            10_000.0
        );
        assert_eq!(
            impact_features(Severity::Low, Some(0), DisasterType::Flood).affected_population,
            10_000.0
        );
        assert_eq!(
            impact_features(Severity::Low, Some(250_000), DisasterType::Flood).affected_population,
            250_000.0
        );
    }

    #[test]
    fn test_severity_score_map() {
        assert_eq!(impact_features(Severity::Low, None, DisasterType::Flood).severity_score, 1.0);
        assert_eq!(
            impact_features(Severity::Critical, None, DisasterType::Flood).severity_score,
            4.0
        );
    }

    #[test]
    fn test_terrain_index_order() {
        assert_eq!(TerrainType::Flat.index(), 0);
        assert_eq!(TerrainType::Coastal.index(), 5);
    }
}
