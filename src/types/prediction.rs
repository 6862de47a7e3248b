//! Model prediction records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Severity;

/// The three serving models invoked per qualifying event, in this order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PredictionType {
    Severity,
    Spread,
    Impact,
}

impl std::fmt::Display for PredictionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PredictionType::Severity => "severity",
            PredictionType::Spread => "spread",
            PredictionType::Impact => "impact",
        };
        f.write_str(s)
    }
}

/// One model output, linked to a disaster and location. Immutable once
/// written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub disaster_id: String,
    pub location_id: String,
    pub prediction_type: PredictionType,
    /// The exact feature vector the model saw, for auditability.
    pub features: Value,
    /// Clamped to [0, 1] before persistence.
    pub confidence_score: f64,
    #[serde(default)]
    pub predicted_severity: Option<Severity>,
    #[serde(default)]
    pub predicted_area_km2: Option<f64>,
    #[serde(default)]
    pub ci_lower_km2: Option<f64>,
    #[serde(default)]
    pub ci_upper_km2: Option<f64>,
    #[serde(default)]
    pub predicted_casualties: Option<u64>,
    /// Estimated economic damage in million USD.
    #[serde(default)]
    pub predicted_damage_usd: Option<f64>,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
}
