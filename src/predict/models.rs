//! Serving-model contracts and rule-based fallbacks
//!
//! The registry holds one model per prediction type behind a trait seam so
//! trained models can be slotted in without touching the client. The
//! rule-based defaults keep the full cascade functional on a fresh
//! deployment with no model artifacts.

use serde::{Deserialize, Serialize};

use crate::types::Severity;

use super::features::{ImpactFeatures, SeverityFeatures, SpreadFeatures};

/// Version string stamped on predictions from the rule-based models.
const RULE_MODEL_VERSION: &str = "1.0.0";

// ============================================================================
// Contracts
// ============================================================================

/// Severity classifier output.
#[derive(Debug, Clone, Copy)]
pub struct SeverityOutput {
    pub predicted_severity: Severity,
    pub confidence: f64,
}

/// Spread regressor output; CI bounds present only when quantile models
/// back the prediction.
#[derive(Debug, Clone, Copy)]
pub struct SpreadOutput {
    pub predicted_area_km2: f64,
    pub ci_lower_km2: Option<f64>,
    pub ci_upper_km2: Option<f64>,
    pub confidence: f64,
}

/// Impact regressor output.
#[derive(Debug, Clone, Copy)]
pub struct ImpactOutput {
    pub predicted_casualties: u64,
    /// Economic damage in million USD.
    pub predicted_damage_usd: f64,
    pub confidence: f64,
}

pub trait SeverityModel: Send + Sync {
    fn predict(&self, features: &SeverityFeatures) -> SeverityOutput;
    fn version(&self) -> &str;
}

pub trait SpreadModel: Send + Sync {
    fn predict(&self, features: &SpreadFeatures) -> SpreadOutput;
    fn version(&self) -> &str;
}

pub trait ImpactModel: Send + Sync {
    fn predict(&self, features: &ImpactFeatures) -> ImpactOutput;
    fn version(&self) -> &str;
}

// ============================================================================
// Rule-based fallbacks
// ============================================================================

/// Weighted weather score thresholded into the four severity levels.
pub struct RuleBasedSeverityModel;

impl SeverityModel for RuleBasedSeverityModel {
    fn predict(&self, f: &SeverityFeatures) -> SeverityOutput {
        let score = (f.temperature * 0.3 + f.wind_speed * 0.5 + f.humidity * 0.2) / 100.0;
        let (predicted_severity, confidence) = if score > 0.75 {
            (Severity::Critical, 0.85)
        } else if score > 0.5 {
            (Severity::High, 0.75)
        } else if score > 0.3 {
            (Severity::Medium, 0.65)
        } else {
            (Severity::Low, 0.55)
        };
        SeverityOutput {
            predicted_severity,
            confidence,
        }
    }

    fn version(&self) -> &str {
        RULE_MODEL_VERSION
    }
}

/// Wind-driven area growth.
pub struct RuleBasedSpreadModel {
    /// Symmetric quantile spread as a fraction of the point prediction,
    /// standing in for trained quantile regressors. None disables CI.
    pub quantile_spread: Option<f64>,
}

impl Default for RuleBasedSpreadModel {
    fn default() -> Self {
        Self {
            quantile_spread: None,
        }
    }
}

impl SpreadModel for RuleBasedSpreadModel {
    fn predict(&self, f: &SpreadFeatures) -> SpreadOutput {
        let spread_rate = f.wind_speed * 0.5;
        let predicted = f.current_area * (1.0 + spread_rate / 100.0);

        match self.quantile_spread {
            Some(spread) => {
                let lower = predicted * (1.0 - spread);
                let upper = predicted * (1.0 + spread);
                let width = upper - lower;
                let confidence = (1.0 - (width / predicted.max(1.0)) * 0.5).max(0.0);
                SpreadOutput {
                    predicted_area_km2: predicted,
                    ci_lower_km2: Some(lower),
                    ci_upper_km2: Some(upper),
                    confidence,
                }
            }
            None => SpreadOutput {
                predicted_area_km2: predicted,
                ci_lower_km2: None,
                ci_upper_km2: None,
                confidence: 0.7,
            },
        }
    }

    fn version(&self) -> &str {
        RULE_MODEL_VERSION
    }
}

/// Population-scaled casualty and damage expressions.
pub struct RuleBasedImpactModel;

impl ImpactModel for RuleBasedImpactModel {
    fn predict(&self, f: &ImpactFeatures) -> ImpactOutput {
        let casualty_rate = f.severity_score * 0.1;
        let casualties = (f.affected_population * casualty_rate).max(0.0) as u64;

        let damage_per_person = 5_000.0 * f.severity_score;
        let damage_musd = f.affected_population * damage_per_person / 1_000_000.0;

        ImpactOutput {
            predicted_casualties: casualties,
            predicted_damage_usd: damage_musd,
            confidence: 0.68,
        }
    }

    fn version(&self) -> &str {
        RULE_MODEL_VERSION
    }
}

// ============================================================================
// Registry
// ============================================================================

/// The three serving models the client invokes per event.
pub struct ModelRegistry {
    pub severity: Box<dyn SeverityModel>,
    pub spread: Box<dyn SpreadModel>,
    pub impact: Box<dyn ImpactModel>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self {
            severity: Box::new(RuleBasedSeverityModel),
            spread: Box::new(RuleBasedSpreadModel::default()),
            impact: Box::new(RuleBasedImpactModel),
        }
    }
}

impl ModelRegistry {
    /// Registry whose spread model emits quantile CI bounds.
    pub fn with_quantile_bounds(spread: f64) -> Self {
        Self {
            spread: Box::new(RuleBasedSpreadModel {
                quantile_spread: Some(spread),
            }),
            ..Self::default()
        }
    }
}

// ============================================================================
// Quality gate
// ============================================================================

/// Held-out evaluation metrics for one model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ModelQualityMetrics {
    /// Mean absolute error (regressors).
    pub mae: Option<f64>,
    /// Classification accuracy (classifiers).
    pub accuracy: Option<f64>,
}

/// Whether evaluation metrics warrant retraining.
///
/// Called directly by the evaluation path — there is deliberately no HTTP
/// hop between evaluation and the training subsystem.
pub fn needs_retrain(metrics: &ModelQualityMetrics) -> bool {
    let cfg = &crate::config::get().models;
    if let Some(mae) = metrics.mae {
        if mae > cfg.retrain_threshold_mae {
            return true;
        }
    }
    if let Some(accuracy) = metrics.accuracy {
        if accuracy < cfg.retrain_threshold_accuracy {
            return true;
        }
    }
    false
}
