//! Prediction serving — feature assembly, model contracts, persistence
//!
//! Adapts normalized events plus weather context into per-model feature
//! vectors, invokes the three serving models (severity, spread, impact),
//! and persists one Prediction row per model.

pub mod client;
pub mod features;
pub mod models;

pub use client::PredictionClient;
pub use features::{
    impact_features, severity_features, spread_features, ImpactFeatures, SeverityFeatures,
    SpreadFeatures, TerrainType,
};
pub use models::{
    needs_retrain, ImpactModel, ModelQualityMetrics, ModelRegistry, SeverityModel, SpreadModel,
};
