//! Resource inventory, allocation, and victim-request records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Severity;

/// Allocation lifecycle of a depot resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Available,
    Allocated,
    InTransit,
    Deployed,
}

/// A depot resource row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub quantity: f64,
    /// 1-10 operator priority.
    pub priority: u8,
    pub status: ResourceStatus,
    pub location_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Set for perishables; drives the solver's expiry bonus.
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    /// Set when the solver commits this resource to a disaster.
    #[serde(default)]
    pub disaster_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A committed (resource → need) binding with its computed delivery
/// distance. The solver never produces overlapping claims on one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: String,
    pub resource_id: String,
    #[serde(default)]
    pub disaster_id: Option<String>,
    pub need_type: String,
    pub quantity: f64,
    pub distance_km: f64,
    pub created_at: DateTime<Utc>,
}

/// Workflow state of a victim-submitted request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Assigned,
    InProgress,
    Completed,
    Rejected,
}

/// A victim-submitted resource request with its NLP triage results.
///
/// Editable only while `status == Pending`; cancellation of a non-pending
/// request transitions it to `Rejected`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub id: String,
    #[serde(default)]
    pub requester_id: Option<String>,
    pub description: String,
    #[serde(default)]
    pub items: Vec<String>,
    /// Primary resource type derived by the NLP engine.
    #[serde(default)]
    pub resource_type: Option<String>,
    pub quantity: u32,
    pub priority: Severity,
    pub status: RequestStatus,
    /// Full classification result, persisted opaquely.
    #[serde(default)]
    pub nlp_classification: Value,
    #[serde(default)]
    pub urgency_signals: Vec<Value>,
    #[serde(default)]
    pub ai_confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
