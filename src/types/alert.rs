//! Notification and anomaly alert records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Severity;

/// Delivery channel for an alert notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Log,
}

/// Delivery state of an alert notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Logged,
    Acknowledged,
}

/// One notification attempt per (event, recipient) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertNotification {
    pub id: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub disaster_id: Option<String>,
    #[serde(default)]
    pub prediction_id: Option<String>,
    pub recipient: String,
    pub recipient_role: String,
    pub subject: String,
    pub body: String,
    pub severity: Severity,
    pub channel: NotificationChannel,
    pub status: NotificationStatus,
    /// Provider message id when dispatch succeeded.
    #[serde(default)]
    pub external_ref: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

/// Recipient contact row (the out-of-scope user CRUD surface owns writes;
/// the dispatcher only reads role/email).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub role: String,
    pub full_name: String,
}

/// Metric family an anomaly was detected in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    ResourceConsumption,
    RequestVolume,
    SeverityEscalation,
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AnomalyType::ResourceConsumption => "resource_consumption",
            AnomalyType::RequestVolume => "request_volume",
            AnomalyType::SeverityEscalation => "severity_escalation",
        };
        f.write_str(s)
    }
}

/// Triage state of an anomaly alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    Active,
    Acknowledged,
    Resolved,
    FalsePositive,
}

/// Inlier band the anomalous metric was expected to fall in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ExpectedRange {
    pub lower: f64,
    pub upper: f64,
}

/// A detected anomaly with its explanation and triage state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyAlert {
    pub id: String,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// Feature with the largest absolute deviation from the inlier mean.
    pub metric_name: String,
    pub metric_value: f64,
    pub expected_range: ExpectedRange,
    /// More negative = more anomalous.
    pub anomaly_score: f64,
    pub context_data: Value,
    pub ai_explanation: String,
    pub status: AnomalyStatus,
    pub detected_at: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// Daily situation report assembled by the sitrep task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SituationReport {
    pub id: String,
    pub report_type: String,
    pub generated_by: String,
    pub content_markdown: String,
    /// Raw gathered metrics backing the rendered report.
    pub data: Value,
    pub created_at: DateTime<Utc>,
}
