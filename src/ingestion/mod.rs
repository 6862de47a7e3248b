//! Multi-source feed ingestion
//!
//! Five external feeds (geophysical, humanitarian RSS, satellite hotspot,
//! weather, social SOS) are polled on independent schedules, normalized
//! into the common event model, deduplicated, and persisted. Every
//! adapter falls back to the deterministic mock generator when its
//! credentials are missing or the upstream call fails, so the full
//! cascade stays exercisable without any API keys.

pub mod alerts;
pub mod dedup;
pub mod firms;
pub mod gdacs;
pub mod mock;
pub mod orchestrator;
pub mod social;
pub mod usgs;
pub mod weather;

pub use alerts::AlertDispatcher;
pub use dedup::Deduplicator;
pub use orchestrator::{IngestionOrchestrator, OrchestratorStatus, PollOutput, SourceState};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{EventType, IngestedEvent, Severity, SourceName};

/// A normalized candidate event before dedup and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Deterministic upstream identity; the dedup key.
    pub external_id: String,
    pub event_type: EventType,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
    pub raw_payload: Value,
}

/// Errors surfaced by feed adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Upstream(reqwest::StatusCode),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

/// Contract shared by the event-producing feeds.
///
/// `poll()` fetches, normalizes, deduplicates, and persists one batch,
/// returning only the newly stored rows. The weather and satellite feeds
/// persist observations instead of events and expose their own typed poll
/// methods.
#[async_trait]
pub trait FeedAdapter: Send + Sync {
    fn source_name(&self) -> SourceName;

    async fn poll(&self) -> Result<Vec<IngestedEvent>, AdapterError>;
}

/// Look up a feed's registry row, creating it on first use.
///
/// Returns the row id. Every adapter calls this before its first write so
/// the status surface always has a row to update.
pub(crate) fn ensure_source(
    store: &crate::store::StoreGateway,
    name: SourceName,
    source_type: &str,
    base_url: &str,
    poll_interval_s: u64,
) -> Result<String, crate::store::StoreError> {
    use crate::store::{Filter, Query};
    use crate::types::SourceRegistry;

    let sources = store.collection::<SourceRegistry>()?;
    if let Some(row) = sources.maybe_single(
        &Query::new().filter(Filter::eq("source_name", name.as_str())),
    )? {
        return Ok(row.id);
    }

    let row = SourceRegistry {
        id: crate::types::new_id(),
        source_name: name,
        source_type: source_type.to_string(),
        base_url: base_url.to_string(),
        is_active: true,
        poll_interval_s,
        last_polled_at: None,
        last_status: None,
        last_error: None,
    };
    sources.insert(&row)?;
    tracing::info!(source = %name, "Registered data source");
    Ok(row.id)
}
