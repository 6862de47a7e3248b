//! Ingestion orchestrator — feed scheduling and the event cascade
//!
//! Owns five independent polling loops, one per feed, each a serial
//! poll → record status → sleep cycle under a shared cancellation token,
//! so a feed never has two in-flight polls. Disaster-relevant events run
//! the strictly ordered cascade: resolve location → create disaster →
//! mark processed → weather context → predictions → gated alert.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::predict::PredictionClient;
use crate::store::{Filter, Query, StoreGateway};
use crate::types::{
    new_id, Disaster, DisasterStatus, DisasterType, EventType, IngestedEvent, Location,
    SatelliteObservation, Severity, SourceName, SourceRegistry, SourceStatus, WeatherObservation,
};

use super::alerts::AlertDispatcher;
use super::firms::FirmsAdapter;
use super::gdacs::GdacsAdapter;
use super::mock::MockGenerator;
use super::social::SocialAdapter;
use super::usgs::UsgsAdapter;
use super::weather::{latest_features_for_location, WeatherAdapter};
use super::FeedAdapter;

/// Coordinate window for reusing an existing location (degrees).
const LOCATION_MATCH_DEG: f64 = 0.5;

/// Source error messages are truncated to this length before persistence.
const ERROR_TRUNCATE_LEN: usize = 500;

/// Result of a manual one-shot poll.
#[derive(Debug)]
pub enum PollOutput {
    Events(Vec<IngestedEvent>),
    Weather(Vec<WeatherObservation>),
    Hotspots(Vec<SatelliteObservation>),
}

impl PollOutput {
    /// Rows produced, across variants.
    pub fn len(&self) -> usize {
        match self {
            PollOutput::Events(v) => v.len(),
            PollOutput::Weather(v) => v.len(),
            PollOutput::Hotspots(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-source slice of the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct SourceState {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub active: bool,
    pub last_polled: Option<DateTime<Utc>>,
    pub status: Option<SourceStatus>,
    pub error: Option<String>,
    pub interval_s: u64,
}

/// Aggregate orchestrator status.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub orchestrator_running: bool,
    pub sources: Vec<SourceState>,
}

/// Manages feed-polling loops and wires results into the prediction
/// pipeline and notification system.
pub struct IngestionOrchestrator {
    store: StoreGateway,
    usgs: UsgsAdapter,
    gdacs: GdacsAdapter,
    social: SocialAdapter,
    weather: WeatherAdapter,
    firms: FirmsAdapter,
    alerts: AlertDispatcher,
    predictions: PredictionClient,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl IngestionOrchestrator {
    pub fn new(store: StoreGateway, cancel: CancellationToken) -> Arc<Self> {
        let mock = Arc::new(MockGenerator::from_config());
        Arc::new(Self {
            usgs: UsgsAdapter::new(store.clone(), Arc::clone(&mock)),
            gdacs: GdacsAdapter::new(store.clone(), Arc::clone(&mock)),
            social: SocialAdapter::new(store.clone(), Arc::clone(&mock)),
            weather: WeatherAdapter::new(store.clone(), Arc::clone(&mock)),
            firms: FirmsAdapter::new(store.clone(), Arc::clone(&mock)),
            alerts: AlertDispatcher::new(store.clone()),
            predictions: PredictionClient::new(store.clone()),
            store,
            cancel,
            tasks: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        })
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Launch all five polling loops.
    pub fn start(self: &Arc<Self>) {
        let cfg = &crate::config::get().ingestion;
        if !cfg.enabled {
            info!("Ingestion disabled via INGESTION_ENABLED=false");
            return;
        }

        self.running.store(true, Ordering::SeqCst);
        info!("Starting ingestion orchestrator");

        let handles = vec![
            self.spawn_loop(SourceName::Openweathermap, cfg.weather_poll_interval_s),
            self.spawn_loop(SourceName::Gdacs, cfg.gdacs_poll_interval_s),
            self.spawn_loop(SourceName::UsgsEarthquakes, cfg.usgs_poll_interval_s),
            self.spawn_loop(SourceName::NasaFirms, cfg.firms_poll_interval_s),
            self.spawn_loop(SourceName::SocialMedia, cfg.social_poll_interval_s),
        ];
        if let Ok(mut tasks) = self.tasks.lock() {
            *tasks = handles;
        }
        info!("All feed loops started (mock fallback enabled for missing API keys)");
    }

    /// Cancel all polling tasks and wait for them to wind down.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        let handles = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(_) => Vec::new(),
        };
        // A panicked loop is already logged; shutdown keeps going.
        let _ = futures::future::join_all(handles).await;
        info!("Ingestion orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn spawn_loop(self: &Arc<Self>, name: SourceName, interval_s: u64) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            info!(feed = %name, interval_s, "Feed loop started");
            let interval = std::time::Duration::from_secs(interval_s.max(1));
            loop {
                match orchestrator.run_cycle(name).await {
                    Ok(()) => orchestrator.record_source_status(name, SourceStatus::Success, None),
                    Err(e) => {
                        warn!(feed = %name, error = %e, "Feed cycle error");
                        orchestrator.record_source_status(
                            name,
                            SourceStatus::Error,
                            Some(e.to_string()),
                        );
                    }
                }
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
            }
            info!(feed = %name, "Feed loop stopped");
        })
    }

    // ── Per-feed cycles ─────────────────────────────────────────────

    async fn run_cycle(&self, name: SourceName) -> anyhow::Result<()> {
        match name {
            SourceName::Openweathermap => {
                // Observations enrich prediction features; no disasters
                let observations = self.weather.poll().await?;
                tracing::debug!(observations = observations.len(), "Weather cycle complete");
            }
            SourceName::Gdacs => {
                let events = self.gdacs.poll().await?;
                for event in events {
                    self.process_disaster_event(event).await;
                }
            }
            SourceName::UsgsEarthquakes => {
                let events = self.usgs.poll().await?;
                for event in events {
                    self.process_disaster_event(event).await;
                }
            }
            SourceName::NasaFirms => {
                // Hotspots only feed the spread predictor
                self.firms.poll(None, 1).await?;
            }
            SourceName::SocialMedia => {
                let events = self.social.poll().await?;
                for event in events {
                    if event.severity >= Severity::High {
                        self.process_disaster_event(event).await;
                    } else {
                        self.alerts.evaluate_and_notify(&event, None, None).await;
                    }
                }
            }
        }
        Ok(())
    }

    // ── Event → disaster → predictions cascade ──────────────────────

    /// Run the full cascade for one qualifying event. Failures abort only
    /// the failing step's dependents per the error policy.
    async fn process_disaster_event(&self, event: IngestedEvent) {
        let Some(disaster) = self.auto_create_disaster(&event) else {
            return;
        };

        // Mark processed and link the disaster before predictions run, so
        // a prediction failure cannot re-trigger disaster creation.
        let events = match self.store.collection::<IngestedEvent>() {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "Store unavailable mid-cascade");
                return;
            }
        };
        let disaster_id = disaster.id.clone();
        let marked = events.update_where(&Filter::eq("id", event.id.as_str()), |row| {
            row.processed = true;
            row.processed_at = Some(Utc::now());
            row.disaster_id = Some(disaster_id.clone());
        });
        if let Err(e) = marked {
            error!(event_id = %event.id, error = %e, "Failed to mark event processed");
        }

        // Weather context for feature assembly; defaults when absent
        let weather = latest_features_for_location(&self.store, &disaster.location_id)
            .unwrap_or_default();

        let prediction_ids = self.predictions.run_batch(&event, &disaster, &weather);

        if !prediction_ids.is_empty() {
            let ids = prediction_ids.clone();
            if let Err(e) = events.update_where(&Filter::eq("id", event.id.as_str()), |row| {
                row.prediction_ids = ids.clone();
            }) {
                error!(event_id = %event.id, error = %e, "Failed to link prediction ids");
            }
        }

        self.alerts
            .evaluate_and_notify(
                &event,
                Some(disaster.id.as_str()),
                prediction_ids.first().map(String::as_str),
            )
            .await;
    }

    /// Create the canonical disaster record for an event.
    ///
    /// Returns None on failure — the event then stays unprocessed and is
    /// not retried automatically.
    fn auto_create_disaster(&self, event: &IngestedEvent) -> Option<Disaster> {
        let location_id = match self.find_or_create_location(event) {
            Ok(id) => id,
            Err(e) => {
                error!(event_id = %event.id, error = %e, "Failed to resolve location");
                return None;
            }
        };

        let disaster_type = event
            .raw_payload
            .get("disaster_type_mapped")
            .and_then(serde_json::Value::as_str)
            .and_then(DisasterType::parse)
            .unwrap_or(match event.event_type {
                EventType::Earthquake => DisasterType::Earthquake,
                _ => DisasterType::Other,
            });

        let now = Utc::now();
        let disaster = Disaster {
            id: new_id(),
            disaster_type,
            severity: event.severity,
            status: DisasterStatus::Active,
            title: event.title.clone(),
            description: event.description.clone(),
            location_id,
            start_date: now,
            end_date: None,
            affected_population: None,
            casualties: None,
            estimated_damage: None,
            created_at: now,
            updated_at: now,
        };

        match self
            .store
            .collection::<Disaster>()
            .and_then(|c| c.insert(&disaster))
        {
            Ok(()) => {
                info!(
                    disaster_id = %disaster.id,
                    %disaster_type,
                    source = %event.external_id,
                    "Auto-created disaster"
                );
                Some(disaster)
            }
            Err(e) => {
                error!(event_id = %event.id, error = %e, "Failed to auto-create disaster");
                None
            }
        }
    }

    /// Reuse a location within ±0.5° of the event, or mint a stub.
    fn find_or_create_location(
        &self,
        event: &IngestedEvent,
    ) -> Result<String, crate::store::StoreError> {
        let locations = self.store.collection::<Location>()?;

        if let (Some(lat), Some(lon)) = (event.latitude, event.longitude) {
            let nearby = locations.maybe_single(&Query::new().filter(Filter::and(vec![
                Filter::gte("latitude", lat - LOCATION_MATCH_DEG),
                Filter::lte("latitude", lat + LOCATION_MATCH_DEG),
                Filter::gte("longitude", lon - LOCATION_MATCH_DEG),
                Filter::lte("longitude", lon + LOCATION_MATCH_DEG),
            ])))?;
            if let Some(location) = nearby {
                return Ok(location.id);
            }
        }

        let name: String = event
            .location_name
            .clone()
            .unwrap_or_else(|| "Auto-detected Location".into())
            .chars()
            .take(255)
            .collect();
        let location = Location {
            id: new_id(),
            name,
            latitude: event.latitude.unwrap_or(0.0),
            longitude: event.longitude.unwrap_or(0.0),
            city: "Unknown".into(),
            state: "Unknown".into(),
            country: "Unknown".into(),
            created_at: Utc::now(),
        };
        locations.insert(&location)?;
        Ok(location.id)
    }

    // ── Source status bookkeeping ───────────────────────────────────

    fn record_source_status(&self, name: SourceName, status: SourceStatus, error: Option<String>) {
        let truncated = error.map(|e| e.chars().take(ERROR_TRUNCATE_LEN).collect::<String>());
        let outcome = self.store.collection::<SourceRegistry>().and_then(|c| {
            c.update_where(&Filter::eq("source_name", name.as_str()), |row| {
                row.last_polled_at = Some(Utc::now());
                row.last_status = Some(status);
                row.last_error = truncated.clone();
            })
        });
        if let Err(e) = outcome {
            tracing::debug!(source = %name, error = %e, "Failed to update source status");
        }
    }

    // ── Manual trigger surface ──────────────────────────────────────

    /// One-shot poll of a single source, returning the new rows. Does not
    /// run the disaster cascade — callers inspect raw ingestion output.
    pub async fn poll_source(&self, name: SourceName) -> anyhow::Result<PollOutput> {
        let output = match name {
            SourceName::Openweathermap => PollOutput::Weather(self.weather.poll().await?),
            SourceName::Gdacs => PollOutput::Events(self.gdacs.poll().await?),
            SourceName::UsgsEarthquakes => PollOutput::Events(self.usgs.poll().await?),
            SourceName::NasaFirms => PollOutput::Hotspots(self.firms.poll(None, 1).await?),
            SourceName::SocialMedia => PollOutput::Events(self.social.poll().await?),
        };
        self.record_source_status(name, SourceStatus::Success, None);
        Ok(output)
    }

    /// Current status of all registered sources.
    pub fn status(&self) -> Result<OrchestratorStatus, crate::store::StoreError> {
        let sources = self
            .store
            .collection::<SourceRegistry>()?
            .find(&Query::new().order_asc("source_name"))?;

        Ok(OrchestratorStatus {
            orchestrator_running: self.is_running(),
            sources: sources
                .into_iter()
                .map(|s| SourceState {
                    name: s.source_name.to_string(),
                    source_type: s.source_type,
                    active: s.is_active,
                    last_polled: s.last_polled_at,
                    status: s.last_status,
                    error: s.last_error,
                    interval_s: s.poll_interval_s,
                })
                .collect(),
        })
    }

    /// Cascade entry point for tests and replays.
    #[doc(hidden)]
    pub async fn process_event_for_test(&self, event: IngestedEvent) {
        self.process_disaster_event(event).await;
    }
}
