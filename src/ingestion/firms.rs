//! Satellite hotspot feed adapter
//!
//! Fetches active fire detections as CSV and persists them as satellite
//! observations. Hotspots never create disasters directly; they feed the
//! spread predictor for nearby active disasters.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::store::{Filter, Query, StoreGateway};
use crate::types::{new_id, HotspotConfidence, SatelliteObservation, SourceName};

use super::dedup::Deduplicator;
use super::mock::MockGenerator;
use super::usgs::http_client;
use super::{ensure_source, AdapterError};

/// Polls the satellite hotspot CSV API.
pub struct FirmsAdapter {
    store: StoreGateway,
    dedup: Deduplicator,
    mock: Arc<MockGenerator>,
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    source: String,
}

impl FirmsAdapter {
    pub fn new(store: StoreGateway, mock: Arc<MockGenerator>) -> Self {
        let cfg = &crate::config::get().ingestion;
        Self {
            dedup: Deduplicator::new(store.clone()),
            store,
            mock,
            http: http_client(60),
            api_key: cfg.firms_api_key.clone(),
            base_url: cfg.firms_base_url.clone(),
            source: cfg.firms_source.clone(),
        }
    }

    /// Fetch hotspot data and persist new rows.
    ///
    /// `bbox` is `"west,south,east,north"`; `None` covers the world.
    pub async fn poll(
        &self,
        bbox: Option<&str>,
        days: u32,
    ) -> Result<Vec<SatelliteObservation>, AdapterError> {
        self.register()?;

        if self.api_key.is_empty() {
            info!("No satellite API key — using mock fire hotspot data");
            let hotspots = self.mock.fire_hotspots(None);
            let stored = self.dedup.store_hotspots(hotspots)?;
            info!(stored = stored.len(), "Mock hotspot poll complete");
            return Ok(stored);
        }

        match self.fetch_csv(bbox, days).await {
            Ok(csv_text) => {
                let hotspots = self.parse_csv(&csv_text);
                let stored = self.dedup.store_hotspots(hotspots)?;
                info!(stored = stored.len(), "Hotspot poll complete");
                Ok(stored)
            }
            Err(e) => {
                warn!(error = %e, "Hotspot fetch failed — using mock data");
                let stored = self.dedup.store_hotspots(self.mock.fire_hotspots(None))?;
                Ok(stored)
            }
        }
    }

    async fn fetch_csv(&self, bbox: Option<&str>, days: u32) -> Result<String, AdapterError> {
        // {base}/{key}/{source}/{bbox|world}/{days}
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.base_url,
            self.api_key,
            self.source,
            bbox.unwrap_or("world"),
            days
        );
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(AdapterError::Upstream(resp.status()));
        }
        Ok(resp.text().await?)
    }

    /// Parse the CSV body; unparseable rows are skipped, not fatal.
    fn parse_csv(&self, csv_text: &str) -> Vec<SatelliteObservation> {
        let mut lines = csv_text.lines();
        let Some(header) = lines.next() else {
            return Vec::new();
        };
        let columns: HashMap<&str, usize> = header
            .split(',')
            .enumerate()
            .map(|(i, name)| (name.trim(), i))
            .collect();

        let field = |cells: &[&str], name: &str| -> Option<String> {
            columns
                .get(name)
                .and_then(|&i| cells.get(i))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let mut observations = Vec::new();
        let mut skipped = 0usize;
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let cells: Vec<&str> = line.split(',').collect();

            let parsed = (|| -> Option<SatelliteObservation> {
                let latitude: f64 = field(&cells, "latitude")?.parse().ok()?;
                let longitude: f64 = field(&cells, "longitude")?.parse().ok()?;
                let brightness = field(&cells, "bright_ti4")
                    .or_else(|| field(&cells, "brightness"))
                    .and_then(|s| s.parse().ok());
                let frp = field(&cells, "frp").and_then(|s| s.parse().ok());
                let confidence = field(&cells, "confidence")
                    .map(|s| s.to_lowercase())
                    .and_then(|s| HotspotConfidence::parse(&s));
                let satellite = field(&cells, "satellite").unwrap_or_default();
                let instrument = field(&cells, "instrument").unwrap_or_default();
                let acq_date = field(&cells, "acq_date").unwrap_or_default();
                let acq_time = field(&cells, "acq_time").unwrap_or_else(|| "0000".into());
                let daynight = field(&cells, "daynight").unwrap_or_default();

                let acq_datetime = parse_acq_datetime(&acq_date, &acq_time);

                Some(SatelliteObservation {
                    id: new_id(),
                    source: "firms".into(),
                    external_id: format!("firms-{latitude}-{longitude}-{acq_date}-{acq_time}"),
                    latitude,
                    longitude,
                    brightness,
                    frp,
                    confidence,
                    satellite,
                    instrument,
                    acq_datetime,
                    daynight,
                    raw_payload: json!({ "line": line }),
                })
            })();

            match parsed {
                Some(obs) => observations.push(obs),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!(skipped, "Skipped unparseable hotspot rows");
        }
        observations
    }

    fn register(&self) -> Result<String, AdapterError> {
        Ok(ensure_source(
            &self.store,
            SourceName::NasaFirms,
            "csv_api",
            "https://firms.modaps.eosdis.nasa.gov/api/area/csv",
            crate::config::get().ingestion.firms_poll_interval_s,
        )?)
    }

    /// Summarize recent observations near a coordinate, as
    /// spread-predictor context.
    pub fn hotspot_summary_for_area(
        store: &StoreGateway,
        lat: f64,
        lon: f64,
        radius_deg: f64,
    ) -> Result<HotspotSummary, crate::store::StoreError> {
        let rows = store.collection::<SatelliteObservation>()?.find(
            &Query::new()
                .filter(Filter::and(vec![
                    Filter::gte("latitude", lat - radius_deg),
                    Filter::lte("latitude", lat + radius_deg),
                    Filter::gte("longitude", lon - radius_deg),
                    Filter::lte("longitude", lon + radius_deg),
                ]))
                .order_desc("acq_datetime")
                .limit(100),
        )?;

        let count = rows.len();
        let avg_frp = if count == 0 {
            0.0
        } else {
            rows.iter().filter_map(|r| r.frp).sum::<f64>() / count as f64
        };
        let max_brightness = rows
            .iter()
            .filter_map(|r| r.brightness)
            .fold(0.0f64, f64::max);

        Ok(HotspotSummary {
            hotspot_count: count,
            avg_frp,
            max_brightness,
            latest: rows.into_iter().next(),
        })
    }
}

/// Aggregate of recent hotspots around a point.
#[derive(Debug, Clone)]
pub struct HotspotSummary {
    pub hotspot_count: usize,
    pub avg_frp: f64,
    pub max_brightness: f64,
    pub latest: Option<SatelliteObservation>,
}

/// `acq_date` + `acq_time` (HHMM) → UTC timestamp; now() when malformed.
fn parse_acq_datetime(acq_date: &str, acq_time: &str) -> DateTime<Utc> {
    let padded = format!("{acq_time:0>4}");
    NaiveDateTime::parse_from_str(&format!("{acq_date} {padded}"), "%Y-%m-%d %H%M")
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
latitude,longitude,bright_ti4,frp,confidence,satellite,instrument,acq_date,acq_time,daynight
34.05,-118.24,330.5,12.3,nominal,N20,VIIRS,2026-01-20,0312,N
-33.87,151.21,412.0,88.1,high,NOAA-20,VIIRS,2026-01-20,1545,D
bad,row,here,,,,,,,
37.98,23.73,305.2,,low,N20,VIIRS,2026-01-20,0830,D";

    fn adapter() -> FirmsAdapter {
        FirmsAdapter::new(
            StoreGateway::open_temporary().unwrap(),
            Arc::new(MockGenerator::new(1)),
        )
    }

    #[test]
    fn test_parse_csv_rows() {
        let observations = adapter().parse_csv(SAMPLE_CSV);
        assert_eq!(observations.len(), 3);

        let first = &observations[0];
        assert_eq!(first.external_id, "firms-34.05--118.24-2026-01-20-0312");
        assert_eq!(first.brightness, Some(330.5));
        assert_eq!(first.frp, Some(12.3));
        assert_eq!(first.confidence, Some(HotspotConfidence::Nominal));
        assert_eq!(first.acq_datetime.to_rfc3339(), "2026-01-20T03:12:00+00:00");

        // Missing frp parses as None, row still kept
        assert_eq!(observations[2].frp, None);
    }

    #[test]
    fn test_bad_rows_skipped() {
        let observations = adapter().parse_csv(SAMPLE_CSV);
        assert!(observations.iter().all(|o| o.latitude.abs() <= 90.0));
    }

    #[test]
    fn test_empty_csv() {
        assert!(adapter().parse_csv("").is_empty());
        assert!(adapter().parse_csv("latitude,longitude\n").is_empty());
    }

    #[test]
    fn test_acq_datetime_fallback() {
        let ts = parse_acq_datetime("not-a-date", "9999");
        // Falls back to roughly now
        assert!((Utc::now() - ts).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn test_mock_poll_persists_and_dedups() {
        let store = StoreGateway::open_temporary().unwrap();
        let adapter = FirmsAdapter::new(store.clone(), Arc::new(MockGenerator::new(11)));

        let stored = adapter.poll(None, 1).await.unwrap();
        let total = store
            .collection::<SatelliteObservation>()
            .unwrap()
            .count(&Filter::All)
            .unwrap();
        assert_eq!(stored.len(), total);

        // Registry row auto-created
        let sources = store
            .collection::<crate::types::SourceRegistry>()
            .unwrap()
            .count(&Filter::All)
            .unwrap();
        assert_eq!(sources, 1);
    }

    #[test]
    fn test_hotspot_summary() {
        let store = StoreGateway::open_temporary().unwrap();
        let generator = MockGenerator::new(3);
        let dedup = Deduplicator::new(store.clone());
        dedup.store_hotspots(generator.fire_hotspots(Some(8))).unwrap();

        // Mock hotspots cluster around known fire regions; summarize LA
        let summary =
            FirmsAdapter::hotspot_summary_for_area(&store, 34.0522, -118.2437, 1.0).unwrap();
        if summary.hotspot_count > 0 {
            assert!(summary.avg_frp > 0.0);
            assert!(summary.latest.is_some());
        }
    }
}
