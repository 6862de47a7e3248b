//! Social SOS feed adapter
//!
//! Runs a recent-search query over configured disaster keywords,
//! paginating with an in-memory since-cursor. Coordinates come from post
//! geo data or the tagged place's bounding box; severity is estimated
//! from keyword density. Disabled by default — without a bearer token the
//! mock generator stands in.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::store::StoreGateway;
use crate::types::{EventType, IngestedEvent, Severity, SourceName};

use super::dedup::Deduplicator;
use super::mock::MockGenerator;
use super::usgs::http_client;
use super::{ensure_source, AdapterError, FeedAdapter, NormalizedEvent};

const SEARCH_URL: &str = "https://api.twitter.com/2/tweets/search/recent";

const CRITICAL_WORDS: [&str; 6] = [
    "trapped",
    "dying",
    "urgent",
    "critical",
    "sos",
    "life threatening",
];

const HIGH_WORDS: [&str; 6] = [
    "help needed",
    "rescue",
    "emergency",
    "injured",
    "flood",
    "earthquake",
];

/// Keyword-density severity estimate:
/// ≥2 critical-set hits → critical; ≥1 critical or ≥2 high → high;
/// ≥1 high → medium; else low.
pub(crate) fn estimate_severity(text: &str) -> Severity {
    let text_lower = text.to_lowercase();
    let critical = CRITICAL_WORDS
        .iter()
        .filter(|w| text_lower.contains(**w))
        .count();
    let high = HIGH_WORDS.iter().filter(|w| text_lower.contains(**w)).count();

    if critical >= 2 {
        Severity::Critical
    } else if critical >= 1 || high >= 2 {
        Severity::High
    } else if high >= 1 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Polls the recent-search API for disaster-related posts.
pub struct SocialAdapter {
    store: StoreGateway,
    dedup: Deduplicator,
    mock: Arc<MockGenerator>,
    http: reqwest::Client,
    bearer_token: String,
    keywords: Vec<String>,
    /// Pagination cursor; survives across cycles within one process.
    last_since_id: Mutex<Option<String>>,
}

impl SocialAdapter {
    pub fn new(store: StoreGateway, mock: Arc<MockGenerator>) -> Self {
        let cfg = &crate::config::get().ingestion;
        Self {
            dedup: Deduplicator::new(store.clone()),
            store,
            mock,
            http: http_client(20),
            bearer_token: cfg.twitter_bearer_token.clone(),
            keywords: cfg.social_keywords.clone(),
            last_since_id: Mutex::new(None),
        }
    }

    async fn search_recent(&self) -> Result<Vec<Value>, AdapterError> {
        let query = self
            .keywords
            .iter()
            .map(|kw| format!("\"{kw}\""))
            .collect::<Vec<_>>()
            .join(" OR ")
            + " -is:retweet lang:en";

        let max_results = crate::config::get().ingestion.max_events_per_poll.min(100);
        let mut params: Vec<(String, String)> = vec![
            ("query".into(), query),
            ("max_results".into(), max_results.to_string()),
            (
                "tweet.fields".into(),
                "created_at,geo,text,author_id,public_metrics".into(),
            ),
            ("expansions".into(), "geo.place_id".into()),
            ("place.fields".into(), "full_name,geo,country".into()),
        ];
        if let Some(since) = self.last_since_id.lock().ok().and_then(|g| g.clone()) {
            params.push(("since_id".into(), since));
        }

        let resp = self
            .http
            .get(SEARCH_URL)
            .bearer_auth(&self.bearer_token)
            .query(&params)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Social search rate limit hit — will retry next cycle");
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(AdapterError::Upstream(resp.status()));
        }

        let data: Value = resp.json().await?;
        let mut tweets = data
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        // Attach place rows so coordinate extraction can use them
        let places: std::collections::HashMap<&str, &Value> = data["includes"]["places"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|p| p["id"].as_str().map(|id| (id, p)))
                    .collect()
            })
            .unwrap_or_default();
        for tweet in &mut tweets {
            let place = tweet["geo"]["place_id"]
                .as_str()
                .and_then(|id| places.get(id))
                .map(|p| (*p).clone());
            if let (Some(obj), Some(place)) = (tweet.as_object_mut(), place) {
                obj.insert("_place".into(), place);
            }
        }

        // Advance the cursor
        if let Some(newest) = data["meta"]["newest_id"].as_str() {
            if let Ok(mut guard) = self.last_since_id.lock() {
                *guard = Some(newest.to_string());
            }
        }

        Ok(tweets)
    }

    fn tweets_to_events(tweets: &[Value]) -> Vec<NormalizedEvent> {
        tweets
            .iter()
            .map(|tweet| {
                let text = tweet["text"].as_str().unwrap_or_default().to_string();
                let tweet_id = tweet["id"].as_str().unwrap_or_default().to_string();
                let (lat, lon, place_name) = Self::extract_location(tweet);

                let head: String = text.chars().take(80).collect();
                let title = if text.chars().count() > 80 {
                    format!("Social SOS: {head}...")
                } else {
                    format!("Social SOS: {head}")
                };

                NormalizedEvent {
                    external_id: format!("twitter-{tweet_id}"),
                    event_type: EventType::SocialSos,
                    title,
                    severity: estimate_severity(&text),
                    latitude: lat,
                    longitude: lon,
                    location_name: place_name,
                    raw_payload: json!({
                        "tweet_id": tweet_id,
                        "author_id": tweet["author_id"],
                        "created_at": tweet["created_at"],
                        "text": text,
                        "public_metrics": tweet["public_metrics"],
                    }),
                    description: text,
                }
            })
            .collect()
    }

    /// Best-effort coordinate + name extraction from post geo data.
    fn extract_location(tweet: &Value) -> (Option<f64>, Option<f64>, Option<String>) {
        // Exact point, GeoJSON [lon, lat]
        if let Some(coords) = tweet["geo"]["coordinates"]["coordinates"].as_array() {
            if coords.len() == 2 {
                return (coords[1].as_f64(), coords[0].as_f64(), None);
            }
        }

        // Tagged place: bounding-box centroid
        let place = &tweet["_place"];
        if let Some(bbox) = place["geo"]["bbox"].as_array() {
            if bbox.len() == 4 {
                let vals: Vec<f64> = bbox.iter().filter_map(Value::as_f64).collect();
                if vals.len() == 4 {
                    let lat = (vals[1] + vals[3]) / 2.0;
                    let lon = (vals[0] + vals[2]) / 2.0;
                    return (
                        Some(lat),
                        Some(lon),
                        place["full_name"].as_str().map(String::from),
                    );
                }
            }
        }

        (None, None, None)
    }

    fn source_id(&self) -> Result<String, AdapterError> {
        Ok(ensure_source(
            &self.store,
            SourceName::SocialMedia,
            "rest_api",
            "https://api.twitter.com/2",
            crate::config::get().ingestion.social_poll_interval_s,
        )?)
    }
}

#[async_trait]
impl FeedAdapter for SocialAdapter {
    fn source_name(&self) -> SourceName {
        SourceName::SocialMedia
    }

    async fn poll(&self) -> Result<Vec<IngestedEvent>, AdapterError> {
        let source_id = self.source_id()?;

        if self.bearer_token.is_empty() {
            info!("No social bearer token — using mock SOS data");
            let events = self.mock.social_signals(None);
            let new_events = self.dedup.store_events(&source_id, events)?;
            info!(new = new_events.len(), "Mock social poll complete");
            return Ok(new_events);
        }

        let events = match self.search_recent().await {
            Ok(tweets) => Self::tweets_to_events(&tweets),
            Err(e) => {
                warn!(error = %e, "Social search failed — falling back to mock data");
                self.mock.social_signals(None)
            }
        };
        let new_events = self.dedup.store_events(&source_id, events)?;
        info!(new = new_events.len(), "Social poll complete");
        Ok(new_events)
    }
}
