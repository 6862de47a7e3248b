//! Humanitarian RSS feed adapter
//!
//! Polls a GDACS-style RSS feed for disaster alerts. Each `<item>`
//! carries namespaced event metadata (`gdacs:eventtype`,
//! `gdacs:alertlevel`, `gdacs:eventid`) plus WGS-84 coordinates; alert
//! levels map onto our severity ladder and event-type codes onto the
//! disaster taxonomy.

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::json;
use tracing::{info, warn};

use crate::store::StoreGateway;
use crate::types::{DisasterType, EventType, IngestedEvent, Severity, SourceName};

use super::dedup::Deduplicator;
use super::mock::MockGenerator;
use super::usgs::http_client;
use super::{ensure_source, AdapterError, FeedAdapter, NormalizedEvent};

/// Alert level → severity. Green alerts are still worth tracking.
fn alert_level_severity(level: &str) -> Severity {
    match level {
        "Red" => Severity::Critical,
        "Orange" => Severity::High,
        "Green" => Severity::Medium,
        _ => Severity::Medium,
    }
}

/// One `<item>` under construction while walking the XML.
#[derive(Default)]
struct ItemFields {
    title: Option<String>,
    description: Option<String>,
    link: Option<String>,
    pub_date: Option<String>,
    event_type: Option<String>,
    alert_level: Option<String>,
    event_id: Option<String>,
    severity_value: Option<String>,
    population: Option<String>,
    lat: Option<String>,
    lon: Option<String>,
}

impl ItemFields {
    fn finish(self) -> Option<NormalizedEvent> {
        let event_type = self.event_type.unwrap_or_default();
        let event_id = self.event_id?;
        let severity = alert_level_severity(self.alert_level.as_deref().unwrap_or(""));
        let mapped = DisasterType::from_gdacs_code(&event_type);
        let title = self.title.unwrap_or_else(|| "GDACS Alert".into());

        Some(NormalizedEvent {
            external_id: format!("gdacs-{event_type}-{event_id}"),
            event_type: EventType::GdacsAlert,
            description: self.description.unwrap_or_default(),
            severity,
            latitude: self.lat.and_then(|s| s.parse().ok()),
            longitude: self.lon.and_then(|s| s.parse().ok()),
            // Alert titles usually carry the place name
            location_name: Some(title.clone()),
            raw_payload: json!({
                "link": self.link,
                "pub_date": self.pub_date,
                "gdacs_event_type": event_type,
                "gdacs_alert_level": self.alert_level,
                "gdacs_event_id": event_id,
                "gdacs_severity": self.severity_value,
                "gdacs_population": self.population,
                "disaster_type_mapped": mapped.as_str(),
            }),
            title,
        })
    }
}

/// Parse an RSS document into normalized alert candidates.
///
/// Items missing an event id are dropped; malformed XML past the last
/// complete item just truncates the batch.
pub(crate) fn parse_feed(xml: &str) -> Vec<NormalizedEvent> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<ItemFields> = None;
    let mut tag_path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    current = Some(ItemFields::default());
                }
                tag_path.push(name);
            }
            Ok(Event::Text(t)) => {
                let Some(item) = current.as_mut() else { continue };
                let Some(tag) = tag_path.last() else { continue };
                let text = match t.unescape() {
                    Ok(s) => s.trim().to_string(),
                    Err(_) => continue,
                };
                if text.is_empty() {
                    continue;
                }
                match tag.as_str() {
                    "title" => item.title = Some(text),
                    "description" => item.description = Some(text),
                    "link" => item.link = Some(text),
                    "pubDate" => item.pub_date = Some(text),
                    "gdacs:eventtype" => item.event_type = Some(text),
                    "gdacs:alertlevel" => item.alert_level = Some(text),
                    "gdacs:eventid" => item.event_id = Some(text),
                    "gdacs:severity" => item.severity_value = Some(text),
                    "gdacs:population" => item.population = Some(text),
                    "geo:lat" => item.lat = Some(text),
                    "geo:long" => item.lon = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                tag_path.pop();
                if name == "item" {
                    if let Some(parsed) = current.take().and_then(ItemFields::finish) {
                        items.push(parsed);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "RSS parse error — keeping items parsed so far");
                break;
            }
            _ => {}
        }
    }
    items
}

/// Polls the humanitarian RSS feed for new disaster alerts.
pub struct GdacsAdapter {
    store: StoreGateway,
    dedup: Deduplicator,
    mock: Arc<MockGenerator>,
    http: reqwest::Client,
    feed_url: String,
}

impl GdacsAdapter {
    pub fn new(store: StoreGateway, mock: Arc<MockGenerator>) -> Self {
        Self {
            dedup: Deduplicator::new(store.clone()),
            store,
            mock,
            http: http_client(30),
            feed_url: crate::config::get().ingestion.gdacs_rss_url.clone(),
        }
    }

    async fn fetch_feed(&self) -> Result<String, AdapterError> {
        let resp = self.http.get(&self.feed_url).send().await?;
        if !resp.status().is_success() {
            return Err(AdapterError::Upstream(resp.status()));
        }
        Ok(resp.text().await?)
    }

    fn source_id(&self) -> Result<String, AdapterError> {
        Ok(ensure_source(
            &self.store,
            SourceName::Gdacs,
            "rss_feed",
            "https://www.gdacs.org/xml/rss.xml",
            crate::config::get().ingestion.gdacs_poll_interval_s,
        )?)
    }
}

#[async_trait]
impl FeedAdapter for GdacsAdapter {
    fn source_name(&self) -> SourceName {
        SourceName::Gdacs
    }

    async fn poll(&self) -> Result<Vec<IngestedEvent>, AdapterError> {
        let cap = crate::config::get().ingestion.max_events_per_poll;
        let mut items = match self.fetch_feed().await {
            Ok(xml) => {
                let parsed = parse_feed(&xml);
                if parsed.is_empty() {
                    info!("Humanitarian feed returned 0 items — generating mock events");
                    self.mock.gdacs_events(None)
                } else {
                    parsed
                }
            }
            Err(e) => {
                warn!(error = %e, "Humanitarian RSS unreachable — using mock disaster data");
                self.mock.gdacs_events(None)
            }
        };
        items.truncate(cap);

        let source_id = self.source_id()?;
        let new_events = self.dedup.store_events(&source_id, items)?;
        info!(new = new_events.len(), "Humanitarian RSS poll complete");
        Ok(new_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:gdacs="http://www.gdacs.org" xmlns:geo="http://www.w3.org/2003/01/geo/wgs84_pos#">
  <channel>
    <title>GDACS</title>
    <item>
      <title>TC Maria</title>
      <description>Tropical cyclone approaching Fiji.</description>
      <link>https://www.gdacs.org/report.aspx?eventid=12345</link>
      <pubDate>Mon, 20 Jan 2026 06:00:00 GMT</pubDate>
      <gdacs:eventtype>TC</gdacs:eventtype>
      <gdacs:alertlevel>Red</gdacs:alertlevel>
      <gdacs:eventid>12345</gdacs:eventid>
      <gdacs:severity>Category 4</gdacs:severity>
      <gdacs:population>250000</gdacs:population>
      <geo:lat>-18.0</geo:lat>
      <geo:long>178.0</geo:long>
    </item>
    <item>
      <title>Flood in Delta</title>
      <gdacs:eventtype>FL</gdacs:eventtype>
      <gdacs:alertlevel>Green</gdacs:alertlevel>
      <gdacs:eventid>67890</gdacs:eventid>
    </item>
    <item>
      <title>No id — dropped</title>
      <gdacs:eventtype>EQ</gdacs:eventtype>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_items() {
        let items = parse_feed(SAMPLE_RSS);
        assert_eq!(items.len(), 2);

        let tc = &items[0];
        assert_eq!(tc.external_id, "gdacs-TC-12345");
        assert_eq!(tc.severity, Severity::Critical);
        assert_eq!(tc.title, "TC Maria");
        assert_eq!(tc.latitude, Some(-18.0));
        assert_eq!(tc.longitude, Some(178.0));
        assert_eq!(tc.raw_payload["disaster_type_mapped"], "hurricane");
        assert_eq!(tc.raw_payload["gdacs_population"], "250000");

        let fl = &items[1];
        assert_eq!(fl.external_id, "gdacs-FL-67890");
        assert_eq!(fl.severity, Severity::Medium);
        assert_eq!(fl.raw_payload["disaster_type_mapped"], "flood");
        assert!(fl.latitude.is_none());
    }

    #[test]
    fn test_alert_level_map() {
        assert_eq!(alert_level_severity("Red"), Severity::Critical);
        assert_eq!(alert_level_severity("Orange"), Severity::High);
        assert_eq!(alert_level_severity("Green"), Severity::Medium);
        assert_eq!(alert_level_severity(""), Severity::Medium);
    }

    #[test]
    fn test_parse_empty_feed() {
        assert!(parse_feed("<rss><channel></channel></rss>").is_empty());
    }

    #[test]
    fn test_parse_malformed_keeps_complete_items() {
        // Truncated mid-item: the complete first item survives
        let cut = SAMPLE_RSS
            .split("<gdacs:eventid>67890")
            .next()
            .unwrap();
        let items = parse_feed(cut);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].external_id, "gdacs-TC-12345");
    }
}
