//! Daily situation report
//!
//! Wakes at a configured UTC hour, gathers a cross-store operational
//! snapshot (active disasters, resource utilization, open requests,
//! prediction and anomaly summaries, recent ingestion volume), renders a
//! markdown report, and persists it. Cron policy: compute the next UTC
//! target, sleep the delta, run; on error sleep one hour and retry.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::ingestion::AlertDispatcher;
use crate::store::{Filter, Query, StoreGateway};
use crate::types::{
    new_id, AnomalyAlert, Disaster, IngestedEvent, Prediction, Resource, ResourceRequest,
    SituationReport,
};

/// Daily situation-report task.
pub struct SitrepTask {
    store: StoreGateway,
    alerts: AlertDispatcher,
}

impl SitrepTask {
    pub fn new(store: StoreGateway) -> Self {
        Self {
            alerts: AlertDispatcher::new(store.clone()),
            store,
        }
    }

    /// Run daily at the configured hour until cancelled.
    pub async fn run_daily(self, cancel: CancellationToken) {
        let hour = crate::config::get().sitrep.cron_hour_utc;
        info!(hour_utc = hour, "Situation report task started");

        loop {
            let delta = sleep_until_next(Utc::now(), hour);
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Situation report task stopped");
                    return;
                }
                () = tokio::time::sleep(delta) => {}
            }

            match self.generate_report("daily", "system").await {
                Ok(report) => info!(report_id = %report.id, "Daily situation report generated"),
                Err(e) => {
                    error!(error = %e, "Situation report failed — retrying in one hour");
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        () = tokio::time::sleep(std::time::Duration::from_secs(3600)) => {}
                    }
                }
            }
        }
    }

    /// Gather, render, persist, and optionally email one report.
    pub async fn generate_report(
        &self,
        report_type: &str,
        generated_by: &str,
    ) -> Result<SituationReport, crate::store::StoreError> {
        let data = self.gather_all_data()?;
        let content_markdown = render_markdown(&data, report_type);

        let report = SituationReport {
            id: new_id(),
            report_type: report_type.to_string(),
            generated_by: generated_by.to_string(),
            content_markdown: content_markdown.clone(),
            data,
            created_at: Utc::now(),
        };
        self.store.collection::<SituationReport>()?.insert(&report)?;

        let sitrep_cfg = &crate::config::get().sitrep;
        if sitrep_cfg.email_enabled && self.alerts.email_configured() {
            let subject = format!(
                "Situation Report — {}",
                report.created_at.format("%Y-%m-%d")
            );
            for email in &sitrep_cfg.admin_emails {
                if let Err(e) = self
                    .alerts
                    .send_report_email(email, &subject, &content_markdown)
                    .await
                {
                    warn!(recipient = %email, error = %e, "Situation report email failed");
                }
            }
        }

        Ok(report)
    }

    fn gather_all_data(&self) -> Result<Value, crate::store::StoreError> {
        let since_24h = (Utc::now() - ChronoDuration::hours(24)).to_rfc3339();

        // Active disasters
        let disasters = self
            .store
            .collection::<Disaster>()?
            .find(&Query::new().filter(Filter::eq("status", "active")).limit(50))?;
        let disaster_rows: Vec<Value> = disasters
            .iter()
            .map(|d| {
                json!({
                    "id": d.id,
                    "type": d.disaster_type.as_str(),
                    "severity": d.severity.as_str(),
                    "title": d.title,
                })
            })
            .collect();

        // Resource utilization by status
        let resources = self.store.collection::<Resource>()?;
        let available = resources.count(&Filter::eq("status", "available"))?;
        let allocated = resources.count(&Filter::eq("status", "allocated"))?;
        let in_transit = resources.count(&Filter::eq("status", "in_transit"))?;
        let deployed = resources.count(&Filter::eq("status", "deployed"))?;

        // Open requests by priority
        let requests = self.store.collection::<ResourceRequest>()?;
        let pending = requests.count(&Filter::eq("status", "pending"))?;
        let pending_critical = requests.count(&Filter::and(vec![
            Filter::eq("status", "pending"),
            Filter::eq("priority", "critical"),
        ]))?;

        // Predictions in the last day
        let predictions = self
            .store
            .collection::<Prediction>()?
            .count(&Filter::gte("created_at", since_24h.as_str()))?;

        // Ingestion volume in the last day
        let ingested = self
            .store
            .collection::<IngestedEvent>()?
            .count(&Filter::gte("ingested_at", since_24h.as_str()))?;

        // Anomalies still active
        let anomalies = self
            .store
            .collection::<AnomalyAlert>()?
            .count(&Filter::eq("status", "active"))?;

        Ok(json!({
            "active_disasters": disaster_rows,
            "resources": {
                "available": available,
                "allocated": allocated,
                "in_transit": in_transit,
                "deployed": deployed,
            },
            "requests": {
                "pending": pending,
                "pending_critical": pending_critical,
            },
            "predictions_24h": predictions,
            "ingested_events_24h": ingested,
            "active_anomalies": anomalies,
        }))
    }
}

/// Next wake-up delta for the given target hour.
fn sleep_until_next(now: DateTime<Utc>, hour_utc: u32) -> std::time::Duration {
    let today_target = now
        .date_naive()
        .and_hms_opt(hour_utc.min(23), 0, 0)
        .unwrap_or_else(|| now.naive_utc())
        .and_utc();
    let target = if today_target > now {
        today_target
    } else {
        today_target + ChronoDuration::days(1)
    };
    (target - now)
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(3600))
}

fn render_markdown(data: &Value, report_type: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# Situation Report ({report_type})\n\nGenerated: {}\n\n",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));

    out.push_str("## Active Disasters\n\n");
    match data["active_disasters"].as_array() {
        Some(rows) if !rows.is_empty() => {
            for d in rows {
                out.push_str(&format!(
                    "- **{}** [{}] — {}\n",
                    d["title"].as_str().unwrap_or("?"),
                    d["severity"].as_str().unwrap_or("?"),
                    d["type"].as_str().unwrap_or("?"),
                ));
            }
        }
        _ => out.push_str("No active disasters.\n"),
    }

    let r = &data["resources"];
    out.push_str(&format!(
        "\n## Resources\n\n\
         | Status | Count |\n|---|---|\n\
         | Available | {} |\n| Allocated | {} |\n| In transit | {} |\n| Deployed | {} |\n",
        r["available"], r["allocated"], r["in_transit"], r["deployed"],
    ));

    out.push_str(&format!(
        "\n## Open Requests\n\nPending: {} (critical: {})\n",
        data["requests"]["pending"], data["requests"]["pending_critical"],
    ));

    out.push_str(&format!(
        "\n## Last 24 Hours\n\nEvents ingested: {}\nPredictions generated: {}\nActive anomalies: {}\n",
        data["ingested_events_24h"], data["predictions_24h"], data["active_anomalies"],
    ));

    out
}
