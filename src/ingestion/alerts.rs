//! Severity-gated alert dispatch
//!
//! When an event's severity equals the configured threshold, every
//! ngo/admin contact gets a notification: email when a provider key and
//! recipient address exist, otherwise a durable log-only record. Every
//! attempt is persisted; a failed send is an operator signal, not a retry
//! trigger.

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use crate::store::{Filter, Query, StoreGateway};
use crate::types::{
    new_id, AlertNotification, Contact, IngestedEvent, NotificationChannel, NotificationStatus,
};

use super::usgs::http_client;

/// Error body excerpt length kept on failed sends.
const ERROR_EXCERPT_LEN: usize = 300;

/// Description excerpt length included in alert bodies.
const BODY_DESCRIPTION_LEN: usize = 500;

/// Dispatches threshold-gated notifications and logs every attempt.
pub struct AlertDispatcher {
    store: StoreGateway,
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    from_email: String,
}

impl AlertDispatcher {
    pub fn new(store: StoreGateway) -> Self {
        let cfg = &crate::config::get().alerts;
        Self {
            store,
            http: http_client(15),
            api_key: cfg.sendgrid_api_key.clone(),
            endpoint: cfg.sendgrid_endpoint.clone(),
            from_email: cfg.from_email.clone(),
        }
    }

    /// Notify all ngo/admin recipients if the event severity matches the
    /// configured threshold; returns the persisted notification rows.
    pub async fn evaluate_and_notify(
        &self,
        event: &IngestedEvent,
        disaster_id: Option<&str>,
        prediction_id: Option<&str>,
    ) -> Vec<AlertNotification> {
        let threshold = crate::config::get().alerts.severity_threshold;
        if event.severity != threshold {
            return Vec::new();
        }

        let recipients = match self.ngo_recipients() {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "Failed to load alert recipients");
                return Vec::new();
            }
        };
        if recipients.is_empty() {
            warn!("No ngo/admin recipients configured for alerts");
            return Vec::new();
        }

        let mut notifications = Vec::with_capacity(recipients.len());
        for recipient in &recipients {
            let notification = self
                .send(event, disaster_id, prediction_id, recipient)
                .await;
            notifications.push(notification);
        }
        notifications
    }

    fn ngo_recipients(&self) -> Result<Vec<Contact>, crate::store::StoreError> {
        self.store.collection::<Contact>()?.find(
            &Query::new().filter(Filter::is_in(
                "role",
                vec![json!("ngo"), json!("admin")],
            )),
        )
    }

    /// One dispatch attempt for one recipient, with log fallback.
    async fn send(
        &self,
        event: &IngestedEvent,
        disaster_id: Option<&str>,
        prediction_id: Option<&str>,
        recipient: &Contact,
    ) -> AlertNotification {
        let subject = format!("CRITICAL ALERT: {}", event.title);
        let body = build_body(event);

        let mut notification = AlertNotification {
            id: new_id(),
            event_id: Some(event.id.clone()),
            disaster_id: disaster_id.map(String::from),
            prediction_id: prediction_id.map(String::from),
            recipient: recipient.email.clone().unwrap_or_default(),
            recipient_role: recipient.role.clone(),
            subject: subject.clone(),
            body: body.clone(),
            severity: event.severity,
            channel: NotificationChannel::Log,
            status: NotificationStatus::Pending,
            external_ref: None,
            error_message: None,
            created_at: Utc::now(),
            sent_at: None,
        };

        match (&recipient.email, self.api_key.is_empty()) {
            (Some(email), false) => {
                notification.channel = NotificationChannel::Email;
                match self.send_email(email, &subject, &body).await {
                    Ok(message_id) => {
                        notification.status = NotificationStatus::Sent;
                        notification.external_ref = Some(message_id);
                        notification.sent_at = Some(Utc::now());
                    }
                    Err(err) => {
                        notification.status = NotificationStatus::Failed;
                        notification.error_message = Some(err);
                    }
                }
            }
            _ => {
                // Log-only fallback; the row still lands in the store for
                // dashboard visibility.
                notification.channel = NotificationChannel::Log;
                notification.status = NotificationStatus::Logged;
                warn!(
                    subject = %subject,
                    recipient = %notification.recipient,
                    "CRITICAL ALERT (log-only, no email provider configured)"
                );
            }
        }

        // Best-effort persistence: one bad row must not block the rest of
        // the recipient list.
        if let Err(e) = self
            .store
            .collection::<AlertNotification>()
            .and_then(|c| c.insert(&notification))
        {
            error!(error = %e, "Failed to persist alert notification");
        }
        notification
    }

    /// Whether an email provider is configured.
    pub fn email_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Send a non-alert report email through the provider. Used by the
    /// situation-report task.
    pub async fn send_report_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, String> {
        self.send_email(to, subject, body).await
    }

    /// POST to the email provider. Ok(message id) on 2xx, Err(truncated
    /// body) otherwise.
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<String, String> {
        let payload = json!({
            "personalizations": [{"to": [{"email": to}]}],
            "from": {"email": self.from_email, "name": "Disaster Management Alerts"},
            "subject": subject,
            "content": [
                {"type": "text/plain", "value": body},
                {"type": "text/html", "value": html_body(subject, body)},
            ],
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if resp.status().is_success() {
            let message_id = resp
                .headers()
                .get("X-Message-Id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            info!(recipient = to, message_id = %message_id, "Alert email sent");
            Ok(message_id)
        } else {
            let status = resp.status();
            let excerpt: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(ERROR_EXCERPT_LEN)
                .collect();
            error!(%status, error = %excerpt, "Email provider rejected alert");
            Err(excerpt)
        }
    }
}

/// Plain-text alert body.
fn build_body(event: &IngestedEvent) -> String {
    let mut lines = vec![
        "CRITICAL DISASTER ALERT".to_string(),
        String::new(),
        format!("Event: {}", event.title),
        format!("Severity: {}", event.severity.to_string().to_uppercase()),
        format!("Type: {}", event.event_type),
    ];
    if let (Some(lat), Some(lon)) = (event.latitude, event.longitude) {
        lines.push(format!("Location: {lat:.4}, {lon:.4}"));
    }
    if let Some(place) = &event.location_name {
        lines.push(format!("Place: {place}"));
    }
    if !event.description.is_empty() {
        lines.push(String::new());
        lines.push(event.description.chars().take(BODY_DESCRIPTION_LEN).collect());
    }
    lines.push(String::new());
    lines.push("Please log in to the Disaster Management Platform for full details.".into());
    lines.join("\n")
}

/// HTML variant; user-controlled content is escaped.
fn html_body(subject: &str, plain_body: &str) -> String {
    let escaped = escape_html(plain_body);
    let subject = escape_html(subject);
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <div style="background: #dc2626; color: white; padding: 16px; border-radius: 8px 8px 0 0;">
    <h2 style="margin: 0;">{subject}</h2>
  </div>
  <div style="background: #fef2f2; padding: 20px; border: 1px solid #fecaca; border-radius: 0 0 8px 8px;">
    <pre style="white-space: pre-wrap; font-family: Arial, sans-serif; font-size: 14px;">{escaped}</pre>
  </div>
</div>"#
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventType, Severity};

    fn make_event(severity: Severity) -> IngestedEvent {
        IngestedEvent {
            id: new_id(),
            source_id: "src".into(),
            external_id: "gdacs-TC-12345".into(),
            event_type: EventType::GdacsAlert,
            title: "TC Maria".into(),
            description: "Tropical cyclone approaching <coast>.".into(),
            severity,
            latitude: Some(-18.0),
            longitude: Some(178.0),
            location_name: Some("Fiji".into()),
            raw_payload: json!({}),
            ingested_at: Utc::now(),
            processed: false,
            processed_at: None,
            disaster_id: None,
            prediction_ids: Vec::new(),
        }
    }

    fn seed_contact(store: &StoreGateway, id: &str, role: &str, email: Option<&str>) {
        store
            .collection::<Contact>()
            .unwrap()
            .insert(&Contact {
                id: id.into(),
                email: email.map(String::from),
                phone: None,
                role: role.into(),
                full_name: format!("Contact {id}"),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_below_threshold_sends_nothing() {
        let store = StoreGateway::open_temporary().unwrap();
        seed_contact(&store, "c1", "ngo", Some("ngo@example.org"));
        let dispatcher = AlertDispatcher::new(store.clone());

        let sent = dispatcher
            .evaluate_and_notify(&make_event(Severity::High), None, None)
            .await;
        assert!(sent.is_empty());
        let rows = store
            .collection::<AlertNotification>()
            .unwrap()
            .count(&Filter::All)
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_critical_event_notifies_each_recipient() {
        let store = StoreGateway::open_temporary().unwrap();
        seed_contact(&store, "c1", "ngo", Some("ngo@example.org"));
        seed_contact(&store, "c2", "admin", Some("admin@example.org"));
        seed_contact(&store, "c3", "donor", Some("donor@example.org"));
        let dispatcher = AlertDispatcher::new(store.clone());

        let sent = dispatcher
            .evaluate_and_notify(&make_event(Severity::Critical), Some("d-1"), Some("p-1"))
            .await;

        // donors are not alert recipients
        assert_eq!(sent.len(), 2);
        for n in &sent {
            // No provider key in tests: log fallback
            assert_eq!(n.status, NotificationStatus::Logged);
            assert_eq!(n.channel, NotificationChannel::Log);
            assert_eq!(n.disaster_id.as_deref(), Some("d-1"));
            assert_eq!(n.prediction_id.as_deref(), Some("p-1"));
        }

        let rows = store
            .collection::<AlertNotification>()
            .unwrap()
            .count(&Filter::All)
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn test_no_recipients_no_rows() {
        let store = StoreGateway::open_temporary().unwrap();
        let dispatcher = AlertDispatcher::new(store.clone());
        let sent = dispatcher
            .evaluate_and_notify(&make_event(Severity::Critical), None, None)
            .await;
        assert!(sent.is_empty());
    }

    #[test]
    fn test_body_contents() {
        let body = build_body(&make_event(Severity::Critical));
        assert!(body.contains("Event: TC Maria"));
        assert!(body.contains("Severity: CRITICAL"));
        assert!(body.contains("Type: gdacs_alert"));
        assert!(body.contains("Location: -18.0000, 178.0000"));
        assert!(body.contains("Place: Fiji"));
    }

    #[test]
    fn test_html_escapes_user_content() {
        let html = html_body("Alert <1>", "line with <script> & stuff");
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("Alert &lt;1&gt;"));
        assert!(!html.contains("<script>"));
    }
}
