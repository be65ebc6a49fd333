//! Notification transports.
//!
//! [`EmailJsNotifier`] relays alerts as e-mail through the EmailJS REST API.
//! [`LogNotifier`] only writes the alert to the log and is used when no
//! e-mail relay is configured.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::alert::AlertEvent;
use crate::dispatch::{MessageId, Notifier};
use crate::error::{Result, VematError};

// ---

pub const EMAILJS_SEND_URL: &str = "https://api.emailjs.com/api/v1.0/email/send";

const SUBJECT: &str = "VEMAT ALERT: favorable conditions for mosquitoes detected";

/// Per-request timeout for a single send attempt.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct EmailJsSettings {
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    pub recipients: Vec<String>,
}

pub struct EmailJsNotifier {
    client: reqwest::Client,
    url: String,
    settings: EmailJsSettings,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams,
}

#[derive(Debug, Serialize)]
struct TemplateParams {
    to_email: String,
    subject: &'static str,
    node_id: String,
    avg_temperature: String,
    avg_humidity: String,
    avg_co2: String,
    last_reading: String,
    message: String,
}

impl TemplateParams {
    fn for_event(event: &AlertEvent, recipients: &[String]) -> Self {
        Self {
            to_email: recipients.join(","),
            subject: SUBJECT,
            node_id: event.node_id.clone(),
            avg_temperature: format!("{:.1}", event.avg_temperature),
            avg_humidity: format!("{:.1}", event.avg_humidity),
            avg_co2: format!("{:.1}", event.avg_co2),
            last_reading: event.trigger_timestamp.to_rfc3339(),
            message: format!(
                "Favorable conditions for mosquito proliferation over the last {} consecutive readings. {}",
                event.reading_count,
                event.details()
            ),
        }
    }
}

impl EmailJsNotifier {
    // ---
    pub fn new(settings: EmailJsSettings) -> Result<Self> {
        Self::with_url(settings, EMAILJS_SEND_URL)
    }

    pub fn with_url(settings: EmailJsSettings, url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| VematError::invalid(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            settings,
        })
    }
}

#[async_trait]
impl Notifier for EmailJsNotifier {
    fn kind(&self) -> &'static str {
        "emailjs"
    }

    async fn send(&self, event: &AlertEvent) -> Result<MessageId> {
        // ---
        let body = SendRequest {
            service_id: &self.settings.service_id,
            template_id: &self.settings.template_id,
            user_id: &self.settings.public_key,
            template_params: TemplateParams::for_event(event, &self.settings.recipients),
        };

        debug!(alert_id = %event.id, "Posting alert to {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VematError::DispatchTransientFailure(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| VematError::DispatchTransientFailure(e.to_string()))?;

        if !status.is_success() {
            return Err(VematError::DispatchTransientFailure(format!(
                "email relay returned {}: {}",
                status, text
            )));
        }

        // EmailJS answers a bare "OK"; keep our own id for the history.
        Ok(format!("emailjs-{}", event.id))
    }
}

/// Writes alerts to the log instead of sending them.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn kind(&self) -> &'static str {
        "log"
    }

    async fn send(&self, event: &AlertEvent) -> Result<MessageId> {
        info!(
            alert_id = %event.id,
            node_id = %event.node_id,
            "ALERT (log only): {}",
            event.details()
        );
        Ok(Uuid::new_v4().to_string())
    }
}
