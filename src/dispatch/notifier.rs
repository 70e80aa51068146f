use super::store::ensure_success;
use crate::config::NotifierConfig;
use crate::error::DispatchError;
use crate::geolocation::ResolvedLocation;
use crate::trust_network::Contact;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

/// One outgoing alert email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub event_id: String,
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    pub body: String,
    pub location: String,
    pub maps_link: Option<String>,
}

impl NotificationMessage {
    /// Alert text for a triggered emergency, with the trigger time shown in `timezone`
    pub fn emergency(
        event_id: &str,
        recipient: &Contact,
        location: &ResolvedLocation,
        triggered_at: DateTime<Utc>,
        timezone: Tz,
    ) -> Option<Self> {
        let to_email = recipient.email.clone()?;
        let local_time = triggered_at.with_timezone(&timezone);
        let maps_link = location.coordinates.map(|c| c.maps_link());

        let mut body = format!(
            "Hi {},\n\nAn Aurasafe emergency alert was triggered at {}.\nLast known location: {}\n",
            recipient.name,
            local_time.format("%Y-%m-%d %H:%M:%S %Z"),
            location.label
        );
        if let Some(link) = &maps_link {
            body.push_str(&format!("Map: {}\n", link));
        }
        body.push_str("\nPlease check in or contact emergency services.");

        Some(Self {
            event_id: event_id.to_string(),
            to_name: recipient.name.clone(),
            to_email,
            subject: "Aurasafe emergency alert".to_string(),
            body,
            location: location.label.clone(),
            maps_link,
        })
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &NotificationMessage) -> Result<(), DispatchError>;
}

/// Template-based email relay over HTTP
pub struct HttpEmailRelay {
    client: reqwest::Client,
    endpoint: String,
    service_id: String,
    template_id: String,
    public_key: String,
}

impl HttpEmailRelay {
    pub fn from_config(
        client: reqwest::Client,
        config: &NotifierConfig,
    ) -> Result<Self, DispatchError> {
        let not_configured = |details: &str| DispatchError::NotConfigured {
            service: "notifier".to_string(),
            details: details.to_string(),
        };

        if config.template_id.is_empty() {
            return Err(not_configured("template_id is not set"));
        }
        let public_key = config
            .public_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| not_configured("public_key is not set"))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            service_id: config.service_id.clone(),
            template_id: config.template_id.clone(),
            public_key,
        })
    }

    fn payload(&self, message: &NotificationMessage) -> serde_json::Value {
        json!({
            "service_id": self.service_id,
            "template_id": self.template_id,
            "user_id": self.public_key,
            "template_params": {
                "to_name": message.to_name,
                "to_email": message.to_email,
                "subject": message.subject,
                "message": message.body,
                "location": message.location,
                "maps_link": message.maps_link.clone().unwrap_or_default(),
            }
        })
    }
}

#[async_trait]
impl Notifier for HttpEmailRelay {
    async fn send(&self, message: &NotificationMessage) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.payload(message))
            .send()
            .await?;
        ensure_success("notifier", response).await
    }
}

/// Logs notifications instead of sending them
#[derive(Default)]
pub struct LoggingNotifier {
    sent: Mutex<Vec<NotificationMessage>>,
    failing: Vec<String>,
}

impl LoggingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject messages addressed to these emails
    pub fn failing_for(emails: &[&str]) -> Self {
        Self {
            failing: emails.iter().map(|e| e.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(&self, message: &NotificationMessage) -> Result<(), DispatchError> {
        if self.failing.contains(&message.to_email) {
            return Err(DispatchError::Rejected {
                service: "notifier".to_string(),
                status: 400,
                body: format!("rejected recipient {}", message.to_email),
            });
        }

        info!(
            "Notification to {} <{}>: {}",
            message.to_name, message.to_email, message.subject
        );
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
