use super::notifier::{NotificationMessage, Notifier};
use super::store::{AlertRecord, EvidenceStore};
use crate::capture::EvidenceBlob;
use crate::events::{EventBus, SafetyEvent};
use crate::geolocation::ResolvedLocation;
use crate::trust_network::Contact;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Everything needed to report one triggered emergency
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub event_id: String,
    pub location: ResolvedLocation,
    pub evidence: Option<EvidenceBlob>,
    pub recipients: Vec<Contact>,
    pub triggered_at: DateTime<Utc>,
}

/// Handles of the spawned dispatch tasks. Dropping it detaches them.
pub struct DispatchHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl DispatchHandle {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every dispatch task to finish
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Dispatch task panicked: {}", e);
            }
        }
    }
}

/// Fire-and-forget upload and notification fan-out. Failures are logged and
/// published as `DispatchFailed`; nothing is retried.
#[derive(Clone)]
pub struct FanOut {
    store: Arc<dyn EvidenceStore>,
    notifier: Arc<dyn Notifier>,
    event_bus: EventBus,
    timezone: Tz,
}

impl FanOut {
    pub fn new(
        store: Arc<dyn EvidenceStore>,
        notifier: Arc<dyn Notifier>,
        event_bus: EventBus,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            notifier,
            event_bus,
            timezone,
        }
    }

    pub fn dispatch(&self, request: DispatchRequest) -> DispatchHandle {
        let mut tasks = Vec::with_capacity(request.recipients.len() + 1);
        tasks.push(self.spawn_upload(&request));

        for contact in &request.recipients {
            let Some(message) = NotificationMessage::emergency(
                &request.event_id,
                contact,
                &request.location,
                request.triggered_at,
                self.timezone,
            ) else {
                debug!("Skipping {}: no email address", contact.name);
                continue;
            };
            tasks.push(self.spawn_notification(message));
        }

        debug!(
            "Dispatched {} tasks for emergency {}",
            tasks.len(),
            request.event_id
        );
        DispatchHandle { tasks }
    }

    fn spawn_upload(&self, request: &DispatchRequest) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let event_bus = self.event_bus.clone();
        let event_id = request.event_id.clone();
        let location = request.location.clone();
        let evidence = request.evidence.clone();
        let triggered_at = request.triggered_at;

        tokio::spawn(async move {
            let mut evidence_path = None;
            if let Some(blob) = evidence.filter(|blob| !blob.is_empty()) {
                match store.upload_blob(&event_id, &blob).await {
                    Ok(object) => {
                        event_bus.emit(SafetyEvent::EvidenceUploaded {
                            event_id: event_id.clone(),
                            path: object.path.clone(),
                        });
                        evidence_path = Some(object.path);
                    }
                    Err(e) => {
                        warn!("Evidence upload for {} failed: {}", event_id, e);
                        event_bus.emit(SafetyEvent::DispatchFailed {
                            event_id: event_id.clone(),
                            target: "evidence_store".to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            let record = AlertRecord::triggered(&event_id, &location, evidence_path, triggered_at);
            if let Err(e) = store.insert_alert(&record).await {
                warn!("Alert insert for {} failed: {}", event_id, e);
                event_bus.emit(SafetyEvent::DispatchFailed {
                    event_id,
                    target: "alerts".to_string(),
                    error: e.to_string(),
                });
            }
        })
    }

    fn spawn_notification(&self, message: NotificationMessage) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        let event_bus = self.event_bus.clone();

        tokio::spawn(async move {
            match notifier.send(&message).await {
                Ok(()) => event_bus.emit(SafetyEvent::NotificationSent {
                    event_id: message.event_id,
                    recipient: message.to_email,
                }),
                Err(e) => {
                    warn!("Notification to {} failed: {}", message.to_email, e);
                    event_bus.emit(SafetyEvent::DispatchFailed {
                        event_id: message.event_id,
                        target: message.to_email,
                        error: e.to_string(),
                    });
                }
            }
        })
    }
}
