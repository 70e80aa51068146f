use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the safety core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SafetyEvent {
    /// The emergency button was pressed and the countdown started
    EmergencyArmed {
        event_id: String,
        countdown_seconds: u32,
        timestamp: SystemTime,
    },
    /// One countdown tick elapsed
    CountdownTick { event_id: String, remaining: u32 },
    /// The countdown was cancelled before expiry
    EmergencyCancelled {
        event_id: String,
        timestamp: SystemTime,
    },
    /// The countdown expired and the alert was dispatched
    EmergencyTriggered {
        event_id: String,
        location: String,
        evidence_bytes: Option<usize>,
        timestamp: SystemTime,
    },
    /// A media capture session acquired its device
    CaptureStarted { session_id: String, mode: String },
    /// Media capture could not start; the flow continues without it
    CaptureUnavailable { reason: String },
    /// A capture session produced its final blob
    CaptureFinalized {
        session_id: String,
        bytes: usize,
        content_type: String,
    },
    /// Geolocation produced a label (possibly the sentinel)
    LocationResolved { event_id: String, label: String },
    /// Evidence and alert record were accepted by the store
    EvidenceUploaded { event_id: String, path: String },
    /// The relay accepted a notification
    NotificationSent { event_id: String, recipient: String },
    /// A fire-and-forget dispatch failed
    DispatchFailed {
        event_id: String,
        target: String,
        error: String,
    },
    /// A fake call started ringing
    FakeCallStarted { caller: String },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl SafetyEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SafetyEvent::EmergencyArmed {
                event_id,
                countdown_seconds,
                ..
            } => format!("Emergency {} armed ({}s countdown)", event_id, countdown_seconds),
            SafetyEvent::CountdownTick {
                event_id,
                remaining,
            } => format!("Emergency {}: {} remaining", event_id, remaining),
            SafetyEvent::EmergencyCancelled { event_id, .. } => {
                format!("Emergency {} cancelled", event_id)
            }
            SafetyEvent::EmergencyTriggered {
                event_id, location, ..
            } => format!("Emergency {} triggered at {}", event_id, location),
            SafetyEvent::CaptureStarted { session_id, mode } => {
                format!("Capture {} started ({})", session_id, mode)
            }
            SafetyEvent::CaptureUnavailable { reason } => {
                format!("Capture unavailable: {}", reason)
            }
            SafetyEvent::CaptureFinalized {
                session_id,
                bytes,
                content_type,
            } => format!(
                "Capture {} finalized ({} bytes, {})",
                session_id, bytes, content_type
            ),
            SafetyEvent::LocationResolved { event_id, label } => {
                format!("Location for {}: {}", event_id, label)
            }
            SafetyEvent::EvidenceUploaded { event_id, path } => {
                format!("Evidence for {} stored at {}", event_id, path)
            }
            SafetyEvent::NotificationSent {
                event_id,
                recipient,
            } => format!("Notification for {} sent to {}", event_id, recipient),
            SafetyEvent::DispatchFailed {
                event_id,
                target,
                error,
            } => format!("Dispatch to {} for {} failed: {}", target, event_id, error),
            SafetyEvent::FakeCallStarted { caller } => format!("Fake call from {}", caller),
            SafetyEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            SafetyEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SafetyEvent::EmergencyArmed { .. } => "emergency_armed",
            SafetyEvent::CountdownTick { .. } => "countdown_tick",
            SafetyEvent::EmergencyCancelled { .. } => "emergency_cancelled",
            SafetyEvent::EmergencyTriggered { .. } => "emergency_triggered",
            SafetyEvent::CaptureStarted { .. } => "capture_started",
            SafetyEvent::CaptureUnavailable { .. } => "capture_unavailable",
            SafetyEvent::CaptureFinalized { .. } => "capture_finalized",
            SafetyEvent::LocationResolved { .. } => "location_resolved",
            SafetyEvent::EvidenceUploaded { .. } => "evidence_uploaded",
            SafetyEvent::NotificationSent { .. } => "notification_sent",
            SafetyEvent::DispatchFailed { .. } => "dispatch_failed",
            SafetyEvent::FakeCallStarted { .. } => "fake_call_started",
            SafetyEvent::SystemError { .. } => "system_error",
            SafetyEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SafetyEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SafetyEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SafetyEvent) -> Result<usize, EventBusError> {
        match &event {
            SafetyEvent::EmergencyArmed { .. }
            | SafetyEvent::EmergencyCancelled { .. }
            | SafetyEvent::EmergencyTriggered { .. } => {
                info!("{}", event.description());
            }
            SafetyEvent::CaptureUnavailable { reason } => {
                warn!("Capture unavailable: {}", reason);
            }
            SafetyEvent::DispatchFailed { .. } => {
                warn!("{}", event.description());
            }
            SafetyEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            SafetyEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish without caring whether anyone is listening
    pub fn emit(&self, event: SafetyEvent) {
        if let Err(e) = self.publish(event) {
            debug!("Event dropped: {}", e);
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events that belong to one emergency
    Emergency(String),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &SafetyEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Emergency(id) => match event {
                SafetyEvent::EmergencyArmed { event_id, .. }
                | SafetyEvent::CountdownTick { event_id, .. }
                | SafetyEvent::EmergencyCancelled { event_id, .. }
                | SafetyEvent::EmergencyTriggered { event_id, .. }
                | SafetyEvent::LocationResolved { event_id, .. }
                | SafetyEvent::EvidenceUploaded { event_id, .. }
                | SafetyEvent::NotificationSent { event_id, .. }
                | SafetyEvent::DispatchFailed { event_id, .. } => event_id == id,
                _ => false,
            },
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<SafetyEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<SafetyEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<SafetyEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<SafetyEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus
            .publish(SafetyEvent::CountdownTick {
                event_id: "e1".to_string(),
                remaining: 4,
            })
            .unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            SafetyEvent::CountdownTick { remaining, .. } => assert_eq!(remaining, 4),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fails_but_emit_does_not() {
        let event_bus = EventBus::new(10);
        let event = SafetyEvent::CaptureUnavailable {
            reason: "denied".to_string(),
        };
        assert!(event_bus.publish(event.clone()).is_err());
        event_bus.emit(event);
        assert!(!event_bus.has_subscribers());
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let mut filtered =
            event_bus.subscribe_filtered(EventFilter::Emergency("e2".to_string()), "test");

        event_bus.emit(SafetyEvent::CountdownTick {
            event_id: "e1".to_string(),
            remaining: 3,
        });
        event_bus.emit(SafetyEvent::FakeCallStarted {
            caller: "Mom".to_string(),
        });
        event_bus.emit(SafetyEvent::EmergencyCancelled {
            event_id: "e2".to_string(),
            timestamp: SystemTime::now(),
        });

        let received = timeout(Duration::from_millis(100), filtered.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "emergency_cancelled");
        assert!(filtered.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_event_type_filter() {
        let filter = EventFilter::EventTypes(vec!["emergency_triggered"]);
        let triggered = SafetyEvent::EmergencyTriggered {
            event_id: "e".to_string(),
            location: "Unknown Location".to_string(),
            evidence_bytes: None,
            timestamp: SystemTime::now(),
        };
        assert!(filter.matches(&triggered));
        assert!(!filter.matches(&SafetyEvent::CaptureUnavailable {
            reason: String::new()
        }));
    }
}
