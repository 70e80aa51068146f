use super::event::EmergencyEvent;
use super::services::Services;
use crate::capture::{EvidenceBlob, MediaCaptureSession};
use crate::config::{CaptureConfig, CountdownConfig};
use crate::countdown::{
    ChannelObserver, CountdownController, CountdownObserver, CountdownSignal, CountdownSnapshot,
    EmergencyStatus,
};
use crate::dispatch::{DispatchHandle, DispatchRequest};
use crate::events::SafetyEvent;
use crate::geolocation::ResolvedLocation;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Live state of the emergency that is currently counting down
struct ActiveEmergency {
    event: EmergencyEvent,
    capture: Option<MediaCaptureSession>,
}

struct FlowInner {
    services: Arc<Services>,
    controller: CountdownController,
    capture: CaptureConfig,
    current: Mutex<Option<ActiveEmergency>>,
    last_event: Mutex<Option<EmergencyEvent>>,
    pending_dispatch: Mutex<Option<DispatchHandle>>,
    /// Triggers fired by the countdown whose dispatch has not been queued yet
    triggers_in_flight: Arc<watch::Sender<usize>>,
}

/// Counts a trigger the moment the countdown fires, before the driver sees it
struct FlowObserver {
    channel: ChannelObserver,
    triggers_in_flight: Arc<watch::Sender<usize>>,
}

impl CountdownObserver for FlowObserver {
    fn on_tick(&self, remaining: u32) {
        self.channel.on_tick(remaining);
    }

    fn on_trigger(&self) {
        self.triggers_in_flight.send_modify(|count| *count += 1);
        self.channel.on_trigger();
    }

    fn on_cancel(&self) {
        self.channel.on_cancel();
    }
}

/// Emergency button flow: countdown, best-effort capture and geolocation,
/// then upload and notification on expiry.
pub struct EmergencyFlow {
    inner: Arc<FlowInner>,
    driver: JoinHandle<()>,
}

impl EmergencyFlow {
    pub fn new(
        services: Arc<Services>,
        countdown: &CountdownConfig,
        capture: &CaptureConfig,
    ) -> Self {
        let (channel, signals) = ChannelObserver::new();
        let triggers_in_flight = Arc::new(watch::channel(0usize).0);
        let observer = FlowObserver {
            channel,
            triggers_in_flight: Arc::clone(&triggers_in_flight),
        };
        let controller = CountdownController::from_config(countdown, Arc::new(observer));

        let inner = Arc::new(FlowInner {
            services,
            controller,
            capture: capture.clone(),
            current: Mutex::new(None),
            last_event: Mutex::new(None),
            pending_dispatch: Mutex::new(None),
            triggers_in_flight,
        });

        let driver = tokio::spawn(drive(Arc::clone(&inner), signals));
        Self { inner, driver }
    }

    /// Press the emergency button. Returns the new event id, or `None` when an
    /// emergency is already in progress.
    pub fn press(&self) -> Option<String> {
        let event = {
            let mut current = self.inner.current.lock();
            if current.is_some() {
                debug!("Emergency press ignored: already in progress");
                return None;
            }
            if !self.inner.controller.arm() {
                return None;
            }

            let event = EmergencyEvent::armed(self.inner.controller.duration());
            *current = Some(ActiveEmergency {
                event: event.clone(),
                capture: None,
            });
            event
        };

        self.inner.services.event_bus.emit(SafetyEvent::EmergencyArmed {
            event_id: event.id.clone(),
            countdown_seconds: event.countdown_seconds,
            timestamp: SystemTime::now(),
        });

        tokio::spawn(start_capture(Arc::clone(&self.inner), event.id.clone()));
        tokio::spawn(resolve_location(Arc::clone(&self.inner), event.id.clone()));

        info!("Emergency {} armed", event.id);
        Some(event.id)
    }

    /// Cancel the running countdown. Capture is discarded and nothing is sent.
    pub fn cancel(&self) -> bool {
        let active = {
            let mut current = self.inner.current.lock();
            if current.is_none() || !self.inner.controller.cancel() {
                debug!("Emergency cancel ignored: nothing to cancel");
                return false;
            }
            current.take()
        };

        let Some(mut active) = active else {
            return false;
        };

        if let Some(mut session) = active.capture.take() {
            session.abort();
        }
        active.event.finish(EmergencyStatus::Cancelled);

        self.inner.services.event_bus.emit(SafetyEvent::EmergencyCancelled {
            event_id: active.event.id.clone(),
            timestamp: SystemTime::now(),
        });
        info!("Emergency {} cancelled", active.event.id);

        *self.inner.last_event.lock() = Some(active.event);
        true
    }

    /// The emergency currently counting down
    pub fn current(&self) -> Option<EmergencyEvent> {
        self.inner
            .current
            .lock()
            .as_ref()
            .map(|active| active.event.clone())
    }

    /// The most recently finished emergency
    pub fn last_event(&self) -> Option<EmergencyEvent> {
        self.inner.last_event.lock().clone()
    }

    pub fn countdown(&self) -> CountdownSnapshot {
        self.inner.controller.snapshot()
    }

    pub fn subscribe_countdown(&self) -> watch::Receiver<CountdownSnapshot> {
        self.inner.controller.subscribe()
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.inner.services
    }

    /// Wait for the uploads and notifications of the last trigger to finish,
    /// including a trigger that fired but is still finalizing capture
    pub async fn wait_for_dispatch(&self) {
        let mut in_flight = self.inner.triggers_in_flight.subscribe();
        if in_flight.wait_for(|count| *count == 0).await.is_err() {
            debug!("Trigger counter closed");
        }

        let pending = self.inner.pending_dispatch.lock().take();
        if let Some(handle) = pending {
            handle.join().await;
        }
    }
}

impl Drop for EmergencyFlow {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive(inner: Arc<FlowInner>, mut signals: mpsc::UnboundedReceiver<CountdownSignal>) {
    while let Some(signal) = signals.recv().await {
        match signal {
            CountdownSignal::Tick(remaining) => {
                let event_id = inner.current.lock().as_ref().map(|a| a.event.id.clone());
                if let Some(event_id) = event_id {
                    inner.services.event_bus.emit(SafetyEvent::CountdownTick {
                        event_id,
                        remaining,
                    });
                }
            }
            CountdownSignal::Triggered => {
                trigger(&inner).await;
                inner
                    .triggers_in_flight
                    .send_modify(|count| *count = count.saturating_sub(1));
            }
            // cancel() already finalized the event
            CountdownSignal::Cancelled => {}
        }
    }
    debug!("Emergency flow driver stopped");
}

async fn trigger(inner: &Arc<FlowInner>) {
    let Some(mut active) = inner.current.lock().take() else {
        warn!("Countdown fired with no emergency in progress");
        return;
    };

    let evidence = match active.capture.take() {
        Some(session) => finalize_capture(inner, session).await,
        None => {
            debug!("No capture available for {}", active.event.id);
            None
        }
    };

    let location = active
        .event
        .resolved_location
        .clone()
        .unwrap_or_else(ResolvedLocation::unknown);

    let recipients = inner.services.trust_network.lock().recipients();
    let triggered_at = Utc::now();

    let handle = inner.services.fan_out().dispatch(DispatchRequest {
        event_id: active.event.id.clone(),
        location: location.clone(),
        evidence: evidence.clone(),
        recipients,
        triggered_at,
    });
    *inner.pending_dispatch.lock() = Some(handle);

    active.event.evidence_bytes = evidence.as_ref().map(EvidenceBlob::len);
    active.event.resolved_location = Some(location.clone());
    active.event.finish(EmergencyStatus::Triggered);

    inner.services.event_bus.emit(SafetyEvent::EmergencyTriggered {
        event_id: active.event.id.clone(),
        location: location.label,
        evidence_bytes: active.event.evidence_bytes,
        timestamp: SystemTime::now(),
    });

    *inner.last_event.lock() = Some(active.event);
}

async fn finalize_capture(
    inner: &FlowInner,
    mut session: MediaCaptureSession,
) -> Option<EvidenceBlob> {
    match session.stop().await {
        Ok(Some(blob)) => {
            inner.services.event_bus.emit(SafetyEvent::CaptureFinalized {
                session_id: blob.id.clone(),
                bytes: blob.len(),
                content_type: blob.content_type.clone(),
            });
            Some(blob)
        }
        Ok(None) => None,
        Err(e) => {
            error!("Failed to finalize capture {}: {}", session.id(), e);
            None
        }
    }
}

async fn start_capture(inner: Arc<FlowInner>, event_id: String) {
    let mut session = MediaCaptureSession::from_config(
        Arc::clone(&inner.services.media_source),
        &inner.capture,
    );

    if let Err(e) = session.start().await {
        inner.services.event_bus.emit(SafetyEvent::CaptureUnavailable {
            reason: e.to_string(),
        });
        return;
    }

    let session_id = session.id().to_string();
    let mode = session.mode();
    {
        let mut current = inner.current.lock();
        match current.as_mut() {
            Some(active) if active.event.id == event_id => {
                active.capture = Some(session);
            }
            _ => {
                debug!("Capture for finished emergency {} released", event_id);
                session.abort();
                return;
            }
        }
    }

    inner.services.event_bus.emit(SafetyEvent::CaptureStarted {
        session_id,
        mode: mode.as_str().to_string(),
    });
}

async fn resolve_location(inner: Arc<FlowInner>, event_id: String) {
    let location = inner.services.resolver.resolve().await;

    {
        let mut current = inner.current.lock();
        match current.as_mut() {
            Some(active) if active.event.id == event_id => {
                active.event.resolved_location = Some(location.clone());
            }
            _ => {
                debug!(
                    "Discarding late location '{}' for finished emergency {}",
                    location.label, event_id
                );
                return;
            }
        }
    }

    inner.services.event_bus.emit(SafetyEvent::LocationResolved {
        event_id,
        label: location.label,
    });
}
